use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitSafeError {
    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Corrupt keyfile: {0}")]
    CorruptKeyfile(String),

    #[error("Truncated keyfile: expected {expected} bytes, got {got}")]
    TruncatedKeyfile { expected: usize, got: usize },

    #[error("Keyfile decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Unsupported encrypted record version: {0}")]
    UnsupportedFormat(u8),

    #[error("Trust anchor unavailable: {0}")]
    TrustAnchorUnavailable(String),

    #[error("Trust anchor rejected the request: {0}")]
    TrustAnchorRejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on {}: {source}", path.display())]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Malformed attributes line {line}: {reason}")]
    MalformedPatternLine { line: usize, reason: String },

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[cfg(feature = "age")]
    #[error("age error: {0}")]
    Age(String),

    #[error("Repository not initialized. Run 'git-safe init' first")]
    NotInitialized,

    #[error("Repository already initialized")]
    AlreadyInitialized,

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Not in a git repository")]
    NotInGitRepo,

    #[error("{0} file(s) failed")]
    BatchFailed(usize),
}

impl GitSafeError {
    /// Attach a path to an I/O error, mapping `NotFound` to [`GitSafeError::FileNotFound`].
    pub fn at_path(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            GitSafeError::FileNotFound(path)
        } else {
            GitSafeError::PathIo { path, source }
        }
    }
}

#[cfg(feature = "age")]
impl From<age::EncryptError> for GitSafeError {
    fn from(err: age::EncryptError) -> Self {
        GitSafeError::Age(format!("age encryption failed: {err}"))
    }
}

#[cfg(feature = "age")]
impl From<age::DecryptError> for GitSafeError {
    fn from(err: age::DecryptError) -> Self {
        GitSafeError::Age(format!("age decryption failed: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, GitSafeError>;
