//! # Key Management
//!
//! Generation, serialization, storage and distribution of the repository's symmetric
//! key material.
//!
//! ## Key Material
//!
//! Every repository owns one [`KeyMaterial`]: an AES-256 key and an independent
//! HMAC-SHA256 key, each drawn separately from the OS random source. A third key used
//! for nonce derivation is expanded from the HMAC key with HKDF and is never stored.
//! All three are wiped from memory when the value is dropped.
//!
//! ## Keyfile Format
//!
//! ```text
//! [GSAFEKEY][version: 1 byte][aes_key: 32 bytes][hmac_key: 32 bytes]
//! ```
//!
//! ## Storage
//!
//! - **Local key**: `.git/git-safe/keys/default`, raw keyfile, mode 0600 from creation
//! - **Committed envelopes**: `<worktree>/.git-safe/<recipient>.gpg`, the keyfile wrapped
//!   by a [`TrustAnchor`] so only the recipient's private key can open it
//!
//! The local key never leaves `.git/` and is never committed.

use crate::atomic::AtomicFile;
use crate::crypto::{derive_subkey, fill_random, KEY_SIZE};
use crate::error::{GitSafeError, Result};
use crate::gpg::TrustAnchor;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub const KEYFILE_MAGIC: &[u8; 8] = b"GSAFEKEY";
pub const KEYFILE_VERSION: u8 = 1;
pub const KEYFILE_LEN: usize = KEYFILE_MAGIC.len() + 1 + 2 * KEY_SIZE;

/// Directory in the working tree holding committed key envelopes.
pub const PROTECTED_KEY_DIR: &str = ".git-safe";

const NONCE_KEY_INFO: &[u8] = b"git-safe v1 nonce key";

/// The repository's symmetric keys. Immutable once built; zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct KeyMaterial {
    aes_key: [u8; KEY_SIZE],
    hmac_key: [u8; KEY_SIZE],
    nonce_key: [u8; KEY_SIZE],
}

impl KeyMaterial {
    /// Draw a fresh key pair from the OS random source.
    pub fn generate() -> Result<Self> {
        let mut aes_key = Zeroizing::new([0u8; KEY_SIZE]);
        let mut hmac_key = Zeroizing::new([0u8; KEY_SIZE]);
        fill_random(aes_key.as_mut());
        fill_random(hmac_key.as_mut());
        Self::from_parts(aes_key.as_ref(), hmac_key.as_ref())
    }

    /// Build key material from existing key bytes.
    pub fn from_parts(aes_key: &[u8], hmac_key: &[u8]) -> Result<Self> {
        for key in [aes_key, hmac_key] {
            if key.len() != KEY_SIZE {
                return Err(GitSafeError::InvalidKeyLength {
                    expected: KEY_SIZE,
                    got: key.len(),
                });
            }
        }

        let nonce_key = derive_subkey(hmac_key, NONCE_KEY_INFO)?;
        let mut material = Self {
            aes_key: [0u8; KEY_SIZE],
            hmac_key: [0u8; KEY_SIZE],
            nonce_key: *nonce_key,
        };
        material.aes_key.copy_from_slice(aes_key);
        material.hmac_key.copy_from_slice(hmac_key);
        Ok(material)
    }

    pub fn aes_key(&self) -> &[u8; KEY_SIZE] {
        &self.aes_key
    }

    pub fn hmac_key(&self) -> &[u8; KEY_SIZE] {
        &self.hmac_key
    }

    /// Key used only to derive per-content nonces.
    pub fn nonce_key(&self) -> &[u8; KEY_SIZE] {
        &self.nonce_key
    }

    /// Keyfile bytes for this key material.
    pub fn serialize(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(KEYFILE_LEN));
        out.extend_from_slice(KEYFILE_MAGIC);
        out.push(KEYFILE_VERSION);
        out.extend_from_slice(&self.aes_key);
        out.extend_from_slice(&self.hmac_key);
        out
    }

    /// Parse keyfile bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let magic_len = KEYFILE_MAGIC.len();
        let seen = bytes.len().min(magic_len);
        if bytes[..seen] != KEYFILE_MAGIC[..seen] {
            return Err(GitSafeError::CorruptKeyfile("bad magic header".into()));
        }
        if let Some(&version) = bytes.get(magic_len) {
            if version != KEYFILE_VERSION {
                return Err(GitSafeError::CorruptKeyfile(format!(
                    "unsupported keyfile version {version}"
                )));
            }
        }
        if bytes.len() < KEYFILE_LEN {
            return Err(GitSafeError::TruncatedKeyfile {
                expected: KEYFILE_LEN,
                got: bytes.len(),
            });
        }
        if bytes.len() > KEYFILE_LEN {
            return Err(GitSafeError::CorruptKeyfile(format!(
                "{} unexpected trailing bytes",
                bytes.len() - KEYFILE_LEN
            )));
        }

        let body = &bytes[magic_len + 1..];
        Self::from_parts(&body[..KEY_SIZE], &body[KEY_SIZE..])
    }

    /// Short, non-secret identifier for display.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.serialize().as_slice());
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

pub fn generate_keypair() -> Result<KeyMaterial> {
    KeyMaterial::generate()
}

/// Wrap `keys` for `recipient` through the trust anchor.
pub fn protect(keys: &KeyMaterial, recipient: &str, anchor: &dyn TrustAnchor) -> Result<Vec<u8>> {
    anchor.encrypt_for(recipient, &keys.serialize())
}

/// Open an envelope produced by [`protect`].
pub fn unprotect(envelope: &[u8], anchor: &dyn TrustAnchor) -> Result<KeyMaterial> {
    let plaintext = anchor
        .decrypt_with_local_secret(envelope)
        .map_err(|err| match err {
            GitSafeError::TrustAnchorRejected(reason) => GitSafeError::DecryptionFailed(reason),
            other => other,
        })?;
    KeyMaterial::parse(&plaintext)
}

/// Write `bytes` to `path` so that it is owner-only from the moment it exists.
pub fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = AtomicFile::create(path)?;
    file.write_all(bytes)?;
    file.commit(None)
}

/// Reduce a recipient identity to something safe to use as a file name.
pub fn sanitize_label(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

/// Key storage and management
pub struct KeyManager {
    git_dir: PathBuf,
}

impl KeyManager {
    pub fn new(git_dir: impl AsRef<Path>) -> Self {
        Self {
            git_dir: git_dir.as_ref().to_path_buf(),
        }
    }

    /// Get the path to the git-safe state directory
    pub fn git_safe_dir(&self) -> PathBuf {
        self.git_dir.join("git-safe")
    }

    /// Get the path to the default key file
    pub fn default_key_path(&self) -> PathBuf {
        self.git_safe_dir().join("keys").join("default")
    }

    /// Initialize the git-safe directory structure
    pub fn init_dirs(&self) -> Result<()> {
        let dir = self.git_safe_dir();
        if dir.exists() {
            return Err(GitSafeError::AlreadyInitialized);
        }

        fs::create_dir_all(dir.join("keys"))?;
        Ok(())
    }

    /// Check if repository is initialized
    pub fn is_initialized(&self) -> bool {
        self.git_safe_dir().exists()
    }

    pub fn has_key(&self) -> bool {
        self.default_key_path().exists()
    }

    /// Generate and save a new key
    pub fn generate_key(&self) -> Result<KeyMaterial> {
        let keys = KeyMaterial::generate()?;
        self.save_key(&keys)?;
        tracing::info!(fingerprint = %keys.fingerprint(), "generated repository key");
        Ok(keys)
    }

    /// Save a key to disk, owner read/write only
    pub fn save_key(&self, keys: &KeyMaterial) -> Result<()> {
        let key_path = self.default_key_path();
        if let Some(parent) = key_path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_private(&key_path, &keys.serialize())
    }

    /// Load the key from disk
    pub fn load_key(&self) -> Result<KeyMaterial> {
        let key_path = self.default_key_path();
        if !key_path.exists() {
            return Err(GitSafeError::KeyNotFound("default".into()));
        }

        let bytes = Zeroizing::new(
            fs::read(&key_path).map_err(|e| GitSafeError::at_path(&key_path, e))?,
        );
        KeyMaterial::parse(&bytes)
    }

    /// Delete the local key. Committed envelopes are left alone.
    pub fn remove_key(&self) -> Result<()> {
        let key_path = self.default_key_path();
        if key_path.exists() {
            let len = fs::metadata(&key_path)?.len() as usize;
            // Overwrite before unlinking so the bytes do not linger in the old blocks
            fs::write(&key_path, vec![0u8; len])?;
            fs::remove_file(&key_path)?;
        }
        Ok(())
    }

    /// Export key to a file
    pub fn export_key(&self, output_path: impl AsRef<Path>) -> Result<()> {
        let keys = self.load_key()?;
        write_private(output_path.as_ref(), &keys.serialize())
    }

    /// Import key from a file
    pub fn import_key(&self, input_path: impl AsRef<Path>) -> Result<KeyMaterial> {
        let input_path = input_path.as_ref();
        let bytes = Zeroizing::new(
            fs::read(input_path).map_err(|e| GitSafeError::at_path(input_path, e))?,
        );
        let keys = KeyMaterial::parse(&bytes)?;
        self.save_key(&keys)?;
        Ok(keys)
    }
}

/// Committed, trust-anchor-wrapped copies of the key inside a working tree.
pub struct ProtectedKeys {
    dir: PathBuf,
}

impl ProtectedKeys {
    pub fn new(workdir: impl AsRef<Path>) -> Self {
        Self {
            dir: workdir.as_ref().join(PROTECTED_KEY_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, recipient: &str, extension: &str) -> PathBuf {
        let label = sanitize_label(recipient);
        let label = if label.is_empty() {
            format!("recipient-{}", hex::encode(&Sha256::digest(recipient.as_bytes())[..8]))
        } else {
            label
        };
        self.dir.join(format!("{label}.{extension}"))
    }

    /// Wrap `keys` for `recipient` and store the envelope. Returns its path.
    pub fn add_recipient(
        &self,
        keys: &KeyMaterial,
        recipient: &str,
        anchor: &dyn TrustAnchor,
    ) -> Result<PathBuf> {
        let envelope = protect(keys, recipient, anchor)?;
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(recipient, anchor.envelope_extension());
        fs::write(&path, envelope).map_err(|e| GitSafeError::at_path(&path, e))?;
        Ok(path)
    }

    /// Envelope files with the given extension, sorted by name.
    pub fn envelopes(&self, extension: &str) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Try every envelope until the local secret opens one.
    pub fn unlock(&self, anchor: &dyn TrustAnchor) -> Result<KeyMaterial> {
        let envelopes = self.envelopes(anchor.envelope_extension())?;
        if envelopes.is_empty() {
            return Err(GitSafeError::KeyNotFound(format!(
                "no *.{} envelopes in {}",
                anchor.envelope_extension(),
                self.dir.display()
            )));
        }

        let mut last_reason = String::new();
        for path in &envelopes {
            let envelope = fs::read(path).map_err(|e| GitSafeError::at_path(path, e))?;
            match unprotect(&envelope, anchor) {
                Ok(keys) => {
                    tracing::debug!(envelope = %path.display(), "opened key envelope");
                    return Ok(keys);
                }
                Err(GitSafeError::DecryptionFailed(reason)) => {
                    tracing::debug!(envelope = %path.display(), %reason, "envelope not for us");
                    last_reason = reason;
                }
                Err(err @ GitSafeError::TrustAnchorUnavailable(_)) => return Err(err),
                Err(err) => {
                    tracing::warn!(envelope = %path.display(), error = %err, "skipping envelope");
                    last_reason = err.to_string();
                }
            }
        }

        Err(GitSafeError::DecryptionFailed(format!(
            "none of {} envelope(s) could be opened: {last_reason}",
            envelopes.len()
        )))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// In-process stand-in for GPG: "encrypts" by tagging the payload with the recipient
    /// and only opens envelopes addressed to its own identity.
    pub(crate) struct FakeAnchor {
        pub identity: String,
    }

    impl TrustAnchor for FakeAnchor {
        fn encrypt_for(&self, recipient: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
            let mut out = format!("{recipient}\n").into_bytes();
            out.extend(plaintext.iter().map(|b| b ^ 0x5A));
            Ok(out)
        }

        fn decrypt_with_local_secret(&self, envelope: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
            let split = envelope
                .iter()
                .position(|&b| b == b'\n')
                .ok_or_else(|| GitSafeError::TrustAnchorRejected("not an envelope".into()))?;
            if &envelope[..split] != self.identity.as_bytes() {
                return Err(GitSafeError::TrustAnchorRejected("no secret key".into()));
            }
            Ok(Zeroizing::new(
                envelope[split + 1..].iter().map(|b| b ^ 0x5A).collect(),
            ))
        }
    }

    struct DownAnchor;

    impl TrustAnchor for DownAnchor {
        fn encrypt_for(&self, _: &str, _: &[u8]) -> Result<Vec<u8>> {
            Err(GitSafeError::TrustAnchorUnavailable("gpg not installed".into()))
        }

        fn decrypt_with_local_secret(&self, _: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
            Err(GitSafeError::TrustAnchorUnavailable("gpg not installed".into()))
        }
    }

    fn create_test_git_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    #[test]
    fn test_generated_keys_are_independent() {
        let keys = generate_keypair().unwrap();
        assert_ne!(keys.aes_key(), keys.hmac_key());
        assert_ne!(keys.nonce_key(), keys.hmac_key());
        assert_ne!(keys.nonce_key(), keys.aes_key());

        let other = generate_keypair().unwrap();
        assert_ne!(keys.aes_key(), other.aes_key());
    }

    #[test]
    fn test_serialize_parse_roundtrip() {
        let keys = generate_keypair().unwrap();
        let bytes = keys.serialize();
        assert_eq!(bytes.len(), KEYFILE_LEN);
        assert_eq!(&bytes[..8], KEYFILE_MAGIC);

        let parsed = KeyMaterial::parse(&bytes).unwrap();
        assert_eq!(parsed, keys);
        assert_eq!(parsed.nonce_key(), keys.nonce_key());
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        let mut bytes = generate_keypair().unwrap().serialize().to_vec();
        bytes[0] ^= 0xFF;
        assert!(matches!(
            KeyMaterial::parse(&bytes),
            Err(GitSafeError::CorruptKeyfile(_))
        ));
        assert!(matches!(
            KeyMaterial::parse(b"too short"),
            Err(GitSafeError::CorruptKeyfile(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_version() {
        let mut bytes = generate_keypair().unwrap().serialize().to_vec();
        bytes[KEYFILE_MAGIC.len()] = 9;
        assert!(matches!(
            KeyMaterial::parse(&bytes),
            Err(GitSafeError::CorruptKeyfile(_))
        ));
    }

    #[test]
    fn test_parse_reports_truncation() {
        let bytes = generate_keypair().unwrap().serialize();
        match KeyMaterial::parse(&bytes[..40]) {
            Err(GitSafeError::TruncatedKeyfile { expected, got }) => {
                assert_eq!(expected, KEYFILE_LEN);
                assert_eq!(got, 40);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
        assert!(matches!(
            KeyMaterial::parse(b"GSAF"),
            Err(GitSafeError::TruncatedKeyfile { .. })
        ));
        assert!(matches!(
            KeyMaterial::parse(b""),
            Err(GitSafeError::TruncatedKeyfile { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_trailing_bytes() {
        let mut bytes = generate_keypair().unwrap().serialize().to_vec();
        bytes.push(0);
        assert!(matches!(
            KeyMaterial::parse(&bytes),
            Err(GitSafeError::CorruptKeyfile(_))
        ));
    }

    #[test]
    fn test_from_parts_rejects_wrong_length() {
        assert!(matches!(
            KeyMaterial::from_parts(&[0u8; 31], &[0u8; 32]),
            Err(GitSafeError::InvalidKeyLength { got: 31, .. })
        ));
    }

    #[test]
    fn test_debug_does_not_leak_key_bytes() {
        let keys = KeyMaterial::from_parts(&[0xAB; 32], &[0xCD; 32]).unwrap();
        let debug = format!("{keys:?}");
        assert!(debug.contains("fingerprint"));
        assert!(!debug.contains(&hex::encode([0xABu8; 32])));
        assert!(!debug.contains("171, 171"));
    }

    #[test]
    fn test_protect_unprotect_roundtrip() {
        let keys = generate_keypair().unwrap();
        let alice = FakeAnchor {
            identity: "alice@example.com".into(),
        };

        let envelope = protect(&keys, "alice@example.com", &alice).unwrap();
        let opened = unprotect(&envelope, &alice).unwrap();
        assert_eq!(opened, keys);
    }

    #[test]
    fn test_unprotect_wrong_recipient_fails() {
        let keys = generate_keypair().unwrap();
        let alice = FakeAnchor {
            identity: "alice@example.com".into(),
        };
        let bob = FakeAnchor {
            identity: "bob@example.com".into(),
        };

        let envelope = protect(&keys, "alice@example.com", &alice).unwrap();
        assert!(matches!(
            unprotect(&envelope, &bob),
            Err(GitSafeError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_unavailable_anchor_is_distinct() {
        let keys = generate_keypair().unwrap();
        assert!(matches!(
            protect(&keys, "alice", &DownAnchor),
            Err(GitSafeError::TrustAnchorUnavailable(_))
        ));
        assert!(matches!(
            unprotect(b"whatever", &DownAnchor),
            Err(GitSafeError::TrustAnchorUnavailable(_))
        ));
    }

    #[test]
    fn test_git_safe_dir_path() {
        let temp = create_test_git_dir();
        let key_manager = KeyManager::new(temp.path());

        assert_eq!(key_manager.git_safe_dir(), temp.path().join("git-safe"));
        assert_eq!(
            key_manager.default_key_path(),
            temp.path().join("git-safe").join("keys").join("default")
        );
    }

    #[test]
    fn test_init_dirs_twice_fails() {
        let temp = create_test_git_dir();
        let key_manager = KeyManager::new(temp.path());

        assert!(!key_manager.is_initialized());
        key_manager.init_dirs().unwrap();
        assert!(key_manager.is_initialized());
        assert!(matches!(
            key_manager.init_dirs(),
            Err(GitSafeError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_generate_and_load_key() {
        let temp = create_test_git_dir();
        let key_manager = KeyManager::new(temp.path());
        key_manager.init_dirs().unwrap();

        let generated = key_manager.generate_key().unwrap();
        let loaded = key_manager.load_key().unwrap();
        assert_eq!(generated, loaded);
    }

    #[test]
    fn test_load_key_before_init_fails() {
        let temp = create_test_git_dir();
        let key_manager = KeyManager::new(temp.path());
        assert!(matches!(
            key_manager.load_key(),
            Err(GitSafeError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_export_and_import_key() {
        let temp = create_test_git_dir();
        let key_manager = KeyManager::new(temp.path());
        key_manager.init_dirs().unwrap();
        let original = key_manager.generate_key().unwrap();

        let export_path = temp.path().join("exported.key");
        key_manager.export_key(&export_path).unwrap();
        assert_eq!(fs::metadata(&export_path).unwrap().len(), KEYFILE_LEN as u64);

        let temp2 = create_test_git_dir();
        let key_manager2 = KeyManager::new(temp2.path());
        key_manager2.init_dirs().unwrap();
        key_manager2.import_key(&export_path).unwrap();

        assert_eq!(key_manager2.load_key().unwrap(), original);
    }

    #[test]
    fn test_import_invalid_key_file() {
        let temp = create_test_git_dir();
        let key_manager = KeyManager::new(temp.path());
        key_manager.init_dirs().unwrap();

        let invalid = temp.path().join("invalid.key");
        fs::write(&invalid, b"too short").unwrap();
        assert!(key_manager.import_key(&invalid).is_err());
        assert!(!key_manager.has_key());

        assert!(matches!(
            key_manager.import_key("/nonexistent/path.key"),
            Err(GitSafeError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_remove_key() {
        let temp = create_test_git_dir();
        let key_manager = KeyManager::new(temp.path());
        key_manager.init_dirs().unwrap();
        key_manager.generate_key().unwrap();

        key_manager.remove_key().unwrap();
        assert!(!key_manager.has_key());
        // Removing twice is fine
        key_manager.remove_key().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_permissions_unix() {
        use std::os::unix::fs::PermissionsExt;

        let temp = create_test_git_dir();
        let key_manager = KeyManager::new(temp.path());
        key_manager.init_dirs().unwrap();
        key_manager.generate_key().unwrap();

        let mode = fs::metadata(key_manager.default_key_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);

        let exported = temp.path().join("exported.key");
        key_manager.export_key(&exported).unwrap();
        let mode = fs::metadata(&exported).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("alice@example.com"), "alice@example.com");
        assert_eq!(sanitize_label("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_label("Team Name_01!"), "TeamName_01");
    }

    #[test]
    fn test_protected_keys_unlock_picks_matching_envelope() {
        let temp = create_test_git_dir();
        let protected = ProtectedKeys::new(temp.path());
        let keys = generate_keypair().unwrap();
        let bob = FakeAnchor {
            identity: "bob@example.com".into(),
        };

        protected
            .add_recipient(&keys, "alice@example.com", &bob)
            .unwrap();
        let bob_path = protected
            .add_recipient(&keys, "bob@example.com", &bob)
            .unwrap();
        assert_eq!(bob_path, temp.path().join(".git-safe/bob@example.com.gpg"));
        assert_eq!(protected.envelopes("gpg").unwrap().len(), 2);

        assert_eq!(protected.unlock(&bob).unwrap(), keys);

        let carol = FakeAnchor {
            identity: "carol@example.com".into(),
        };
        assert!(matches!(
            protected.unlock(&carol),
            Err(GitSafeError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_protected_keys_unlock_without_envelopes() {
        let temp = create_test_git_dir();
        let protected = ProtectedKeys::new(temp.path());
        let anchor = FakeAnchor {
            identity: "alice".into(),
        };
        assert!(matches!(
            protected.unlock(&anchor),
            Err(GitSafeError::KeyNotFound(_))
        ));
    }
}
