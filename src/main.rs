mod commands;

use clap::{Parser, Subcommand};
use git_safe::Result;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "git-safe")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Transparent file encryption in git", long_about = None)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Worker threads for batch operations (overrides config)
    #[arg(short, long, global = true)]
    jobs: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize git-safe in the current repository
    Init {
        /// Also wrap the new key for these GPG recipients
        #[arg(long = "gpg-recipient", value_name = "ID")]
        gpg_recipients: Vec<String>,
    },

    /// Make the key available and decrypt the working tree
    Unlock {
        /// Import this raw keyfile instead of opening a committed envelope
        #[arg(short, long)]
        key_file: Option<PathBuf>,

        /// Only these paths (default: every candidate in the repository)
        paths: Vec<PathBuf>,
    },

    /// Encrypt the working tree and remove the filter driver
    Lock {
        /// Also delete the local key
        #[arg(long)]
        forget_key: bool,

        paths: Vec<PathBuf>,
    },

    /// Encrypt in-scope files in place
    Encrypt {
        /// Keep a timestamped copy of each original
        #[arg(long)]
        backup: bool,

        paths: Vec<PathBuf>,
    },

    /// Decrypt in-scope files in place
    Decrypt {
        /// Keep a timestamped copy of each original
        #[arg(long)]
        backup: bool,

        paths: Vec<PathBuf>,
    },

    /// Check the integrity of encrypted files without writing anything
    Verify { paths: Vec<PathBuf> },

    /// Grant access to a GPG user
    AddGpgUser {
        /// GPG key ID, fingerprint or email
        gpg_id: String,
    },

    /// Grant access to an SSH key holder via age
    #[cfg(feature = "age")]
    AddSshUser {
        /// Path to the SSH public key
        ssh_key: PathBuf,

        /// Name for the committed envelope (default: key comment)
        #[arg(long)]
        alias: Option<String>,
    },

    /// Import the repository key from an age envelope using an SSH private key
    #[cfg(feature = "age")]
    ImportAgeKey {
        /// The .age envelope
        envelope: PathBuf,

        /// SSH private key
        #[arg(short, long)]
        identity: PathBuf,
    },

    /// Export the repository's symmetric key
    ExportKey {
        /// Output file path
        output: PathBuf,
    },

    /// Import a symmetric key
    ImportKey {
        /// Input file path
        input: PathBuf,
    },

    /// Show key state and the state of every in-scope file
    Status,

    /// Clean filter (used internally by git)
    Clean,

    /// Smudge filter (used internally by git)
    Smudge,

    /// Diff textconv (used internally by git)
    Diff {
        /// File git wants converted
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout carries filter output.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run(cli: Cli) -> Result<()> {
    let jobs = cli.jobs;

    match cli.command {
        Commands::Init { gpg_recipients } => commands::init(&gpg_recipients),
        Commands::Unlock { key_file, paths } => commands::unlock(key_file.as_deref(), &paths, jobs),
        Commands::Lock { forget_key, paths } => commands::lock(forget_key, &paths, jobs),
        Commands::Encrypt { backup, paths } => commands::encrypt(backup, &paths, jobs),
        Commands::Decrypt { backup, paths } => commands::decrypt(backup, &paths, jobs),
        Commands::Verify { paths } => commands::verify(&paths, jobs),
        Commands::AddGpgUser { gpg_id } => commands::add_gpg_user(&gpg_id),
        #[cfg(feature = "age")]
        Commands::AddSshUser { ssh_key, alias } => {
            commands::add_ssh_user(&ssh_key, alias.as_deref())
        }
        #[cfg(feature = "age")]
        Commands::ImportAgeKey { envelope, identity } => {
            commands::import_age_key(&envelope, &identity)
        }
        Commands::ExportKey { output } => commands::export_key(&output),
        Commands::ImportKey { input } => commands::import_key(&input),
        Commands::Status => commands::status(),
        Commands::Clean => commands::clean(),
        Commands::Smudge => commands::smudge(),
        Commands::Diff { file } => commands::diff(&file),
    }
}
