pub mod add_gpg_user;
#[cfg(feature = "age")]
pub mod add_ssh_user;
pub mod export_key;
pub mod filters;
#[cfg(feature = "age")]
pub mod import_age_key;
pub mod init;
pub mod lock;
pub mod status;
pub mod transform;
pub mod unlock;

pub use add_gpg_user::add_gpg_user;
#[cfg(feature = "age")]
pub use add_ssh_user::add_ssh_user;
pub use export_key::{export_key, import_key};
pub use filters::{clean, diff, smudge};
#[cfg(feature = "age")]
pub use import_age_key::import_age_key;
pub use init::init;
pub use lock::lock;
pub use status::status;
pub use transform::{decrypt, encrypt, verify};
pub use unlock::unlock;

use git_safe::engine::EngineOptions;
use git_safe::error::{GitSafeError, Result};
use git_safe::git::GitRepo;
use git_safe::gpg::GpgCli;
use git_safe::key::{KeyManager, KeyMaterial};
use git_safe::pattern::PatternRule;
use git_safe::report::BatchReport;
use git_safe::settings::Settings;
use std::path::{Path, PathBuf};

/// Repository, settings and CLI overrides shared by the commands.
pub struct Context {
    pub repo: GitRepo,
    pub settings: Settings,
}

impl Context {
    pub fn open(jobs: Option<usize>) -> Result<Self> {
        let repo = GitRepo::open(".")?;
        let mut settings = Settings::load(repo.workdir()?)?;
        if let Some(jobs) = jobs {
            if jobs == 0 {
                return Err(GitSafeError::Config("--jobs must be at least 1".into()));
            }
            settings.jobs = jobs;
        }
        Ok(Self { repo, settings })
    }

    pub fn workdir(&self) -> Result<&Path> {
        self.repo.workdir()
    }

    pub fn key_manager(&self) -> KeyManager {
        KeyManager::new(self.repo.git_dir())
    }

    pub fn gpg(&self) -> GpgCli {
        GpgCli::from_settings(&self.settings.gpg)
    }

    pub fn load_keys(&self) -> Result<KeyMaterial> {
        let key_manager = self.key_manager();
        if !key_manager.has_key() {
            return Err(GitSafeError::NotInitialized);
        }
        key_manager.load_key()
    }

    /// Scope rules from every attributes file. Malformed lines are logged while parsing.
    pub fn rules(&self) -> Result<Vec<PatternRule>> {
        let parsed = self.repo.attributes(&self.settings.filter_name)?;
        if !parsed.warnings.is_empty() {
            println!(
                "Warning: {} malformed .gitattributes line(s) ignored",
                parsed.warnings.len()
            );
        }
        Ok(parsed.rules)
    }

    pub fn engine_options(&self, backup: bool) -> Result<EngineOptions> {
        let backup_dir = if backup || self.settings.backup {
            Some(
                self.settings
                    .backup_dir(self.workdir()?, self.repo.git_dir()),
            )
        } else {
            None
        };
        Ok(EngineOptions {
            backup_dir,
            jobs: self.settings.jobs,
        })
    }

    /// Paths named on the command line relative to the working tree, or every candidate
    /// in the repository when none were given.
    pub fn candidates(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        if paths.is_empty() {
            return self.repo.candidate_paths();
        }

        let workdir = self.workdir()?;
        let canonical_workdir = workdir.canonicalize()?;
        let cwd = std::env::current_dir()?;
        Ok(paths
            .iter()
            .map(|path| {
                let absolute = cwd.join(path);
                let absolute = absolute.canonicalize().unwrap_or(absolute);
                absolute
                    .strip_prefix(&canonical_workdir)
                    .or_else(|_| absolute.strip_prefix(workdir))
                    .map(Path::to_path_buf)
                    .unwrap_or(absolute.clone())
            })
            .collect())
    }
}

/// Print one line per file and a summary. Fails when any file failed.
pub fn print_report(report: &BatchReport) -> Result<()> {
    for entry in report.entries() {
        println!("  {}: {}", entry.path.display(), entry.outcome);
    }
    let summary = report.summary();
    println!("{summary}");

    if summary.failed > 0 {
        return Err(GitSafeError::BatchFailed(summary.failed));
    }
    Ok(())
}
