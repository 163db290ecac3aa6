//! Repository access and the git filter driver.
//!
//! `init`/`unlock` register a filter driver in the repository's local config:
//!
//! ```text
//! filter.<name>.clean    = git-safe clean
//! filter.<name>.smudge   = git-safe smudge
//! filter.<name>.required = true
//! diff.<name>.textconv   = git-safe diff
//! ```
//!
//! Git then pipes file content through [`clean_filter`] on `git add` and through
//! [`smudge_filter`] on checkout. Because encryption is deterministic, re-adding an
//! unchanged file yields the same blob and `git status` stays clean.

use crate::error::{GitSafeError, Result};
use crate::key::{KeyMaterial, PROTECTED_KEY_DIR};
use crate::pattern::{self, ParsedAttributes};
use crate::record;
use git2::{Repository, StatusOptions};
use std::collections::BTreeSet;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

pub const ATTRIBUTES_FILE: &str = ".gitattributes";

/// Printed by the diff textconv when the key is not available.
pub const ENCRYPTED_PLACEHOLDER: &str = "*** This file is encrypted with git-safe ***";

pub struct GitRepo {
    repo: Repository,
}

impl GitRepo {
    /// Open the repository containing `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::discover(path).map_err(|_| GitSafeError::NotInGitRepo)?;
        Ok(Self { repo })
    }

    /// The `.git` directory.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// The working-tree root. Bare repositories have none.
    pub fn workdir(&self) -> Result<&Path> {
        self.repo.workdir().ok_or(GitSafeError::NotInGitRepo)
    }

    /// Register the clean/smudge/textconv driver under `filter_name`.
    pub fn configure_filters(&self, filter_name: &str) -> Result<()> {
        let mut config = self.repo.config()?;
        config.set_str(&format!("filter.{filter_name}.clean"), "git-safe clean")?;
        config.set_str(&format!("filter.{filter_name}.smudge"), "git-safe smudge")?;
        config.set_bool(&format!("filter.{filter_name}.required"), true)?;
        config.set_str(&format!("diff.{filter_name}.textconv"), "git-safe diff")?;
        tracing::debug!(filter_name, "filter driver configured");
        Ok(())
    }

    /// Remove the driver entries. Missing entries are not an error.
    pub fn remove_filters(&self, filter_name: &str) -> Result<()> {
        let mut config = self.repo.config()?;
        for key in [
            format!("filter.{filter_name}.clean"),
            format!("filter.{filter_name}.smudge"),
            format!("filter.{filter_name}.required"),
            format!("diff.{filter_name}.textconv"),
        ] {
            if let Err(err) = config.remove(&key) {
                if err.code() != git2::ErrorCode::NotFound {
                    return Err(err.into());
                }
            }
        }
        tracing::debug!(filter_name, "filter driver removed");
        Ok(())
    }

    pub fn filters_configured(&self, filter_name: &str) -> bool {
        self.repo
            .config()
            .and_then(|config| config.get_string(&format!("filter.{filter_name}.smudge")))
            .is_ok()
    }

    /// Tracked files plus untracked files that are not ignored, relative to the working
    /// tree and sorted. Attributes files and committed key envelopes are never candidates.
    pub fn candidate_paths(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .all_paths()?
            .into_iter()
            .filter(|path| !is_tool_path(path))
            .collect())
    }

    fn all_paths(&self) -> Result<BTreeSet<PathBuf>> {
        let mut paths = BTreeSet::new();

        let index = self.repo.index()?;
        for entry in index.iter() {
            paths.insert(PathBuf::from(
                String::from_utf8_lossy(&entry.path).into_owned(),
            ));
        }

        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut options))?;
        for entry in statuses.iter() {
            if !entry.status().is_wt_new() {
                continue;
            }
            if let Some(path) = entry.path() {
                paths.insert(PathBuf::from(path));
            }
        }

        Ok(paths)
    }

    /// Read every `.gitattributes` in the working tree (root first, then deeper
    /// directories) followed by `.git/info/attributes`, which git gives the last word.
    pub fn attributes(&self, filter_name: &str) -> Result<ParsedAttributes> {
        let workdir = self.workdir()?;
        let mut files: Vec<PathBuf> = self
            .all_paths()?
            .into_iter()
            .filter(|p| p.file_name().is_some_and(|n| n == ATTRIBUTES_FILE))
            .collect();
        if !files.contains(&PathBuf::from(ATTRIBUTES_FILE)) {
            files.push(PathBuf::from(ATTRIBUTES_FILE));
        }
        files.sort_by_key(|p| (p.components().count(), p.clone()));

        let mut parsed = ParsedAttributes::default();
        for file in files {
            let full = workdir.join(&file);
            let text = match fs::read_to_string(&full) {
                Ok(text) => text,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(GitSafeError::at_path(full, e)),
            };
            let base = file
                .parent()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            parsed.extend(pattern::parse_at(&text, &base, filter_name));
        }

        let info = self.git_dir().join("info").join("attributes");
        if let Ok(text) = fs::read_to_string(&info) {
            parsed.extend(pattern::parse(&text, filter_name));
        }

        Ok(parsed)
    }
}

fn is_tool_path(path: &Path) -> bool {
    path.file_name().is_some_and(|n| n == ATTRIBUTES_FILE)
        || path
            .components()
            .next()
            .is_some_and(|c| c.as_os_str() == PROTECTED_KEY_DIR)
}

fn read_input<R: Read>(input: &mut R) -> Result<Zeroizing<Vec<u8>>> {
    let mut buf = Zeroizing::new(Vec::new());
    input.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Clean filter: plaintext in, record out. Records pass through unchanged.
pub fn clean_filter<R: Read, W: Write>(keys: &KeyMaterial, input: &mut R, output: &mut W) -> Result<()> {
    let data = read_input(input)?;
    if record::is_encrypted(&data) {
        output.write_all(&data)?;
    } else {
        output.write_all(&record::seal(keys, &data)?)?;
    }
    output.flush()?;
    Ok(())
}

/// Smudge filter: record in, plaintext out. A record that fails verification produces no
/// output and an error, so git aborts the checkout of that file.
pub fn smudge_filter<R: Read, W: Write>(keys: &KeyMaterial, input: &mut R, output: &mut W) -> Result<()> {
    let data = read_input(input)?;
    if record::is_encrypted(&data) {
        let plaintext = record::open(keys, &data)?;
        output.write_all(&plaintext)?;
    } else {
        tracing::debug!("smudge input is not encrypted, passing through");
        output.write_all(&data)?;
    }
    output.flush()?;
    Ok(())
}

/// Diff textconv: plaintext when the key is available, a placeholder line otherwise.
pub fn diff_filter<R: Read, W: Write>(
    keys: Option<&KeyMaterial>,
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    let data = read_input(input)?;
    match (record::is_encrypted(&data), keys) {
        (true, Some(keys)) => output.write_all(&record::open(keys, &data)?)?,
        (true, None) => writeln!(output, "{ENCRYPTED_PLACEHOLDER}")?,
        (false, _) => output.write_all(&data)?,
    }
    output.flush()?;
    Ok(())
}
