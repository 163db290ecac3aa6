use git_safe::error::{GitSafeError, Result};
use git_safe::git::{clean_filter, diff_filter, smudge_filter, GitRepo};
use git_safe::key::KeyManager;
use std::fs::File;
use std::io;
use std::path::Path;

/// Clean filter implementation (called by git during add/commit)
pub fn clean() -> Result<()> {
    let repo = GitRepo::open(".")?;
    let keys = KeyManager::new(repo.git_dir()).load_key()?;
    clean_filter(&keys, &mut io::stdin().lock(), &mut io::stdout().lock())
}

/// Smudge filter implementation (called by git during checkout)
pub fn smudge() -> Result<()> {
    let repo = GitRepo::open(".")?;
    let keys = KeyManager::new(repo.git_dir()).load_key()?;
    smudge_filter(&keys, &mut io::stdin().lock(), &mut io::stdout().lock())
}

/// Diff textconv implementation (called by git during diff)
pub fn diff(file: &Path) -> Result<()> {
    // Without a key the textconv still works; it just cannot show plaintext
    let keys = GitRepo::open(".")
        .and_then(|repo| KeyManager::new(repo.git_dir()).load_key())
        .ok();
    let mut input = File::open(file).map_err(|e| GitSafeError::at_path(file, e))?;
    diff_filter(keys.as_ref(), &mut input, &mut io::stdout().lock())
}
