use std::fs;
use std::path::Path;

use super::Context;
use git_safe::error::{GitSafeError, Result};
use git_safe::key::{protect, sanitize_label, ProtectedKeys};
use git_safe::rage::{recipient_label, AgeAnchor};

/// Add an SSH recipient using age encryption.
pub fn add_ssh_user(ssh_key_path: &Path, alias: Option<&str>) -> Result<()> {
    println!("Adding SSH (age) user from: {}", ssh_key_path.display());

    let ctx = Context::open(None)?;
    let keys = ctx.load_keys()?;
    let ssh_key = fs::read_to_string(ssh_key_path)
        .map_err(|e| GitSafeError::at_path(ssh_key_path, e))?;

    let name = alias
        .map(sanitize_label)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| recipient_label(&ssh_key, ssh_key_path));

    let anchor = AgeAnchor::new();
    let envelope = protect(&keys, &ssh_key, &anchor)?;

    let protected = ProtectedKeys::new(ctx.workdir()?);
    fs::create_dir_all(protected.dir())?;
    let path = protected.path_for(&name, "age");
    fs::write(&path, envelope).map_err(|e| GitSafeError::at_path(&path, e))?;

    println!("Encrypted key saved to {}", path.display());
    println!("Commit it; the SSH user can then run 'git-safe import-age-key'.");

    Ok(())
}
