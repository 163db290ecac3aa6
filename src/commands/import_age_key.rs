use std::fs;
use std::path::Path;

use super::Context;
use git_safe::error::{GitSafeError, Result};
use git_safe::key::unprotect;
use git_safe::rage::AgeAnchor;

/// Import an age-encrypted key using an SSH identity.
pub fn import_age_key(encrypted_path: &Path, identity_path: &Path) -> Result<()> {
    println!(
        "Importing age key from {} using identity {}",
        encrypted_path.display(),
        identity_path.display()
    );

    let ctx = Context::open(None)?;

    let envelope =
        fs::read(encrypted_path).map_err(|e| GitSafeError::at_path(encrypted_path, e))?;
    let identity = fs::read_to_string(identity_path)
        .map_err(|e| GitSafeError::at_path(identity_path, e))?;
    let identity_label = identity_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("ssh identity");

    let anchor = AgeAnchor::new().with_identity(identity, identity_label);
    let keys = unprotect(&envelope, &anchor)?;
    ctx.key_manager().save_key(&keys)?;

    println!("Repository key {} imported using SSH identity.", keys.fingerprint());
    println!("Run 'git-safe unlock' to decrypt the working tree.");
    Ok(())
}
