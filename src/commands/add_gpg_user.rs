use super::Context;
use git_safe::error::Result;
use git_safe::key::ProtectedKeys;

/// Add a GPG user who can unlock the repository
pub fn add_gpg_user(gpg_id: &str) -> Result<()> {
    println!("Adding GPG user: {}", gpg_id);

    let ctx = Context::open(None)?;
    let keys = ctx.load_keys()?;

    let protected = ProtectedKeys::new(ctx.workdir()?);
    let path = protected.add_recipient(&keys, gpg_id, &ctx.gpg())?;

    println!("Successfully added GPG user: {}", gpg_id);
    println!("Encrypted key saved to: {}", path.display());
    println!("Commit it so {gpg_id} can run 'git-safe unlock' after cloning.");

    Ok(())
}
