use super::Context;
use git_safe::error::Result;
use git_safe::key::ProtectedKeys;

/// Initialize git-safe in the repository
pub fn init(gpg_recipients: &[String]) -> Result<()> {
    println!("Initializing git-safe...");

    let ctx = Context::open(None)?;
    let key_manager = ctx.key_manager();

    if key_manager.is_initialized() {
        println!("Repository already initialized for git-safe");
        return Ok(());
    }

    key_manager.init_dirs()?;

    let keys = key_manager.generate_key()?;
    println!("Generated new encryption key ({})", keys.fingerprint());

    let filter_name = &ctx.settings.filter_name;
    ctx.repo.configure_filters(filter_name)?;
    println!("Configured git filters");

    if !gpg_recipients.is_empty() {
        let protected = ProtectedKeys::new(ctx.workdir()?);
        let gpg = ctx.gpg();
        for recipient in gpg_recipients {
            let path = protected.add_recipient(&keys, recipient, &gpg)?;
            println!("Wrapped key for {recipient}: {}", path.display());
        }
    }

    println!("\nInitialization complete!");
    println!("\nNext steps:");
    println!("1. Create a .gitattributes file to specify which files to encrypt");
    println!("   Example: echo '*.secret filter={filter_name} diff={filter_name}' >> .gitattributes");
    println!("2. Commit the .gitattributes file (and .git-safe/ if you added recipients)");
    println!("3. Use 'git-safe add-gpg-user' to grant access to other users");

    Ok(())
}
