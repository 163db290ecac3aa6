use super::{print_report, Context};
use git_safe::engine::{Engine, Operation};
use git_safe::error::Result;
use std::path::PathBuf;

/// Lock the repository (encrypt the working tree and remove filters)
pub fn lock(forget_key: bool, paths: &[PathBuf], jobs: Option<usize>) -> Result<()> {
    println!("Locking repository...");

    let ctx = Context::open(jobs)?;
    let keys = ctx.load_keys()?;
    let rules = ctx.rules()?;
    let candidates = ctx.candidates(paths)?;

    let engine = Engine::new(ctx.workdir()?, &keys).with_options(ctx.engine_options(false)?);
    let report = engine.run(Operation::Encrypt, &candidates, &rules);
    // Filters and key stay in place if anything could not be encrypted
    print_report(&report)?;

    ctx.repo.remove_filters(&ctx.settings.filter_name)?;

    if forget_key {
        ctx.key_manager().remove_key()?;
        println!("Local key removed");
    }

    println!("Repository locked!");
    println!("\nEncrypted files will now show their encrypted content.");
    println!("Run 'git-safe unlock' to restore access.");

    Ok(())
}
