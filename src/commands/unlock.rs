use super::{print_report, Context};
use git_safe::engine::{Engine, Operation};
use git_safe::error::Result;
use git_safe::key::ProtectedKeys;
use std::path::{Path, PathBuf};

/// Obtain the key, enable the filters and decrypt the working tree
pub fn unlock(key_file: Option<&Path>, paths: &[PathBuf], jobs: Option<usize>) -> Result<()> {
    println!("Unlocking repository...");

    let ctx = Context::open(jobs)?;
    let key_manager = ctx.key_manager();

    let keys = if let Some(key_path) = key_file {
        println!("Importing key from: {}", key_path.display());
        key_manager.import_key(key_path)?
    } else if key_manager.has_key() {
        key_manager.load_key()?
    } else {
        let protected = ProtectedKeys::new(ctx.workdir()?);
        println!(
            "Opening committed key with {}",
            ctx.settings.gpg.program.display()
        );
        let keys = protected.unlock(&ctx.gpg())?;
        key_manager.save_key(&keys)?;
        keys
    };
    println!("Using key {}", keys.fingerprint());

    ctx.repo.configure_filters(&ctx.settings.filter_name)?;

    let rules = ctx.rules()?;
    let candidates = ctx.candidates(paths)?;
    let engine = Engine::new(ctx.workdir()?, &keys).with_options(ctx.engine_options(false)?);
    let report = engine.run(Operation::Decrypt, &candidates, &rules);
    print_report(&report)?;

    println!("Repository unlocked successfully!");
    Ok(())
}
