use super::Context;
use git_safe::error::Result;
use git_safe::gpg::TrustAnchor;
use git_safe::key::ProtectedKeys;
use git_safe::pattern::is_in_scope;
use git_safe::record;
use std::fs::File;

/// Show key state and whether each in-scope file is currently encrypted
pub fn status() -> Result<()> {
    let ctx = Context::open(None)?;
    let key_manager = ctx.key_manager();
    let filter_name = &ctx.settings.filter_name;

    if !key_manager.is_initialized() && !key_manager.has_key() {
        println!("git-safe is not initialized in this repository");
        return Ok(());
    }

    match key_manager.load_key() {
        Ok(keys) => println!("Key:      {} (available)", keys.fingerprint()),
        Err(err) => println!("Key:      unavailable ({err})"),
    }
    println!(
        "Filters:  {}",
        if ctx.repo.filters_configured(filter_name) {
            "configured"
        } else {
            "not configured (locked)"
        }
    );

    let protected = ProtectedKeys::new(ctx.workdir()?);
    let envelopes = protected.envelopes(ctx.gpg().envelope_extension())?;
    println!("Envelopes: {}", envelopes.len());
    for envelope in &envelopes {
        println!("  {}", envelope.display());
    }

    let rules = ctx.rules()?;
    let workdir = ctx.workdir()?;
    println!("\nFiles:");
    let mut listed = 0;
    for path in ctx.repo.candidate_paths()? {
        let scoped = is_in_scope(&path, &rules);
        let encrypted = match File::open(workdir.join(&path)) {
            Ok(mut file) => Some(record::sniff(&mut file)?),
            Err(_) => None,
        };

        match (scoped, encrypted) {
            (true, Some(true)) => println!("  encrypted:    {}", path.display()),
            (true, Some(false)) => println!("  plaintext:    {}", path.display()),
            (true, None) => println!("  missing:      {}", path.display()),
            (false, Some(true)) => println!(
                "  WARNING: {} is encrypted but not in scope",
                path.display()
            ),
            (false, _) => continue,
        }
        listed += 1;
    }
    if listed == 0 {
        println!("  (no files match a filter={filter_name} rule)");
    }

    Ok(())
}
