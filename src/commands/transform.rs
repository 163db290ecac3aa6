use super::{print_report, Context};
use git_safe::engine::{Engine, Operation};
use git_safe::error::Result;
use std::path::PathBuf;

/// Encrypt in-scope files in the working tree
pub fn encrypt(backup: bool, paths: &[PathBuf], jobs: Option<usize>) -> Result<()> {
    run(Operation::Encrypt, backup, paths, jobs)
}

/// Decrypt in-scope files in the working tree
pub fn decrypt(backup: bool, paths: &[PathBuf], jobs: Option<usize>) -> Result<()> {
    run(Operation::Decrypt, backup, paths, jobs)
}

/// Check every in-scope encrypted file without modifying anything
pub fn verify(paths: &[PathBuf], jobs: Option<usize>) -> Result<()> {
    run(Operation::Verify, false, paths, jobs)
}

fn run(op: Operation, backup: bool, paths: &[PathBuf], jobs: Option<usize>) -> Result<()> {
    let ctx = Context::open(jobs)?;
    // Key problems abort before any file is touched
    let keys = ctx.load_keys()?;
    let rules = ctx.rules()?;
    let candidates = ctx.candidates(paths)?;

    let label = match op {
        Operation::Encrypt => "Encrypting",
        Operation::Decrypt => "Decrypting",
        Operation::Verify => "Verifying",
    };
    println!("{label} files...");

    let engine = Engine::new(ctx.workdir()?, &keys).with_options(ctx.engine_options(backup)?);
    let report = engine.run(op, &candidates, &rules);
    print_report(&report)
}
