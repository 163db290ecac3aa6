use super::Context;
use git_safe::error::Result;
use std::path::Path;

/// Export the symmetric key to a file
pub fn export_key(output_path: &Path) -> Result<()> {
    println!("Exporting key to: {}", output_path.display());

    let ctx = Context::open(None)?;
    let keys = ctx.load_keys()?;
    ctx.key_manager().export_key(output_path)?;

    println!("Key {} exported successfully!", keys.fingerprint());
    println!("\nWARNING: Keep this key file secure!");
    println!("Anyone with this key can decrypt your encrypted files.");

    Ok(())
}

/// Import a symmetric key from a file
pub fn import_key(input_path: &Path) -> Result<()> {
    println!("Importing key from: {}", input_path.display());

    let ctx = Context::open(None)?;
    let keys = ctx.key_manager().import_key(input_path)?;

    println!("Key {} imported successfully!", keys.fingerprint());
    println!("Run 'git-safe unlock' to decrypt the working tree.");

    Ok(())
}
