//! Temp-file-then-rename writes.
//!
//! An [`AtomicFile`] is a temporary file created next to its target. Nothing is visible
//! under the target name until [`AtomicFile::commit`] renames it into place; dropping the
//! writer on any other path (early return, error, panic) deletes the temporary file and
//! leaves the target untouched.

use crate::error::{GitSafeError, Result};
use std::fs::{File, Permissions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub struct AtomicFile {
    target: PathBuf,
    temp: NamedTempFile,
}

impl AtomicFile {
    /// Create the temporary file in the target's directory, owner read/write only.
    pub fn create(target: impl AsRef<Path>) -> Result<Self> {
        let target = target.as_ref().to_path_buf();
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix(".git-safe-").suffix(".tmp");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(Permissions::from_mode(0o600));
        }

        let temp = builder
            .tempfile_in(&dir)
            .map_err(|e| GitSafeError::at_path(&dir, e))?;

        Ok(Self { target, temp })
    }

    pub fn file_mut(&mut self) -> &mut File {
        self.temp.as_file_mut()
    }

    /// Flush to disk, optionally apply `permissions`, then rename over the target.
    pub fn commit(mut self, permissions: Option<Permissions>) -> Result<()> {
        self.temp.flush()?;
        self.temp.as_file().sync_all()?;
        if let Some(permissions) = permissions {
            self.temp.as_file().set_permissions(permissions)?;
        }

        let AtomicFile { target, temp } = self;
        temp.persist(&target)
            .map_err(|e| GitSafeError::at_path(&target, e.error))?;
        Ok(())
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.temp.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.temp.flush()
    }
}
