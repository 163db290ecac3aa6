//! # Trust Anchor
//!
//! The symmetric keyfile is distributed to collaborators wrapped in an asymmetric
//! envelope. This crate never implements that asymmetric layer itself; it talks to an
//! external capability through [`TrustAnchor`].
//!
//! [`GpgCli`] is the default anchor and drives the `gpg` binary as a subprocess:
//!
//! - the program cannot be started → [`GitSafeError::TrustAnchorUnavailable`]
//! - the program runs longer than the configured timeout → it is killed and
//!   [`GitSafeError::TrustAnchorUnavailable`] is returned
//! - the program exits non-zero → [`GitSafeError::TrustAnchorRejected`] with its stderr

use crate::error::{GitSafeError, Result};
use crate::settings::GpgSettings;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use zeroize::Zeroizing;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// External asymmetric capability used to wrap and unwrap keyfiles.
pub trait TrustAnchor: Send + Sync {
    /// Wrap `plaintext` so that only `recipient`'s private key can open it.
    fn encrypt_for(&self, recipient: &str, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Open an envelope with whatever secret key material is available locally.
    fn decrypt_with_local_secret(&self, envelope: &[u8]) -> Result<Zeroizing<Vec<u8>>>;

    /// File extension used for committed envelopes produced by this anchor.
    fn envelope_extension(&self) -> &'static str {
        "gpg"
    }
}

/// GPG driven through its command-line interface.
#[derive(Debug, Clone)]
pub struct GpgCli {
    program: PathBuf,
    homedir: Option<PathBuf>,
    timeout: Duration,
}

impl Default for GpgCli {
    fn default() -> Self {
        Self::new("gpg")
    }
}

impl GpgCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            homedir: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_settings(settings: &GpgSettings) -> Self {
        Self {
            program: settings.program.clone(),
            homedir: settings.homedir.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--batch", "--yes", "--quiet"]);
        if let Some(homedir) = &self.homedir {
            cmd.arg("--homedir").arg(homedir);
        }
        cmd
    }

    /// Run gpg with `args`, feeding `input` on stdin, and return its stdout.
    fn run(&self, args: &[&str], input: &[u8]) -> Result<Vec<u8>> {
        let mut child = self
            .command()
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                GitSafeError::TrustAnchorUnavailable(format!(
                    "failed to start {}: {e}",
                    self.program.display()
                ))
            })?;

        let (Some(mut stdin), Some(mut stdout), Some(mut stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            return Err(GitSafeError::TrustAnchorUnavailable(
                "child process pipes unavailable".into(),
            ));
        };

        // Pipes are pumped on their own threads so a chatty child can never deadlock us
        let input = Zeroizing::new(input.to_vec());
        let writer = thread::spawn(move || stdin.write_all(&input));
        let out_reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });
        let err_reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).map(|_| buf)
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(GitSafeError::TrustAnchorUnavailable(format!(
                    "{} did not finish within {:?}",
                    self.program.display(),
                    self.timeout
                )));
            }
            thread::sleep(POLL_INTERVAL);
        };

        // gpg may stop reading early when it rejects the input; the exit status decides
        let _ = writer.join();
        let stdout = join_output(out_reader)?;
        let stderr = join_output(err_reader).unwrap_or_default();

        if !status.success() {
            let message = String::from_utf8_lossy(&stderr).trim().to_string();
            return Err(GitSafeError::TrustAnchorRejected(if message.is_empty() {
                format!("{} exited with {status}", self.program.display())
            } else {
                message
            }));
        }

        Ok(stdout)
    }
}

fn join_output(handle: thread::JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    match handle.join() {
        Ok(result) => Ok(result?),
        Err(_) => Err(GitSafeError::TrustAnchorUnavailable(
            "output reader thread panicked".into(),
        )),
    }
}

impl TrustAnchor for GpgCli {
    fn encrypt_for(&self, recipient: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        tracing::debug!(recipient, "encrypting keyfile with gpg");
        self.run(
            &[
                "--trust-model",
                "always",
                "--encrypt",
                "--recipient",
                recipient,
                "--output",
                "-",
            ],
            plaintext,
        )
    }

    fn decrypt_with_local_secret(&self, envelope: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        tracing::debug!("decrypting keyfile envelope with gpg");
        self.run(&["--decrypt", "--output", "-"], envelope)
            .map(Zeroizing::new)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn fake_gpg(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake-gpg");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    #[serial]
    fn missing_program_is_unavailable() {
        let gpg = GpgCli::new("/nonexistent/definitely-not-gpg");
        let err = gpg.encrypt_for("alice@example.com", b"key").unwrap_err();
        assert!(matches!(err, GitSafeError::TrustAnchorUnavailable(_)));
    }

    #[test]
    #[serial]
    fn nonzero_exit_is_rejected_with_stderr() {
        let dir = TempDir::new().unwrap();
        let gpg = GpgCli::new(fake_gpg(&dir, "echo 'no secret key' >&2\nexit 2"));

        match gpg.decrypt_with_local_secret(b"envelope").unwrap_err() {
            GitSafeError::TrustAnchorRejected(message) => {
                assert!(message.contains("no secret key"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn hanging_program_times_out() {
        let dir = TempDir::new().unwrap();
        let gpg = GpgCli::new(fake_gpg(&dir, "exec sleep 10"))
            .with_timeout(Duration::from_millis(200));

        let started = Instant::now();
        let err = gpg.encrypt_for("bob", b"key").unwrap_err();
        assert!(matches!(err, GitSafeError::TrustAnchorUnavailable(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    #[serial]
    fn stdout_is_returned_on_success() {
        let dir = TempDir::new().unwrap();
        let gpg = GpgCli::new(fake_gpg(&dir, "cat"));

        let out = gpg.encrypt_for("carol", b"payload bytes").unwrap();
        assert_eq!(out, b"payload bytes");
        let back = gpg.decrypt_with_local_secret(&out).unwrap();
        assert_eq!(back.as_slice(), b"payload bytes");
    }
}
