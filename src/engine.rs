//! # File Transformation Engine
//!
//! Drives each file through
//!
//! ```text
//! SELECTED → ENCRYPTING → COMMITTED
//! SELECTED → DECRYPTING → VERIFIED → COMMITTED
//! ```
//!
//! with `Failed` reachable from every active state. Output is always written to a temporary
//! file beside the target and renamed over it on commit (see [`crate::atomic`]), so an
//! interrupted transformation leaves the original bytes in place.
//!
//! Batches never stop at the first bad file: every path gets an [`Outcome`] in the
//! [`BatchReport`]. With `jobs > 1` files are spread over a scoped worker pool; key material
//! is only ever borrowed, never copied or mutated.

use crate::atomic::AtomicFile;
use crate::error::GitSafeError;
use crate::key::KeyMaterial;
use crate::pattern::{is_in_scope, PatternRule};
use crate::record;
use crate::report::{BatchReport, Outcome, ReportEntry, Stage};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Seek};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Encrypt,
    Decrypt,
    Verify,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Copy each file here before it is rewritten.
    pub backup_dir: Option<PathBuf>,
    pub jobs: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            backup_dir: None,
            jobs: 1,
        }
    }
}

/// Candidate paths split by the pattern matcher.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub selected: Vec<PathBuf>,
    pub out_of_scope: Vec<PathBuf>,
}

/// Split `paths` into in-scope and out-of-scope, preserving order and dropping duplicates.
pub fn select(paths: &[PathBuf], rules: &[PatternRule]) -> Selection {
    let mut selection = Selection::default();
    for path in dedup(paths) {
        if is_in_scope(&path, rules) {
            selection.selected.push(path);
        } else {
            selection.out_of_scope.push(path);
        }
    }
    selection
}

fn dedup(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .filter(|p| seen.insert(p.as_path()))
        .cloned()
        .collect()
}

type Failure = (Stage, GitSafeError);

fn at(stage: Stage) -> impl FnOnce(GitSafeError) -> Failure {
    move |error| (stage, error)
}

/// Encrypts, decrypts and verifies files under a working-tree root.
pub struct Engine<'k> {
    root: PathBuf,
    keys: &'k KeyMaterial,
    options: EngineOptions,
}

impl<'k> Engine<'k> {
    pub fn new(root: impl Into<PathBuf>, keys: &'k KeyMaterial) -> Self {
        Self {
            root: root.into(),
            keys,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Path relative to the root when possible, otherwise unchanged.
    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    fn open(&self, full: &Path) -> Result<File, Failure> {
        File::open(full).map_err(|e| (Stage::Selected, GitSafeError::at_path(full, e)))
    }

    /// Sniff the magic, leaving the file positioned at the start.
    fn is_encrypted(&self, file: &mut File, full: &Path) -> Result<bool, Failure> {
        let wrap = |e: io::Error| (Stage::Selected, GitSafeError::at_path(full, e));
        let encrypted = record::sniff(file).map_err(wrap)?;
        file.rewind().map_err(wrap)?;
        Ok(encrypted)
    }

    pub fn encrypt_file(&self, path: &Path) -> Outcome {
        finish(path, Operation::Encrypt, self.try_encrypt(path))
    }

    pub fn decrypt_file(&self, path: &Path) -> Outcome {
        finish(path, Operation::Decrypt, self.try_decrypt(path))
    }

    pub fn verify_file(&self, path: &Path) -> Outcome {
        finish(path, Operation::Verify, self.try_verify(path))
    }

    pub fn process(&self, op: Operation, path: &Path) -> Outcome {
        match op {
            Operation::Encrypt => self.encrypt_file(path),
            Operation::Decrypt => self.decrypt_file(path),
            Operation::Verify => self.verify_file(path),
        }
    }

    fn try_encrypt(&self, path: &Path) -> Result<Outcome, Failure> {
        let full = self.resolve(path);
        let mut file = self.open(&full)?;
        if self.is_encrypted(&mut file, &full)? {
            return Ok(Outcome::SkippedAlreadyInTargetState);
        }
        let permissions = file
            .metadata()
            .map_err(|e| (Stage::Selected, GitSafeError::at_path(&full, e)))?
            .permissions();

        let mut out = AtomicFile::create(&full).map_err(at(Stage::Encrypting))?;
        record::seal_stream(self.keys, &mut file, &mut out).map_err(at(Stage::Encrypting))?;

        self.backup(path, &mut file).map_err(at(Stage::Encrypting))?;
        out.commit(Some(permissions)).map_err(at(Stage::Committed))?;
        Ok(Outcome::Succeeded)
    }

    fn try_decrypt(&self, path: &Path) -> Result<Outcome, Failure> {
        let full = self.resolve(path);
        let mut file = self.open(&full)?;
        if !self.is_encrypted(&mut file, &full)? {
            return Ok(Outcome::SkippedAlreadyInTargetState);
        }
        let permissions = file
            .metadata()
            .map_err(|e| (Stage::Selected, GitSafeError::at_path(&full, e)))?
            .permissions();

        let mut out = AtomicFile::create(&full).map_err(at(Stage::Decrypting))?;
        // Verifies the whole record before writing any plaintext into `out`
        record::open_stream(self.keys, &mut file, &mut out).map_err(at(Stage::Decrypting))?;

        self.backup(path, &mut file).map_err(at(Stage::Verified))?;
        out.commit(Some(permissions)).map_err(at(Stage::Committed))?;
        Ok(Outcome::Succeeded)
    }

    fn try_verify(&self, path: &Path) -> Result<Outcome, Failure> {
        let full = self.resolve(path);
        let mut file = self.open(&full)?;
        if !self.is_encrypted(&mut file, &full)? {
            return Ok(Outcome::SkippedAlreadyInTargetState);
        }
        record::verify_stream(self.keys, &mut file).map_err(at(Stage::Decrypting))?;
        Ok(Outcome::Succeeded)
    }

    /// Copy the current bytes of `file` to `<backup_dir>/<path>.<timestamp>.bak`.
    fn backup(&self, path: &Path, file: &mut File) -> crate::error::Result<()> {
        let Some(dir) = &self.options.backup_dir else {
            return Ok(());
        };

        let relative = self.relative(path);
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        // Paths outside the root land flat in the backup directory
        let relative = if relative.is_absolute() {
            PathBuf::from(&name)
        } else {
            relative
        };
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let target = dir
            .join(&relative)
            .with_file_name(format!("{name}.{stamp}.bak"));

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| GitSafeError::at_path(parent, e))?;
        }

        file.rewind()?;
        let mut out = AtomicFile::create(&target)?;
        io::copy(file, &mut out)?;
        out.commit(None)?;
        tracing::debug!(path = %path.display(), backup = %target.display(), "backup written");
        Ok(())
    }

    pub fn encrypt_batch(&self, paths: &[PathBuf]) -> BatchReport {
        self.batch(Operation::Encrypt, paths)
    }

    pub fn decrypt_batch(&self, paths: &[PathBuf]) -> BatchReport {
        self.batch(Operation::Decrypt, paths)
    }

    pub fn verify_batch(&self, paths: &[PathBuf]) -> BatchReport {
        self.batch(Operation::Verify, paths)
    }

    /// Select from `candidates` with `rules`, run `op` on the selected paths, and record
    /// everything else as out of scope. Entries follow the candidate order.
    pub fn run(&self, op: Operation, candidates: &[PathBuf], rules: &[PatternRule]) -> BatchReport {
        let candidates: Vec<PathBuf> = candidates.iter().map(|p| self.relative(p)).collect();
        let candidates = dedup(&candidates);
        let selection = select(&candidates, rules);

        // Both lists are ordered subsequences of `candidates`
        let mut processed = self
            .batch(op, &selection.selected)
            .into_entries()
            .into_iter()
            .peekable();
        let mut entries = Vec::with_capacity(candidates.len());
        for path in candidates {
            match processed.next_if(|entry| entry.path == path) {
                Some(entry) => entries.push(entry),
                None => entries.push(ReportEntry {
                    path,
                    outcome: Outcome::SkippedOutOfScope,
                }),
            }
        }
        BatchReport::from_entries(entries)
    }

    fn batch(&self, op: Operation, paths: &[PathBuf]) -> BatchReport {
        let paths = dedup(paths);
        let jobs = self.options.jobs.clamp(1, paths.len().max(1));
        tracing::debug!(?op, files = paths.len(), jobs, "starting batch");

        let report = if jobs == 1 {
            let mut report = BatchReport::new();
            for path in &paths {
                report.push(path.clone(), self.process(op, path));
            }
            report
        } else {
            self.batch_parallel(op, &paths, jobs)
        };

        tracing::info!(?op, summary = %report.summary(), "batch finished");
        report
    }

    fn batch_parallel(&self, op: Operation, paths: &[PathBuf], jobs: usize) -> BatchReport {
        let cursor = AtomicUsize::new(0);
        let results: Mutex<Vec<(usize, ReportEntry)>> = Mutex::new(Vec::with_capacity(paths.len()));

        thread::scope(|scope| {
            for _ in 0..jobs {
                scope.spawn(|| loop {
                    let idx = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(path) = paths.get(idx) else {
                        break;
                    };
                    let outcome = self.process(op, path);
                    results.lock().push((
                        idx,
                        ReportEntry {
                            path: path.clone(),
                            outcome,
                        },
                    ));
                });
            }
        });

        let mut results = results.into_inner();
        results.sort_by_key(|(idx, _)| *idx);
        BatchReport::from_entries(results.into_iter().map(|(_, entry)| entry).collect())
    }
}

fn finish(path: &Path, op: Operation, result: Result<Outcome, Failure>) -> Outcome {
    match result {
        Ok(outcome) => {
            tracing::debug!(path = %path.display(), ?op, %outcome, "file processed");
            outcome
        }
        Err((stage, error)) => {
            tracing::warn!(path = %path.display(), ?op, %stage, %error, "file failed");
            Outcome::failed(stage, error)
        }
    }
}
