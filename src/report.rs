//! Per-file outcomes of a batch operation.

use crate::error::GitSafeError;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where in the per-file state machine a transformation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Selected,
    Encrypting,
    Decrypting,
    Verified,
    Committed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Selected => "selected",
            Stage::Encrypting => "encrypting",
            Stage::Decrypting => "decrypting",
            Stage::Verified => "verified",
            Stage::Committed => "committed",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum Outcome {
    Succeeded,
    SkippedOutOfScope,
    SkippedAlreadyInTargetState,
    Failed { stage: Stage, error: GitSafeError },
}

impl Outcome {
    pub fn failed(stage: Stage, error: GitSafeError) -> Self {
        Outcome::Failed { stage, error }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn error(&self) -> Option<&GitSafeError> {
        match self {
            Outcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Succeeded => f.write_str("ok"),
            Outcome::SkippedOutOfScope => f.write_str("skipped (not in scope)"),
            Outcome::SkippedAlreadyInTargetState => f.write_str("skipped (already done)"),
            Outcome::Failed { stage, error } => write!(f, "FAILED while {stage}: {error}"),
        }
    }
}

#[derive(Debug)]
pub struct ReportEntry {
    pub path: PathBuf,
    pub outcome: Outcome,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} skipped, {} failed",
            self.succeeded, self.skipped, self.failed
        )
    }
}

/// Ordered list of `(path, outcome)` pairs. Entries are only ever appended.
#[derive(Debug, Default)]
pub struct BatchReport {
    entries: Vec<ReportEntry>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: impl Into<PathBuf>, outcome: Outcome) {
        self.entries.push(ReportEntry {
            path: path.into(),
            outcome,
        });
    }


    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn outcome_for(&self, path: impl AsRef<Path>) -> Option<&Outcome> {
        let path = path.as_ref();
        self.entries
            .iter()
            .find(|e| e.path == path)
            .map(|e| &e.outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.outcome.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for entry in &self.entries {
            match entry.outcome {
                Outcome::Succeeded => summary.succeeded += 1,
                Outcome::SkippedOutOfScope | Outcome::SkippedAlreadyInTargetState => {
                    summary.skipped += 1
                }
                Outcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }

    pub(crate) fn into_entries(self) -> Vec<ReportEntry> {
        self.entries
    }

    pub(crate) fn from_entries(entries: Vec<ReportEntry>) -> Self {
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_each_kind() {
        let mut report = BatchReport::new();
        report.push("a", Outcome::Succeeded);
        report.push("b", Outcome::SkippedOutOfScope);
        report.push("c", Outcome::SkippedAlreadyInTargetState);
        report.push(
            "d",
            Outcome::failed(
                Stage::Decrypting,
                GitSafeError::IntegrityViolation("tag mismatch".into()),
            ),
        );

        assert_eq!(
            report.summary(),
            Summary {
                succeeded: 1,
                skipped: 2,
                failed: 1
            }
        );
        assert!(report.has_failures());
        assert_eq!(report.failures().count(), 1);
        assert!(matches!(
            report.outcome_for("d").and_then(Outcome::error),
            Some(GitSafeError::IntegrityViolation(_))
        ));
    }

    #[test]
    fn failed_outcome_names_stage() {
        let outcome = Outcome::failed(Stage::Committed, GitSafeError::FileNotFound("x".into()));
        let text = outcome.to_string();
        assert!(text.contains("committed"));
        assert!(text.contains("File not found"));
    }

    #[test]
    fn empty_report_has_no_failures() {
        let report = BatchReport::new();
        assert!(report.is_empty());
        assert!(!report.has_failures());
    }
}
