//! # git-safe
//!
//! Transparent encryption of selected files in a git working tree.
//!
//! ## Features
//!
//! - **Deterministic authenticated encryption**: AES-256-CTR with an HMAC-SHA256 tag;
//!   identical content always yields an identical record, so diffs stay quiet
//! - **Fail-closed decryption**: the tag is checked over the whole record before any
//!   plaintext is produced
//! - **`.gitattributes` scoping**: a file is in scope when the last matching rule sets
//!   `filter=git-safe`
//! - **Atomic rewrites**: every file is replaced by temp-file-then-rename, optionally with a
//!   timestamped backup
//! - **Batch reports**: one bad file never stops the rest; every path gets an outcome
//! - **Key distribution through GPG**: the keyfile is committed wrapped for each
//!   collaborator; SSH keys via age behind the `age` feature
//!
//! ## Quick Start
//!
//! ```bash
//! git-safe init --gpg-recipient alice@example.com
//!
//! echo "*.secret filter=git-safe diff=git-safe" >> .gitattributes
//! git add .gitattributes .git-safe/
//! git commit -m "Configure git-safe"
//!
//! echo "api_key=hunter2" > prod.secret
//! git add prod.secret          # stored encrypted
//! ```
//!
//! On another machine:
//!
//! ```bash
//! git clone <url> && cd <repo>
//! git-safe unlock              # opens .git-safe/<you>.gpg with your GPG key
//! ```
//!
//! ## Encrypted File Record
//!
//! ```text
//! [\0GITSAFE][version: 1][nonce: 16][ciphertext][tag: 32]
//! ```
//!
//! See [`record`] for the nonce derivation and tag coverage.
//!
//! ## Module Overview
//!
//! - [`crypto`] - AES-256-CTR keystream, HMAC-SHA256, nonce and subkey derivation
//! - [`key`] - key material, keyfile format, local storage, committed envelopes
//! - [`gpg`] - the [`TrustAnchor`] seam and the `gpg` subprocess implementation
//! - [`record`] - the encrypted file record, in memory and streaming
//! - [`pattern`] - `.gitattributes` parsing and last-match-wins scoping
//! - [`engine`] - per-file state machine, batches and the worker pool
//! - [`report`] - per-file outcomes
//! - [`atomic`] - temp-file-then-rename writer
//! - [`git`] - repository access and the clean/smudge/diff filter driver
//! - [`settings`] - `.git-safe.toml` and `GIT_SAFE_*` configuration
//! - [`error`] - error type

pub mod atomic;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod git;
pub mod gpg;
pub mod key;
pub mod pattern;
#[cfg(feature = "age")]
pub mod rage;
pub mod record;
pub mod report;
pub mod settings;

pub use engine::{select, Engine, EngineOptions, Operation, Selection};
pub use error::{GitSafeError, Result};
pub use git::GitRepo;
pub use gpg::{GpgCli, TrustAnchor};
pub use key::{generate_keypair, protect, unprotect, KeyManager, KeyMaterial, ProtectedKeys};
pub use pattern::{is_in_scope, PatternRule};
pub use report::{BatchReport, Outcome, Stage};
pub use settings::Settings;
