use assert_cmd::{cargo::cargo_bin_cmd, Command};
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;
use tempfile::TempDir;

/// Create a new temporary git repository with user config set.
pub fn create_git_repo() -> TempDir {
    let temp = TempDir::new().expect("failed to create temp dir");

    git(temp.path(), &["init", "-q"]);
    git(temp.path(), &["config", "user.email", "test@example.com"]);
    git(temp.path(), &["config", "user.name", "Test User"]);

    temp
}

/// Convenience helper for spawning the git-safe binary via assert_cmd.
#[allow(dead_code)]
pub fn git_safe_cmd() -> Command {
    cargo_bin_cmd!("git-safe")
}

/// Absolute path to the git-safe test binary.
#[allow(dead_code)]
pub fn git_safe_bin() -> &'static str {
    env!("CARGO_BIN_EXE_git-safe")
}

/// PATH with the test binary's directory first, so git can find the filter driver.
#[allow(dead_code)]
pub fn path_with_binary() -> String {
    let bin_dir = Path::new(git_safe_bin())
        .parent()
        .expect("binary has a parent directory")
        .to_path_buf();
    let mut paths = vec![bin_dir];
    if let Some(existing) = std::env::var_os("PATH") {
        paths.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(paths)
        .expect("valid PATH")
        .to_string_lossy()
        .into_owned()
}

/// Run git in `dir` with the filter driver reachable; panics on failure.
#[allow(dead_code)]
pub fn git(dir: &Path, args: &[&str]) -> Vec<u8> {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .env("PATH", path_with_binary())
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    output.stdout
}

/// Run `git-safe init` in `dir`.
#[allow(dead_code)]
pub fn init_git_safe(dir: &Path) {
    git_safe_cmd()
        .arg("init")
        .current_dir(dir)
        .assert()
        .success();
}

/// Write `content` to `dir/name`, creating parent directories.
#[allow(dead_code)]
pub fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create parent dir");
    }
    std::fs::write(&path, content).expect("failed to write file");
    path
}

/// Does the file start with the encrypted record magic?
#[allow(dead_code)]
pub fn is_encrypted(path: &Path) -> bool {
    std::fs::read(path)
        .map(|bytes| bytes.starts_with(b"\0GITSAFE"))
        .unwrap_or(false)
}

/// A stand-in `gpg` that "encrypts" by tagging the payload with the recipient and only
/// "decrypts" envelopes addressed to `$FAKE_GPG_IDENTITY`.
#[cfg(unix)]
#[allow(dead_code)]
pub fn fake_gpg(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = r#"#!/bin/sh
recipient=""
mode=""
while [ $# -gt 0 ]; do
  case "$1" in
    --recipient) recipient="$2"; shift ;;
    --encrypt) mode=encrypt ;;
    --decrypt) mode=decrypt ;;
  esac
  shift
done
if [ "$mode" = "encrypt" ]; then
  printf 'FAKEGPG:%s\n' "$recipient"
  cat
elif [ "$mode" = "decrypt" ]; then
  IFS= read -r header
  if [ "$header" != "FAKEGPG:$FAKE_GPG_IDENTITY" ]; then
    echo "gpg: decryption failed: No secret key" >&2
    exit 2
  fi
  cat
else
  exit 2
fi
"#;
    let path = dir.join("fake-gpg");
    std::fs::write(&path, script).expect("failed to write fake gpg");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("failed to chmod fake gpg");
    path
}
