//! Test utilities for crossbundle-lib.
//!
//! [`FakeRuntime`] writes a shell script that accepts docker's `run`
//! arguments, records them, and then behaves like a successful, failing,
//! silent or hanging build. `kill <name>` is recorded and succeeds. Unix only.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::bundle::ContainerRuntime;

const SCRIPT_PRELUDE: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "fake-runtime version 1.0"
  exit 0
fi
if [ "$1" = "kill" ]; then
  printf 'kill %s\n' "$2" >> "$FAKE_LOG"
  exit 0
fi
for arg in "$@"; do
  printf '%s\n' "$arg" >> "$FAKE_LOG"
done
out=""
script=""
while [ $# -gt 0 ]; do
  case "$1" in
    -v)
      case "$2" in
        *:/asset-output:rw) out="${2%:/asset-output:rw}" ;;
      esac
      shift 2 ;;
    *)
      script="$1"
      shift ;;
  esac
done
name=$(printf '%s' "$script" | sed -n 's|.*-o /asset-output/\([^ ]*\).*|\1|p')
"#;

/// A scripted stand-in for a container runtime.
pub struct FakeRuntime {
  script: PathBuf,
  log: PathBuf,
}

impl FakeRuntime {
  /// Writes a small deterministic executable named after the `-o` target.
  pub fn succeeding(dir: &Path) -> Self {
    Self::with_behavior(
      dir,
      "printf 'fake artifact\\n' > \"$out/$name\"\nchmod 755 \"$out/$name\"\n",
    )
  }

  /// Prints `stderr` and exits with `code`, leaving a partial artifact behind.
  pub fn failing(dir: &Path, code: i32, stderr: &str) -> Self {
    Self::with_behavior(
      dir,
      &format!(
        "printf 'partial' > \"$out/$name\"\necho '{}' >&2\nexit {}\n",
        stderr.replace('\'', ""),
        code
      ),
    )
  }

  /// Exits successfully without writing anything.
  pub fn silent(dir: &Path) -> Self {
    Self::with_behavior(dir, "exit 0\n")
  }

  /// Never finishes on its own.
  pub fn hanging(dir: &Path) -> Self {
    Self::with_behavior(dir, "exec sleep 30\n")
  }

  fn with_behavior(dir: &Path, behavior: &str) -> Self {
    let script = dir.join("fake-runtime");
    let log = dir.join("fake-runtime.log");
    let content = format!(
      "{}{}",
      SCRIPT_PRELUDE.replace("$FAKE_LOG", &log.display().to_string()),
      behavior
    );
    std::fs::write(&script, content).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    Self { script, log }
  }

  pub fn runtime(&self) -> ContainerRuntime {
    ContainerRuntime::Custom(self.script.clone())
  }

  /// Whether a container `run` reached the runtime.
  pub fn was_invoked(&self) -> bool {
    self.log.exists()
  }

  /// Arguments of every `run`, one per element.
  pub fn recorded_args(&self) -> Vec<String> {
    self
      .log_lines()
      .into_iter()
      .filter(|line| !line.starts_with("kill "))
      .collect()
  }

  /// Names passed to `kill`, in order.
  pub fn killed_containers(&self) -> Vec<String> {
    self
      .log_lines()
      .iter()
      .filter_map(|line| line.strip_prefix("kill ").map(str::to_string))
      .collect()
  }

  fn log_lines(&self) -> Vec<String> {
    std::fs::read_to_string(&self.log)
      .unwrap_or_default()
      .lines()
      .map(str::to_string)
      .collect()
  }
}

/// Creates a minimal Go program under `dir/src` and returns its path.
pub fn go_source(dir: &Path) -> PathBuf {
  let source = dir.join("src");
  std::fs::create_dir_all(&source).unwrap();
  std::fs::write(source.join("go.mod"), "module example.com/migration\n\ngo 1.21\n").unwrap();
  std::fs::write(
    source.join("main.go"),
    "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"ok\")\n}\n",
  )
  .unwrap();
  source
}
