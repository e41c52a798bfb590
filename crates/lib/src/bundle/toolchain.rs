//! Go toolchain invocation.
//!
//! Produces the cross-compilation environment and the `go build` command
//! used both inside the build container and by the host-local strategy.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use crate::platform::Platform;

pub const TOOLCHAIN_NAME: &str = "go";

/// Linker flags stripping symbol tables and the build id, so identical
/// sources produce identical binaries.
const LDFLAGS: &str = "-ldflags=-s -w -buildid=";

/// Returns true if `source_dir` holds a Go module or at least one Go file.
pub fn has_entry_point(source_dir: &Path) -> io::Result<bool> {
  if source_dir.join("go.mod").is_file() {
    return Ok(true);
  }

  for entry in std::fs::read_dir(source_dir)? {
    let path = entry?.path();
    if path.is_file() && path.extension().is_some_and(|ext| ext == "go") {
      return Ok(true);
    }
  }

  Ok(false)
}

/// Variables selecting the target platform and disabling cgo, which keeps the
/// binary statically linked.
pub fn cross_env(platform: &Platform) -> BTreeMap<String, String> {
  BTreeMap::from([
    ("GOOS".to_string(), platform.os.goos().to_string()),
    ("GOARCH".to_string(), platform.arch.goarch().to_string()),
    ("CGO_ENABLED".to_string(), "0".to_string()),
  ])
}

/// [`cross_env`] plus writable caches for a container running as the host user.
pub fn container_env(platform: &Platform) -> BTreeMap<String, String> {
  let mut env = cross_env(platform);
  env.insert("GOCACHE".to_string(), "/tmp/go-cache".to_string());
  env.insert("GOPATH".to_string(), "/tmp/go".to_string());
  env.insert("HOME".to_string(), "/tmp".to_string());
  env
}

/// Arguments to `go` building the package in the working directory into `output`.
pub fn build_args(output: &str) -> Vec<String> {
  vec![
    "build".to_string(),
    "-trimpath".to_string(),
    LDFLAGS.to_string(),
    "-o".to_string(),
    output.to_string(),
    ".".to_string(),
  ]
}

/// Shell script form of [`build_args`] for `bash -c`.
pub fn build_script(output: &str) -> String {
  let args: Vec<String> = build_args(output).iter().map(|arg| shell_quote(arg)).collect();
  format!("{} {}", TOOLCHAIN_NAME, args.join(" "))
}

/// Quote `arg` for a POSIX shell if it contains anything but safe characters.
pub fn shell_quote(arg: &str) -> String {
  let safe = !arg.is_empty()
    && arg
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '=' | ':' | ','));
  if safe {
    arg.to_string()
  } else {
    format!("'{}'", arg.replace('\'', r"'\''"))
  }
}
