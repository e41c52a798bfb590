//! Isolated build environment.
//!
//! Builds run in a toolchain container started through a docker-compatible
//! CLI. The source directory is mounted read-only at [`ASSET_INPUT_DIR`] and
//! the output directory read-write at [`ASSET_OUTPUT_DIR`].

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::bundle::toolchain;
use crate::bundle::types::{BuildError, BuildRequest};
use crate::consts::{APP_NAME, ASSET_INPUT_DIR, ASSET_OUTPUT_DIR, CONTAINER_RUNTIME_ENV};

/// Exit status docker and podman use when the container could not be started.
const EXIT_RUNTIME_ERROR: i32 = 125;
/// The command inside the container exists but cannot be invoked.
const EXIT_NOT_EXECUTABLE: i32 = 126;
/// The command inside the container was not found.
const EXIT_NOT_FOUND: i32 = 127;

/// Lines of stderr kept in a compile failure.
const STDERR_TAIL_LINES: usize = 20;

static CONTAINER_SEQ: AtomicU64 = AtomicU64::new(0);

/// The program used to launch build containers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContainerRuntime {
  #[default]
  Docker,
  Podman,
  /// Any program accepting docker's `run` arguments.
  Custom(PathBuf),
}

impl ContainerRuntime {
  pub fn program(&self) -> &Path {
    match self {
      Self::Docker => Path::new("docker"),
      Self::Podman => Path::new("podman"),
      Self::Custom(path) => path,
    }
  }

  /// The runtime named by `CROSSBUNDLE_CONTAINER_RUNTIME`, if set and non-empty.
  pub fn from_env() -> Option<Self> {
    std::env::var(CONTAINER_RUNTIME_ENV)
      .ok()
      .map(|value| value.trim().to_string())
      .filter(|value| !value.is_empty())
      .map(|value| Self::from(value.as_str()))
  }

  /// Check that the runtime can be executed at all.
  pub async fn check_available(&self) -> Result<(), BuildError> {
    let output = Command::new(self.program())
      .arg("--version")
      .stdin(Stdio::null())
      .output()
      .await
      .map_err(|e| self.unavailable(spawn_message(&e)))?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(self.unavailable(format!("`--version` exited with {}: {}", output.status, stderr.trim())));
    }

    debug!(
      runtime = %self,
      version = %String::from_utf8_lossy(&output.stdout).trim(),
      "container runtime available"
    );
    Ok(())
  }

  fn unavailable(&self, message: String) -> BuildError {
    BuildError::EnvironmentUnavailable {
      runtime: self.to_string(),
      message,
    }
  }
}

impl From<&str> for ContainerRuntime {
  fn from(value: &str) -> Self {
    match value {
      "docker" => Self::Docker,
      "podman" => Self::Podman,
      other => Self::Custom(PathBuf::from(other)),
    }
  }
}

impl FromStr for ContainerRuntime {
  type Err = std::convert::Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(Self::from(s))
  }
}

impl fmt::Display for ContainerRuntime {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program().display())
  }
}

/// A bind mount from the host into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
  pub host: PathBuf,
  pub container: String,
  pub read_only: bool,
}

impl Mount {
  pub fn read_only(host: impl Into<PathBuf>, container: &str) -> Self {
    Self {
      host: host.into(),
      container: container.to_string(),
      read_only: true,
    }
  }

  pub fn read_write(host: impl Into<PathBuf>, container: &str) -> Self {
    Self {
      host: host.into(),
      container: container.to_string(),
      read_only: false,
    }
  }

  /// Value for `-v`, e.g. `/src:/asset-input:ro`.
  pub fn to_arg(&self) -> String {
    let mode = if self.read_only { "ro" } else { "rw" };
    format!("{}:{}:{}", self.host.display(), self.container, mode)
  }
}

/// A fully specified `run` of the build container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInvocation {
  /// Container name, unique per invocation, used to kill it on timeout.
  pub name: String,
  pub image: String,
  /// Value for `--platform`, e.g. `linux/amd64`.
  pub platform: String,
  /// `uid:gid` the container runs as, so outputs belong to the caller.
  pub user: Option<String>,
  pub mounts: Vec<Mount>,
  pub workdir: String,
  pub env: BTreeMap<String, String>,
  pub command: Vec<String>,
}

impl ContainerInvocation {
  /// Build the invocation compiling `request` with the Go toolchain.
  ///
  /// `source_dir` and `output_dir` are the host paths to mount; callers pass
  /// canonical forms of the request's directories.
  pub fn for_request(request: &BuildRequest, image: &str, source_dir: &Path, output_dir: &Path) -> Self {
    let output = format!("{}/{}", ASSET_OUTPUT_DIR, request.artifact_name());

    Self {
      name: container_name(),
      image: image.to_string(),
      platform: request.platform.container_platform(),
      user: host_user(),
      mounts: vec![
        Mount::read_only(source_dir, ASSET_INPUT_DIR),
        Mount::read_write(output_dir, ASSET_OUTPUT_DIR),
      ],
      workdir: ASSET_INPUT_DIR.to_string(),
      env: toolchain::container_env(&request.platform),
      command: vec!["bash".to_string(), "-c".to_string(), toolchain::build_script(&output)],
    }
  }

  /// Arguments following the runtime program.
  pub fn args(&self) -> Vec<String> {
    let mut args = vec![
      "run".to_string(),
      "--rm".to_string(),
      "--platform".to_string(),
      self.platform.clone(),
      "--name".to_string(),
      self.name.clone(),
    ];

    if let Some(user) = &self.user {
      args.push("--user".to_string());
      args.push(user.clone());
    }

    for mount in &self.mounts {
      args.push("-v".to_string());
      args.push(mount.to_arg());
    }

    args.push("-w".to_string());
    args.push(self.workdir.clone());

    for (key, value) in &self.env {
      args.push("-e".to_string());
      args.push(format!("{}={}", key, value));
    }

    args.push(self.image.clone());
    args.extend(self.command.iter().cloned());
    args
  }

  /// Run the container to completion.
  ///
  /// A runtime that cannot be spawned, or that reports it could not start the
  /// container, is an unavailable environment. Any other non-zero exit is a
  /// compile failure. With a timeout, the container is killed through the
  /// runtime when it expires, so nothing writes to the output afterwards.
  pub async fn run(&self, runtime: &ContainerRuntime, timeout: Option<Duration>) -> Result<(), BuildError> {
    info!(runtime = %runtime, image = %self.image, platform = %self.platform, "launching build container");

    let mut command = Command::new(runtime.program());
    command
      .args(self.args())
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);

    debug!(args = ?self.args(), "spawning container runtime");

    let child = command.spawn().map_err(|e| runtime.unavailable(spawn_message(&e)))?;

    let output = match timeout {
      Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
          self.kill(runtime).await;
          return Err(BuildError::Timeout(limit));
        }
      },
      None => child.wait_with_output().await?,
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
      debug!(stdout = %stdout.trim(), "container stdout");
    }

    if output.status.success() {
      return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
      debug!(stderr = %stderr, "container stderr");
    }

    Err(classify_failure(runtime, output.status.code(), &stderr))
  }

  /// Stop the named container. Dropping the client process alone leaves the
  /// container running under the daemon.
  async fn kill(&self, runtime: &ContainerRuntime) {
    info!(runtime = %runtime, container = %self.name, "killing timed out build container");
    let result = Command::new(runtime.program())
      .args(["kill", self.name.as_str()])
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::piped())
      .output()
      .await;

    match result {
      Ok(output) if output.status.success() => {}
      Ok(output) => warn!(
        container = %self.name,
        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
        "failed to kill build container"
      ),
      Err(e) => warn!(container = %self.name, error = %e, "failed to kill build container"),
    }
  }
}

fn container_name() -> String {
  let nanos = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.subsec_nanos())
    .unwrap_or_default();
  let seq = CONTAINER_SEQ.fetch_add(1, Ordering::Relaxed);
  format!("{}-{}-{}-{}", APP_NAME, std::process::id(), seq, nanos)
}

fn classify_failure(runtime: &ContainerRuntime, code: Option<i32>, stderr: &str) -> BuildError {
  match code {
    Some(EXIT_RUNTIME_ERROR) => runtime.unavailable(format!("container failed to start: {}", stderr.trim())),
    Some(EXIT_NOT_EXECUTABLE) | Some(EXIT_NOT_FOUND) => {
      runtime.unavailable(format!("toolchain not runnable in image: {}", stderr.trim()))
    }
    _ => BuildError::CompileFailed {
      code,
      stderr: stderr_tail(stderr),
    },
  }
}

fn stderr_tail(stderr: &str) -> String {
  let lines: Vec<&str> = stderr.trim_end().lines().collect();
  let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
  lines[start..].join("\n")
}

fn spawn_message(err: &io::Error) -> String {
  if err.kind() == io::ErrorKind::NotFound {
    "program not found".to_string()
  } else {
    err.to_string()
  }
}

#[cfg(unix)]
fn host_user() -> Option<String> {
  let uid = rustix::process::getuid().as_raw();
  let gid = rustix::process::getgid().as_raw();
  Some(format!("{}:{}", uid, gid))
}

#[cfg(not(unix))]
fn host_user() -> Option<String> {
  None
}
