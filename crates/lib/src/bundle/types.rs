use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::platform::Platform;
use crate::util::hash::{ContentHash, FileHashError};

/// Function runtime an artifact is built for.
///
/// The runtime fixes the toolchain image used for bundling and the
/// conventional name of the produced executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FunctionRuntime {
  /// Go 1.x managed runtime; the handler is the executable itself.
  #[default]
  #[serde(rename = "go1.x")]
  Go1x,
  /// OS-only runtime; the runtime executes a file named `bootstrap`.
  #[serde(rename = "provided.al2023")]
  ProvidedAl2023,
}

impl FunctionRuntime {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Go1x => "go1.x",
      Self::ProvidedAl2023 => "provided.al2023",
    }
  }

  /// Executable name the runtime expects inside the deployment package.
  pub fn binary_name(&self) -> &'static str {
    match self {
      Self::Go1x => "main",
      Self::ProvidedAl2023 => "bootstrap",
    }
  }

  /// Handler string declared on the function.
  pub fn handler(&self) -> &'static str {
    self.binary_name()
  }

  /// Standard build image for this runtime.
  pub fn bundling_image(&self) -> &'static str {
    match self {
      Self::Go1x => "public.ecr.aws/sam/build-go1.x:latest",
      Self::ProvidedAl2023 => "public.ecr.aws/sam/build-provided.al2023:latest",
    }
  }
}

impl fmt::Display for FunctionRuntime {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for FunctionRuntime {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "go1.x" | "go" => Ok(Self::Go1x),
      "provided.al2023" | "provided" => Ok(Self::ProvidedAl2023),
      other => Err(format!(
        "unsupported function runtime '{}' (expected go1.x or provided.al2023)",
        other
      )),
    }
  }
}

/// Everything needed to produce one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
  /// Directory containing the program's entry point. Mounted read-only.
  pub source_dir: PathBuf,
  /// Directory receiving the artifact. Created if absent, mounted read-write.
  pub output_dir: PathBuf,
  pub platform: Platform,
  pub runtime: FunctionRuntime,
  /// Upper bound on the build; `None` waits for the toolchain indefinitely.
  pub timeout: Option<Duration>,
}

impl BuildRequest {
  pub fn new(source_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
    Self {
      source_dir: source_dir.into(),
      output_dir: output_dir.into(),
      platform: Platform::lambda_default(),
      runtime: FunctionRuntime::default(),
      timeout: None,
    }
  }

  pub fn with_platform(mut self, platform: Platform) -> Self {
    self.platform = platform;
    self
  }

  pub fn with_runtime(mut self, runtime: FunctionRuntime) -> Self {
    self.runtime = runtime;
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  /// File name of the artifact, e.g. `main` or `main.exe`.
  pub fn artifact_name(&self) -> String {
    format!("{}{}", self.runtime.binary_name(), self.platform.os.exe_suffix())
  }

  /// Where the artifact lands on the host.
  pub fn artifact_path(&self) -> PathBuf {
    self.output_dir.join(self.artifact_name())
  }
}

/// How the artifact was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleStrategy {
  Local,
  Container,
}

impl fmt::Display for BundleStrategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Local => write!(f, "local"),
      Self::Container => write!(f, "container"),
    }
  }
}

/// A successfully built artifact. Failure is reported as [`BuildError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
  pub artifact_path: PathBuf,
  pub sha256: ContentHash,
  pub size: u64,
  #[serde(with = "duration_millis")]
  pub duration: Duration,
  pub strategy: BundleStrategy,
}

mod duration_millis {
  use std::time::Duration;

  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
  }
}

/// Errors that can occur while building an artifact.
#[derive(Debug, Error)]
pub enum BuildError {
  /// The source directory does not exist.
  #[error("source directory not found: {}", .0.display())]
  SourceNotFound(PathBuf),

  /// The source path exists but is not a directory.
  #[error("source path is not a directory: {}", .0.display())]
  SourceNotDirectory(PathBuf),

  /// The source directory has nothing the toolchain can build.
  #[error("no {toolchain} entry point in {}", .path.display())]
  MissingEntryPoint { path: PathBuf, toolchain: &'static str },

  /// A directory to be mounted into the build environment is inaccessible.
  #[error("cannot mount {}: {source}", .path.display())]
  Mount {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The isolated build environment could not be launched.
  #[error("build environment unavailable ({runtime}): {message}")]
  EnvironmentUnavailable { runtime: String, message: String },

  /// The toolchain ran and reported errors.
  #[error("compilation failed with exit code {code:?}{}", format_stderr(.stderr))]
  CompileFailed { code: Option<i32>, stderr: String },

  /// The build did not finish within the requested bound.
  #[error("build timed out after {0:?}")]
  Timeout(Duration),

  /// The toolchain exited successfully but left no artifact behind.
  #[error("build finished but artifact is missing: {}", .0.display())]
  ArtifactMissing(PathBuf),

  #[error("artifact is not executable: {}", .0.display())]
  ArtifactNotExecutable(PathBuf),

  #[error("local bundling failed: {0}")]
  LocalBundle(String),

  #[error(transparent)]
  Hash(#[from] FileHashError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

fn format_stderr(stderr: &str) -> String {
  if stderr.is_empty() {
    String::new()
  } else {
    format!(":\n{}", stderr)
  }
}
