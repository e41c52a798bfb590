//! Target and host platforms.
//!
//! A [`Platform`] pairs a [`TargetOs`] with an [`Arch`]. It knows how the Go
//! toolchain and container runtimes spell it, which is all the builder needs
//! to cross-compile for a function runtime.

pub mod arch;
pub mod os;
pub mod paths;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use arch::Arch;
pub use os::TargetOs;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
  #[error("unsupported operating system '{0}' (expected linux, darwin or windows)")]
  UnknownOs(String),

  #[error("unsupported architecture '{0}' (expected x86_64 or aarch64)")]
  UnknownArch(String),

  #[error("invalid platform '{0}' (expected <arch>-<os>, e.g. x86_64-linux)")]
  InvalidTriple(String),
}

/// Platform identifier combining architecture and OS (e.g., "x86_64-linux")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
  pub arch: Arch,
  pub os: TargetOs,
}

impl Platform {
  pub fn new(arch: Arch, os: TargetOs) -> Self {
    Self { arch, os }
  }

  /// The platform every function runtime executes on.
  pub fn lambda_default() -> Self {
    Self::new(Arch::X86_64, TargetOs::Linux)
  }

  /// Detect the host platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: TargetOs::current()?,
    })
  }

  /// Returns the platform triple string (e.g., "aarch64-darwin")
  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }

  /// Platform string passed to `docker run --platform` (e.g., "linux/amd64").
  ///
  /// Toolchain images are linux-only, so the container is always linux on the
  /// target architecture. The target OS reaches the toolchain through `GOOS`.
  pub fn container_platform(&self) -> String {
    format!("{}/{}", TargetOs::Linux.goos(), self.arch.goarch())
  }
}

impl Default for Platform {
  fn default() -> Self {
    Self::lambda_default()
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

impl FromStr for Platform {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (arch, os) = s
      .split_once('-')
      .ok_or_else(|| PlatformError::InvalidTriple(s.to_string()))?;
    Ok(Self::new(arch.parse()?, os.parse()?))
  }
}

/// Returns the platform triple for the host (e.g., "aarch64-darwin")
///
/// Returns `None` if the host platform is not supported
pub fn platform_triple() -> Option<String> {
  Platform::current().map(|p| p.triple())
}
