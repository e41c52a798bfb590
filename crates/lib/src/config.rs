//! Project configuration.
//!
//! A `crossbundle.toml` names the function to build, the target platform,
//! the container runtime and the resources the function is wired to.
//! Relative paths are resolved against the directory holding the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::bundle::{ArtifactBuilder, BuildRequest, BuildResult, ContainerRuntime, FunctionRuntime};
use crate::platform::paths::assets_dir;
use crate::platform::{Arch, Platform, PlatformError, TargetOs};
use crate::stack::{MigrationFunction, MigrationFunctionProps, Stack, StackError};
use crate::wiring::{CacheEndpoint, ResourceWiring};

/// Id of the bucket declaration in the synthesized stack.
pub const BUCKET_ID: &str = "migration-bucket";
/// Id of the cache cluster declaration in the synthesized stack.
pub const CACHE_CLUSTER_ID: &str = "memory-db";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid target: {0}")]
  Target(#[from] PlatformError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
  pub function: FunctionSection,
  #[serde(default)]
  pub target: TargetSection,
  #[serde(default)]
  pub container: ContainerSection,
  pub wiring: WiringSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionSection {
  #[serde(default = "default_function_id")]
  pub id: String,
  pub source: PathBuf,
  #[serde(default)]
  pub runtime: FunctionRuntime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetSection {
  pub os: String,
  pub arch: String,
}

impl Default for TargetSection {
  fn default() -> Self {
    let platform = Platform::lambda_default();
    Self {
      os: platform.os.as_str().to_string(),
      arch: platform.arch.as_str().to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerSection {
  /// `docker`, `podman` or a path to a docker-compatible program.
  pub runtime: String,
  pub image: Option<String>,
}

impl Default for ContainerSection {
  fn default() -> Self {
    Self {
      runtime: "docker".to_string(),
      image: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WiringSection {
  pub bucket: String,
  pub cache_address: String,
  pub cache_port: u16,
}

fn default_function_id() -> String {
  MigrationFunction::DEFAULT_ID.to_string()
}

impl ProjectConfig {
  /// Load a project file.
  ///
  /// `function.source` is made absolute relative to the file's directory.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let mut config: ProjectConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    let base = path
      .parent()
      .filter(|parent| !parent.as_os_str().is_empty())
      .map(Path::to_path_buf)
      .unwrap_or_else(|| PathBuf::from("."));
    if config.function.source.is_relative() {
      let joined = base.join(&config.function.source);
      config.function.source = dunce::canonicalize(&joined).unwrap_or(joined);
    }

    debug!(path = %path.display(), function = %config.function.id, "loaded project config");
    Ok(config)
  }

  pub fn platform(&self) -> Result<Platform, ConfigError> {
    let os: TargetOs = self.target.os.parse()?;
    let arch: Arch = self.target.arch.parse()?;
    Ok(Platform::new(arch, os))
  }

  /// The configured runtime, unless `CROSSBUNDLE_CONTAINER_RUNTIME` overrides it.
  pub fn container_runtime(&self) -> ContainerRuntime {
    ContainerRuntime::from_env().unwrap_or_else(|| ContainerRuntime::from(self.container.runtime.as_str()))
  }

  pub fn builder(&self) -> ArtifactBuilder {
    let builder = ArtifactBuilder::new(self.container_runtime());
    match &self.container.image {
      Some(image) => builder.with_image(image),
      None => builder,
    }
  }

  /// Where artifacts go when no output directory is given.
  pub fn default_output_dir(&self) -> PathBuf {
    assets_dir(&self.function.id)
  }

  pub fn to_request(&self, output_dir: Option<&Path>) -> Result<BuildRequest, ConfigError> {
    let output_dir = output_dir
      .map(Path::to_path_buf)
      .unwrap_or_else(|| self.default_output_dir());
    Ok(
      BuildRequest::new(&self.function.source, output_dir)
        .with_platform(self.platform()?)
        .with_runtime(self.function.runtime),
    )
  }

  pub fn wiring(&self) -> ResourceWiring {
    ResourceWiring::new(
      self.wiring.bucket.clone(),
      CacheEndpoint::new(self.wiring.cache_address.clone(), self.wiring.cache_port),
    )
  }

  /// Declare the bucket, the cache cluster and the function built as `artifact`.
  pub fn declare(&self, artifact: &BuildResult) -> Result<Stack, StackError> {
    let wiring = self.wiring();
    let mut stack = Stack::new(self.function.id.clone());
    let bucket = stack.add_bucket(BUCKET_ID, wiring.bucket_name)?;
    let cache = stack.add_cache_cluster(CACHE_CLUSTER_ID, wiring.cache)?;
    MigrationFunction::new(
      &mut stack,
      &self.function.id,
      artifact,
      self.function.runtime,
      MigrationFunctionProps { bucket, cache },
    )?;
    Ok(stack)
  }
}
