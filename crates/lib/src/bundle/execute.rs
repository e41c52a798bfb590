//! Artifact realization.
//!
//! [`ArtifactBuilder::build`] validates the request, lets a local strategy
//! try first, falls back to the build container, and verifies that exactly
//! the expected executable was produced.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::fs;
use tracing::{debug, info, warn};

use crate::bundle::container::{ContainerInvocation, ContainerRuntime};
use crate::bundle::local::LocalBundleFn;
use crate::bundle::toolchain;
use crate::bundle::types::{BuildError, BuildRequest, BuildResult, BundleStrategy};
use crate::util::hash::{ContentHash, hash_file};

/// Builds artifacts. Holds everything that is not part of a single request.
#[derive(Debug, Clone, Default)]
pub struct ArtifactBuilder {
  pub runtime: ContainerRuntime,
  /// Replaces the function runtime's standard bundling image.
  pub image: Option<String>,
  /// Strategy tried before launching a container.
  pub local: Option<LocalBundleFn>,
}

impl ArtifactBuilder {
  pub fn new(runtime: ContainerRuntime) -> Self {
    Self {
      runtime,
      image: None,
      local: None,
    }
  }

  pub fn with_image(mut self, image: impl Into<String>) -> Self {
    self.image = Some(image.into());
    self
  }

  pub fn with_local(mut self, local: LocalBundleFn) -> Self {
    self.local = Some(local);
    self
  }

  /// Build one artifact.
  ///
  /// Path problems with the source are reported before anything is launched.
  /// A single attempt is made; on failure any partial artifact is removed.
  pub async fn build(&self, request: &BuildRequest) -> Result<BuildResult, BuildError> {
    let started = Instant::now();
    info!(
      source = %request.source_dir.display(),
      output = %request.output_dir.display(),
      platform = %request.platform,
      runtime = %request.runtime,
      "building artifact"
    );

    let source_dir = validate_source(&request.source_dir).await?;
    let output_dir = prepare_output(&request.output_dir).await?;
    let artifact = output_dir.join(request.artifact_name());
    remove_if_present(&artifact).await?;

    let produced = self.produce(request, &source_dir, &output_dir).await;
    let strategy = match produced {
      Ok(strategy) => strategy,
      Err(e) => {
        discard_partial(&artifact).await;
        return Err(e);
      }
    };

    let size = match verify_artifact(&artifact).await {
      Ok(size) => size,
      Err(e) => {
        discard_partial(&artifact).await;
        return Err(e);
      }
    };
    let sha256 = hash_artifact(&artifact).await?;
    let duration = started.elapsed();

    info!(artifact = %artifact.display(), sha256 = %sha256, size, strategy = %strategy, "artifact built");

    Ok(BuildResult {
      artifact_path: artifact,
      sha256,
      size,
      duration,
      strategy,
    })
  }

  async fn produce(
    &self,
    request: &BuildRequest,
    source_dir: &Path,
    output_dir: &Path,
  ) -> Result<BundleStrategy, BuildError> {
    if self.try_local(request, output_dir).await? {
      return Ok(BundleStrategy::Local);
    }

    self.runtime.check_available().await?;

    let image = self
      .image
      .as_deref()
      .unwrap_or_else(|| request.runtime.bundling_image());
    let invocation = ContainerInvocation::for_request(request, image, source_dir, output_dir);
    invocation.run(&self.runtime, request.timeout).await?;

    Ok(BundleStrategy::Container)
  }

  async fn try_local(&self, request: &BuildRequest, output_dir: &Path) -> Result<bool, BuildError> {
    let Some(local) = self.local else {
      return Ok(false);
    };

    let timeout = request.timeout;
    let request = request.clone();
    let output_dir = output_dir.to_path_buf();
    let task = tokio::task::spawn_blocking(move || local(&request, &output_dir));
    let joined = match timeout {
      Some(limit) => tokio::time::timeout(limit, task)
        .await
        .map_err(|_| BuildError::Timeout(limit))?,
      None => task.await,
    };
    let bundled = joined.map_err(|e| BuildError::LocalBundle(e.to_string()))??;

    debug!(bundled, "local bundling attempted");
    Ok(bundled)
  }
}

async fn validate_source(path: &Path) -> Result<PathBuf, BuildError> {
  let metadata = match fs::metadata(path).await {
    Ok(metadata) => metadata,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(BuildError::SourceNotFound(path.to_path_buf())),
    Err(e) => return Err(mount_error(path, e)),
  };

  if !metadata.is_dir() {
    return Err(BuildError::SourceNotDirectory(path.to_path_buf()));
  }

  if !toolchain::has_entry_point(path).map_err(|e| mount_error(path, e))? {
    return Err(BuildError::MissingEntryPoint {
      path: path.to_path_buf(),
      toolchain: toolchain::TOOLCHAIN_NAME,
    });
  }

  dunce::canonicalize(path).map_err(|e| mount_error(path, e))
}

async fn prepare_output(path: &Path) -> Result<PathBuf, BuildError> {
  fs::create_dir_all(path).await.map_err(|e| mount_error(path, e))?;
  dunce::canonicalize(path).map_err(|e| mount_error(path, e))
}

fn mount_error(path: &Path, source: io::Error) -> BuildError {
  BuildError::Mount {
    path: path.to_path_buf(),
    source,
  }
}

async fn remove_if_present(path: &Path) -> Result<(), BuildError> {
  match fs::remove_file(path).await {
    Ok(()) => {
      debug!(path = %path.display(), "removed stale artifact");
      Ok(())
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e.into()),
  }
}

async fn discard_partial(path: &Path) {
  if let Err(e) = remove_if_present(path).await {
    warn!(path = %path.display(), error = %e, "failed to remove partial artifact");
  }
}

/// Hash on the blocking pool; artifacts are tens of megabytes.
async fn hash_artifact(path: &Path) -> Result<ContentHash, BuildError> {
  let path = path.to_path_buf();
  tokio::task::spawn_blocking(move || hash_file(&path))
    .await
    .map_err(|e| BuildError::Io(io::Error::other(e)))?
    .map_err(BuildError::from)
}

/// Returns the artifact's size once it is known to be a usable executable.
async fn verify_artifact(path: &Path) -> Result<u64, BuildError> {
  let metadata = match fs::metadata(path).await {
    Ok(metadata) if metadata.is_file() => metadata,
    _ => return Err(BuildError::ArtifactMissing(path.to_path_buf())),
  };

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 == 0 {
      return Err(BuildError::ArtifactNotExecutable(path.to_path_buf()));
    }
  }

  Ok(metadata.len())
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
  use super::*;
  use crate::util::testutil::{FakeRuntime, go_source};
  use std::time::Duration;
  use tempfile::TempDir;
  use tracing_test::traced_test;

  fn request(temp: &TempDir) -> BuildRequest {
    BuildRequest::new(go_source(temp.path()), temp.path().join("out"))
  }

  fn builder(fake: &FakeRuntime) -> ArtifactBuilder {
    ArtifactBuilder::new(fake.runtime())
  }

  #[tokio::test]
  async fn build_produces_exactly_one_executable() {
    let temp = TempDir::new().unwrap();
    let fake = FakeRuntime::succeeding(temp.path());
    let request = request(&temp);

    let result = builder(&fake).build(&request).await.unwrap();

    assert_eq!(result.strategy, BundleStrategy::Container);
    assert_eq!(result.artifact_path, dunce::canonicalize(request.output_dir.join("main")).unwrap());
    let entries: Vec<_> = std::fs::read_dir(&request.output_dir).unwrap().collect();
    assert_eq!(entries.len(), 1);
    assert!(result.size > 0);
    assert_eq!(result.sha256, hash_file(&result.artifact_path).unwrap());
  }

  #[tokio::test]
  async fn build_creates_missing_output_directory() {
    let temp = TempDir::new().unwrap();
    let fake = FakeRuntime::succeeding(temp.path());
    let request = BuildRequest::new(go_source(temp.path()), temp.path().join("nested/deeper/out"));

    builder(&fake).build(&request).await.unwrap();

    assert!(temp.path().join("nested/deeper/out/main").is_file());
  }

  #[tokio::test]
  async fn build_passes_mounts_to_runtime() {
    let temp = TempDir::new().unwrap();
    let fake = FakeRuntime::succeeding(temp.path());
    let request = request(&temp);

    builder(&fake).build(&request).await.unwrap();

    let args = fake.recorded_args();
    let source = dunce::canonicalize(&request.source_dir).unwrap();
    assert!(args.contains(&format!("{}:/asset-input:ro", source.display())));
    assert!(args.iter().any(|a| a.ends_with(":/asset-output:rw")));
    assert!(args.contains(&"public.ecr.aws/sam/build-go1.x:latest".to_string()));
  }

  #[tokio::test]
  async fn image_override_replaces_runtime_image() {
    let temp = TempDir::new().unwrap();
    let fake = FakeRuntime::succeeding(temp.path());

    builder(&fake)
      .with_image("golang:1.22")
      .build(&request(&temp))
      .await
      .unwrap();

    assert!(fake.recorded_args().contains(&"golang:1.22".to_string()));
  }

  #[tokio::test]
  async fn compile_error_reports_failure_and_leaves_no_artifact() {
    let temp = TempDir::new().unwrap();
    let fake = FakeRuntime::failing(temp.path(), 2, "./main.go:5:1: syntax error: unexpected }");
    let request = request(&temp);

    let err = builder(&fake).build(&request).await.unwrap_err();

    match err {
      BuildError::CompileFailed { code, stderr } => {
        assert_eq!(code, Some(2));
        assert!(stderr.contains("syntax error"));
      }
      other => panic!("unexpected error: {other}"),
    }
    assert!(!request.artifact_path().exists());
  }

  #[tokio::test]
  async fn missing_source_fails_before_launching() {
    let temp = TempDir::new().unwrap();
    let fake = FakeRuntime::succeeding(temp.path());
    let request = BuildRequest::new(temp.path().join("does-not-exist"), temp.path().join("out"));

    let err = builder(&fake).build(&request).await.unwrap_err();

    assert!(matches!(err, BuildError::SourceNotFound(_)));
    assert!(!fake.was_invoked());
  }

  #[tokio::test]
  async fn source_without_entry_point_is_rejected() {
    let temp = TempDir::new().unwrap();
    let fake = FakeRuntime::succeeding(temp.path());
    let source = temp.path().join("empty");
    std::fs::create_dir(&source).unwrap();

    let err = builder(&fake)
      .build(&BuildRequest::new(&source, temp.path().join("out")))
      .await
      .unwrap_err();

    assert!(matches!(err, BuildError::MissingEntryPoint { toolchain: "go", .. }));
    assert!(!fake.was_invoked());
  }

  #[tokio::test]
  async fn source_file_is_not_a_directory() {
    let temp = TempDir::new().unwrap();
    let fake = FakeRuntime::succeeding(temp.path());
    let file = temp.path().join("main.go");
    std::fs::write(&file, "package main").unwrap();

    let err = builder(&fake)
      .build(&BuildRequest::new(&file, temp.path().join("out")))
      .await
      .unwrap_err();

    assert!(matches!(err, BuildError::SourceNotDirectory(_)));
  }

  #[tokio::test]
  async fn absent_runtime_is_environment_unavailable() {
    let temp = TempDir::new().unwrap();
    let runtime = ContainerRuntime::Custom(temp.path().join("no-such-runtime"));

    let err = ArtifactBuilder::new(runtime).build(&request(&temp)).await.unwrap_err();

    match err {
      BuildError::EnvironmentUnavailable { message, .. } => assert_eq!(message, "program not found"),
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn daemon_failure_is_environment_unavailable() {
    let temp = TempDir::new().unwrap();
    let fake = FakeRuntime::failing(temp.path(), 125, "Cannot connect to the Docker daemon");

    let err = builder(&fake).build(&request(&temp)).await.unwrap_err();

    assert!(matches!(err, BuildError::EnvironmentUnavailable { .. }));
  }

  #[tokio::test]
  async fn successful_exit_without_artifact_is_not_success() {
    let temp = TempDir::new().unwrap();
    let fake = FakeRuntime::silent(temp.path());

    let err = builder(&fake).build(&request(&temp)).await.unwrap_err();

    assert!(matches!(err, BuildError::ArtifactMissing(_)));
  }

  #[tokio::test]
  async fn timeout_kills_the_build() {
    let temp = TempDir::new().unwrap();
    let fake = FakeRuntime::hanging(temp.path());
    let request = request(&temp).with_timeout(Duration::from_millis(500));

    let err = builder(&fake).build(&request).await.unwrap_err();

    assert!(matches!(err, BuildError::Timeout(d) if d == Duration::from_millis(500)));
    assert!(!request.artifact_path().exists());

    let args = fake.recorded_args();
    let name_pos = args.iter().position(|a| a == "--name").unwrap();
    let killed = fake.killed_containers();
    assert_eq!(killed, vec![args[name_pos + 1].clone()]);
  }

  #[tokio::test]
  async fn identical_inputs_produce_identical_artifacts() {
    let temp = TempDir::new().unwrap();
    let fake = FakeRuntime::succeeding(temp.path());
    let source = go_source(temp.path());

    let first = builder(&fake)
      .build(&BuildRequest::new(&source, temp.path().join("out-1")))
      .await
      .unwrap();
    let second = builder(&fake)
      .build(&BuildRequest::new(&source, temp.path().join("out-2")))
      .await
      .unwrap();

    assert_eq!(first.sha256, second.sha256);
    assert_eq!(
      std::fs::read(&first.artifact_path).unwrap(),
      std::fs::read(&second.artifact_path).unwrap()
    );
  }

  #[tokio::test]
  async fn stale_artifact_is_not_reported_as_output() {
    let temp = TempDir::new().unwrap();
    let fake = FakeRuntime::silent(temp.path());
    let request = request(&temp);
    std::fs::create_dir_all(&request.output_dir).unwrap();
    std::fs::write(request.artifact_path(), "old build").unwrap();

    // The runtime writes nothing, so a leftover file must not count as output.
    let err = builder(&fake).build(&request).await.unwrap_err();

    assert!(matches!(err, BuildError::ArtifactMissing(_)));
    assert!(!request.artifact_path().exists());
  }

  fn local_writes_artifact(request: &BuildRequest, output_dir: &Path) -> Result<bool, BuildError> {
    use std::os::unix::fs::PermissionsExt;
    let path = output_dir.join(request.artifact_name());
    std::fs::write(&path, "local build")?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(true)
  }

  fn local_overruns(_request: &BuildRequest, _output_dir: &Path) -> Result<bool, BuildError> {
    std::thread::sleep(Duration::from_secs(1));
    Ok(true)
  }

  #[tokio::test]
  async fn timeout_bounds_the_local_strategy() {
    let temp = TempDir::new().unwrap();
    let fake = FakeRuntime::succeeding(temp.path());
    let request = request(&temp).with_timeout(Duration::from_millis(100));

    let err = builder(&fake)
      .with_local(local_overruns)
      .build(&request)
      .await
      .unwrap_err();

    assert!(matches!(err, BuildError::Timeout(d) if d == Duration::from_millis(100)));
    assert!(!fake.was_invoked());
  }

  fn local_declines(_request: &BuildRequest, _output_dir: &Path) -> Result<bool, BuildError> {
    Ok(false)
  }

  #[tokio::test]
  async fn local_strategy_skips_container() {
    let temp = TempDir::new().unwrap();
    let fake = FakeRuntime::succeeding(temp.path());

    let result = builder(&fake)
      .with_local(local_writes_artifact)
      .build(&request(&temp))
      .await
      .unwrap();

    assert_eq!(result.strategy, BundleStrategy::Local);
    assert!(!fake.was_invoked());
  }

  #[tokio::test]
  #[traced_test]
  async fn declining_local_strategy_falls_back_to_container() {
    let temp = TempDir::new().unwrap();
    let fake = FakeRuntime::succeeding(temp.path());

    let result = builder(&fake)
      .with_local(local_declines)
      .build(&request(&temp))
      .await
      .unwrap();

    assert_eq!(result.strategy, BundleStrategy::Container);
    assert!(fake.was_invoked());
    assert!(logs_contain("launching build container"));
  }

  #[tokio::test]
  async fn non_executable_artifact_is_rejected() {
    fn local_writes_plain_file(request: &BuildRequest, output_dir: &Path) -> Result<bool, BuildError> {
      std::fs::write(output_dir.join(request.artifact_name()), "not executable")?;
      Ok(true)
    }

    let temp = TempDir::new().unwrap();
    let fake = FakeRuntime::succeeding(temp.path());
    let request = request(&temp);

    let err = builder(&fake)
      .with_local(local_writes_plain_file)
      .build(&request)
      .await
      .unwrap_err();

    assert!(matches!(err, BuildError::ArtifactNotExecutable(_)));
    assert!(!request.artifact_path().exists());
  }
}
