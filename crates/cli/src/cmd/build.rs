//! Implementation of the `crossbundle build` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;

use crossbundle_lib::bundle::{BuildResult, local};
use crossbundle_lib::config::ProjectConfig;
use crossbundle_lib::platform::{Arch, Platform, TargetOs};

use crate::cmd::{load_config, runtime};
use crate::output::{OutputFormat, format_bytes, format_duration, print_json, print_stat, print_success};

pub struct BuildArgs {
  pub config: PathBuf,
  pub out: Option<PathBuf>,
  pub os: Option<String>,
  pub arch: Option<String>,
  pub timeout: Option<Duration>,
  pub local: bool,
  pub format: OutputFormat,
}

pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let config = load_config(&args.config)?;
  let result = build_artifact(&config, &args)?;

  if args.format.is_json() {
    print_json(&json!({
      "artifact": result.artifact_path,
      "sha256": result.sha256,
      "size": result.size,
      "duration_ms": result.duration.as_millis() as u64,
      "strategy": result.strategy,
    }))?;
  } else {
    print_build_result(&result);
  }
  Ok(())
}

/// Build the configured artifact, applying command-line overrides.
pub(crate) fn build_artifact(config: &ProjectConfig, args: &BuildArgs) -> Result<BuildResult> {
  let mut request = config
    .to_request(args.out.as_deref())
    .context("Invalid target in project file")?;
  request.platform = override_platform(request.platform, args.os.as_deref(), args.arch.as_deref())?;
  if let Some(timeout) = args.timeout {
    request = request.with_timeout(timeout);
  }

  let mut builder = config.builder();
  if args.local {
    builder = builder.with_local(local::host_go);
  }

  let rt = runtime()?;
  rt.block_on(builder.build(&request)).context("Build failed")
}

fn override_platform(platform: Platform, os: Option<&str>, arch: Option<&str>) -> Result<Platform> {
  let os = match os {
    Some(os) => os.parse::<TargetOs>().context("Invalid --os")?,
    None => platform.os,
  };
  let arch = match arch {
    Some(arch) => arch.parse::<Arch>().context("Invalid --arch")?,
    None => platform.arch,
  };
  Ok(Platform::new(arch, os))
}

pub(crate) fn print_build_result(result: &BuildResult) {
  print_success(&format!("Built {}", result.artifact_path.display()));
  print_stat("Size", &format_bytes(result.size));
  print_stat("SHA-256", &result.sha256.0);
  print_stat("Duration", &format_duration(result.duration));
  print_stat("Strategy", &result.strategy.to_string());
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn overrides_replace_only_given_parts() {
    let base = Platform::lambda_default();

    let platform = override_platform(base, None, Some("arm64")).unwrap();
    assert_eq!(platform, Platform::new(Arch::Aarch64, TargetOs::Linux));

    let platform = override_platform(base, Some("windows"), None).unwrap();
    assert_eq!(platform, Platform::new(Arch::X86_64, TargetOs::Windows));

    assert!(override_platform(base, Some("plan9"), None).is_err());
  }
}
