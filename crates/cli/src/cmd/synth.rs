//! Implementation of the `crossbundle synth` command.
//!
//! Builds the artifact, declares the bucket, cache cluster and function, and
//! writes the synthesized manifest as `manifest.json` in the output directory.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crossbundle_lib::util::hash::Hashable;

use crate::cmd::build::{BuildArgs, build_artifact, print_build_result};
use crate::cmd::load_config;
use crate::output::{OutputFormat, print_stat, print_success};

pub fn cmd_synth(config_path: &Path, out: Option<&Path>) -> Result<()> {
  let config = load_config(config_path)?;
  let args = BuildArgs {
    config: config_path.to_path_buf(),
    out: out.map(Path::to_path_buf),
    os: None,
    arch: None,
    timeout: None,
    local: false,
    format: OutputFormat::Text,
  };

  let artifact = build_artifact(&config, &args)?;
  print_build_result(&artifact);

  let stack = config.declare(&artifact).context("Failed to declare resources")?;
  let manifest = stack.synthesize();
  let hash = manifest.compute_hash().context("Failed to compute manifest hash")?;

  let output_dir = artifact
    .artifact_path
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_else(|| config.default_output_dir());
  let manifest_path = output_dir.join("manifest.json");
  let manifest_json = serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?;
  fs::write(&manifest_path, &manifest_json)
    .with_context(|| format!("Failed to write manifest: {}", manifest_path.display()))?;
  info!(path = %manifest_path.display(), hash = %hash, "manifest written");

  println!();
  print_success(&format!("Synthesized stack {}", manifest.stack));
  print_stat("Resources", &manifest.resources.len().to_string());
  print_stat("Manifest", &hash.to_string());
  print_stat("Path", &manifest_path.display().to_string());
  Ok(())
}
