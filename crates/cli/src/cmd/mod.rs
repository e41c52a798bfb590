mod build;
mod env;
mod info;
mod synth;

pub use build::{BuildArgs, cmd_build};
pub use env::cmd_env;
pub use info::cmd_info;
pub use synth::cmd_synth;

use std::path::Path;

use anyhow::{Context, Result};

use crossbundle_lib::config::ProjectConfig;

pub(crate) fn load_config(path: &Path) -> Result<ProjectConfig> {
  ProjectConfig::load(path).with_context(|| format!("Failed to load project file: {}", path.display()))
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}
