//! Implementation of the `crossbundle env` command.

use std::path::Path;

use anyhow::Result;

use crate::cmd::load_config;
use crate::output::{OutputFormat, print_json};

/// Print the wiring variables as `KEY=value` lines or a JSON object.
pub fn cmd_env(config: &Path, format: OutputFormat) -> Result<()> {
  let config = load_config(config)?;
  let env = config.wiring().to_env();

  if format.is_json() {
    print_json(&env)?;
  } else {
    for (key, value) in &env {
      println!("{}={}", key, value);
    }
  }
  Ok(())
}
