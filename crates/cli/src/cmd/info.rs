use std::path::Path;

use anyhow::Result;

use crossbundle_lib::bundle::ContainerRuntime;
use crossbundle_lib::platform::platform_triple;

use crate::cmd::{load_config, runtime};
use crate::output::print_stat;

/// Print the host platform and probe the container runtime a build would use.
///
/// The project file is optional here; without one the environment override
/// or docker is probed.
pub fn cmd_info(config: &Path) -> Result<()> {
  println!("System:");
  match platform_triple() {
    Some(triple) => print_stat("Platform", &triple),
    _ => print_stat("Platform", "could not detect platform"),
  }

  let container = if config.exists() {
    load_config(config)?.container_runtime()
  } else {
    ContainerRuntime::from_env().unwrap_or_default()
  };

  let rt = runtime()?;
  let status = match rt.block_on(container.check_available()) {
    Ok(()) => "available".to_string(),
    Err(err) => format!("unavailable ({})", err),
  };
  print_stat("Container runtime", &format!("{} - {}", container, status));
  Ok(())
}
