//! Local bundling strategies.
//!
//! A local strategy is tried before the container. It returns `Ok(true)` when
//! it produced the artifact, `Ok(false)` to defer to the container, and an
//! error when it attempted the build and failed. Strategies should honor
//! [`BuildRequest::timeout`]; the builder also stops waiting once it expires.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::bundle::toolchain;
use crate::bundle::types::{BuildError, BuildRequest};

/// How often a bounded wait checks on the child.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Signature of a local bundling strategy.
///
/// Receives the request and the (existing) output directory.
pub type LocalBundleFn = fn(&BuildRequest, &Path) -> Result<bool, BuildError>;

/// Compile with the host's `go` if one is installed.
pub fn host_go(request: &BuildRequest, output_dir: &Path) -> Result<bool, BuildError> {
  if !tool_works(toolchain::TOOLCHAIN_NAME) {
    debug!("no host go toolchain, deferring to container");
    return Ok(false);
  }

  let output = output_dir.join(request.artifact_name());
  info!(source = %request.source_dir.display(), platform = %request.platform, "bundling with host go toolchain");

  let mut child = Command::new(toolchain::TOOLCHAIN_NAME)
    .args(toolchain::build_args(&output.to_string_lossy()))
    .envs(toolchain::cross_env(&request.platform))
    .current_dir(&request.source_dir)
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::piped())
    .spawn()?;

  // Drain stderr on its own thread so a chatty compiler cannot fill the pipe.
  let stderr = child.stderr.take().map(|mut pipe| {
    std::thread::spawn(move || {
      let mut buf = String::new();
      let _ = pipe.read_to_string(&mut buf);
      buf
    })
  });

  let status = match request.timeout {
    Some(limit) => wait_bounded(&mut child, limit)?.ok_or(BuildError::Timeout(limit))?,
    None => child.wait()?,
  };
  let stderr = stderr.and_then(|reader| reader.join().ok()).unwrap_or_default();

  if !status.success() {
    return Err(BuildError::CompileFailed {
      code: status.code(),
      stderr: stderr.trim().to_string(),
    });
  }

  Ok(true)
}

/// Wait for `child` up to `limit`. Returns `None` after killing it on expiry.
fn wait_bounded(child: &mut Child, limit: Duration) -> io::Result<Option<ExitStatus>> {
  let deadline = Instant::now() + limit;
  loop {
    if let Some(status) = child.try_wait()? {
      return Ok(Some(status));
    }
    if Instant::now() >= deadline {
      if let Err(e) = child.kill() {
        warn!(error = %e, "failed to kill local build");
      }
      child.wait()?;
      return Ok(None);
    }
    std::thread::sleep(POLL_INTERVAL);
  }
}

fn tool_works(program: &str) -> bool {
  Command::new(program)
    .arg("version")
    .stdin(Stdio::null())
    .output()
    .map(|output| output.status.success())
    .unwrap_or(false)
}
