mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crossbundle_lib::consts::CONFIG_FILE_NAME;

use crate::output::{OutputFormat, print_error};

/// crossbundle - cross-compile function artifacts in a container toolchain
#[derive(Parser)]
#[command(name = "crossbundle")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build the function artifact
  Build {
    /// Path to the project file
    #[arg(short, long, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Output directory (default: the cache directory for the function)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Target operating system, overriding the project file
    #[arg(long)]
    os: Option<String>,

    /// Target architecture, overriding the project file
    #[arg(long)]
    arch: Option<String>,

    /// Give up on the build after this long (e.g. "5m", "90s")
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Try the host go toolchain before the container
    #[arg(long)]
    local: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
  },

  /// Print the environment injected into the function
  Env {
    /// Path to the project file
    #[arg(short, long, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
  },

  /// Build the artifact and write the resource manifest next to it
  Synth {
    /// Path to the project file
    #[arg(short, long, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Output directory (default: the cache directory for the function)
    #[arg(short, long)]
    out: Option<PathBuf>,
  },

  /// Show host platform and container runtime availability
  Info {
    /// Path to the project file, used if present
    #[arg(short, long, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Build {
      config,
      out,
      os,
      arch,
      timeout,
      local,
      format,
    } => cmd::cmd_build(cmd::BuildArgs {
      config,
      out,
      os,
      arch,
      timeout,
      local,
      format,
    }),
    Commands::Env { config, format } => cmd::cmd_env(&config, format),
    Commands::Synth { config, out } => cmd::cmd_synth(&config, out.as_deref()),
    Commands::Info { config } => cmd::cmd_info(&config),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{:#}", err));
      ExitCode::FAILURE
    }
  }
}
