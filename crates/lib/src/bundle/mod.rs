//! Artifact bundling.
//!
//! Turns a directory of Go source into the single static executable a
//! function runtime deploys. The build runs in the runtime's toolchain image
//! with the source mounted read-only and the output directory read-write;
//! an optional local strategy may produce the artifact first.
//!
//! # Submodules
//!
//! - [`container`] - container runtime, mounts and `run` invocation
//! - [`execute`] - the [`ArtifactBuilder`] pipeline
//! - [`local`] - local bundling strategies
//! - [`toolchain`] - Go cross-compilation environment and command

pub mod container;
pub mod execute;
pub mod local;
pub mod toolchain;
mod types;

pub use container::{ContainerInvocation, ContainerRuntime, Mount};
pub use execute::ArtifactBuilder;
pub use local::LocalBundleFn;
pub use types::*;
