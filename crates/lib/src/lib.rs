//! crossbundle-lib: cross-compiled function artifacts and their wiring
//!
//! This crate provides the pieces used by the `crossbundle` CLI:
//! - `bundle`: builds a single static executable inside a container toolchain
//! - `wiring`: the environment contract between provisioned resources and the artifact
//! - `stack`: declarations of the bucket, cache cluster and function, synthesized to a manifest
//! - `config`: the `crossbundle.toml` project file

pub mod bundle;
pub mod config;
pub mod consts;
pub mod platform;
pub mod stack;
pub mod util;
pub mod wiring;
