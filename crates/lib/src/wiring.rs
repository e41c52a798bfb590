//! Resource wiring.
//!
//! The function learns where its provisioned resources live through three
//! environment variables. [`ResourceWiring`] produces them on the deployment
//! side; [`RuntimeEnv`] reads them back inside the running artifact.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const BUCKET_VAR: &str = "BUCKET";
pub const CACHE_URI_VAR: &str = "MEMORY_DB_URI";
pub const CACHE_PORT_VAR: &str = "MEMORY_DB_PORT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WiringError {
  #[error("environment variable {0} is not set")]
  MissingVar(&'static str),

  #[error("environment variable {var} is not a valid port: '{value}'")]
  InvalidPort { var: &'static str, value: String },
}

/// Network endpoint of the cache cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEndpoint {
  pub address: String,
  pub port: u16,
}

impl CacheEndpoint {
  pub fn new(address: impl Into<String>, port: u16) -> Self {
    Self {
      address: address.into(),
      port,
    }
  }
}

/// Identifiers of provisioned resources consumed by the function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceWiring {
  pub bucket_name: String,
  pub cache: CacheEndpoint,
}

impl ResourceWiring {
  pub fn new(bucket_name: impl Into<String>, cache: CacheEndpoint) -> Self {
    Self {
      bucket_name: bucket_name.into(),
      cache,
    }
  }

  /// The environment injected into the function at deployment time.
  ///
  /// The port is rendered as a decimal string.
  pub fn to_env(&self) -> BTreeMap<String, String> {
    BTreeMap::from([
      (BUCKET_VAR.to_string(), self.bucket_name.clone()),
      (CACHE_URI_VAR.to_string(), self.cache.address.clone()),
      (CACHE_PORT_VAR.to_string(), self.cache.port.to_string()),
    ])
  }
}

/// The wiring as seen from inside the running artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEnv {
  pub bucket: String,
  pub cache: CacheEndpoint,
}

impl RuntimeEnv {
  /// Read the wiring from the process environment.
  pub fn from_env() -> Result<Self, WiringError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Read the wiring through an arbitrary lookup function.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, WiringError> {
    let require = |var: &'static str| lookup(var).ok_or(WiringError::MissingVar(var));

    let bucket = require(BUCKET_VAR)?;
    let address = require(CACHE_URI_VAR)?;
    let port_raw = require(CACHE_PORT_VAR)?;
    let port = port_raw.trim().parse::<u16>().map_err(|_| WiringError::InvalidPort {
      var: CACHE_PORT_VAR,
      value: port_raw.clone(),
    })?;

    Ok(Self {
      bucket,
      cache: CacheEndpoint::new(address, port),
    })
  }

  /// `host:port` address for a cache client.
  pub fn cache_addr(&self) -> String {
    format!("{}:{}", self.cache.address, self.cache.port)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  fn wiring_env_is_exact() {
    let wiring = ResourceWiring::new("B", CacheEndpoint::new("H", 6379));

    let expected = BTreeMap::from([
      ("BUCKET".to_string(), "B".to_string()),
      ("MEMORY_DB_URI".to_string(), "H".to_string()),
      ("MEMORY_DB_PORT".to_string(), "6379".to_string()),
    ]);
    assert_eq!(wiring.to_env(), expected);
  }

  #[test]
  fn runtime_env_reads_back_the_wiring() {
    let wiring = ResourceWiring::new("sf-auth", CacheEndpoint::new("clustercfg.memorydb.local", 6380));
    let env = wiring.to_env();

    let runtime = RuntimeEnv::from_lookup(|key| env.get(key).cloned()).unwrap();

    assert_eq!(runtime.bucket, "sf-auth");
    assert_eq!(runtime.cache, wiring.cache);
    assert_eq!(runtime.cache_addr(), "clustercfg.memorydb.local:6380");
  }

  #[test]
  fn runtime_env_reports_first_missing_var() {
    let result = RuntimeEnv::from_lookup(|key| (key == BUCKET_VAR).then(|| "B".to_string()));
    assert_eq!(result, Err(WiringError::MissingVar("MEMORY_DB_URI")));
  }

  #[test]
  fn runtime_env_rejects_bad_port() {
    let result = RuntimeEnv::from_lookup(|key| match key {
      CACHE_PORT_VAR => Some("sixty".to_string()),
      _ => Some("x".to_string()),
    });
    assert_eq!(
      result,
      Err(WiringError::InvalidPort {
        var: "MEMORY_DB_PORT",
        value: "sixty".to_string(),
      })
    );
  }

  #[test]
  #[serial]
  fn runtime_env_from_process_environment() {
    temp_env::with_vars(
      [
        (BUCKET_VAR, Some("bucket-1")),
        (CACHE_URI_VAR, Some("cache.internal")),
        (CACHE_PORT_VAR, Some("6379")),
      ],
      || {
        let runtime = RuntimeEnv::from_env().unwrap();
        assert_eq!(runtime.cache_addr(), "cache.internal:6379");
      },
    );
  }
}
