//! Resource declarations.
//!
//! A [`Stack`] is the composition root: resources are registered on it by
//! id and it synthesizes a deterministic [`StackManifest`] describing them.
//! Nothing here provisions anything; the manifest is handed to whatever
//! deploys it.
//!
//! # Example
//!
//! ```ignore
//! let mut stack = Stack::new("sf-auth");
//! let bucket = stack.add_bucket("migration-bucket", "sf-auth-migration")?;
//! let cache = stack.add_cache_cluster("memory-db", CacheEndpoint::new("clustercfg.local", 6379))?;
//! let function = MigrationFunction::new(&mut stack, "lambda-sf-auth-migration", &artifact, runtime, MigrationFunctionProps { bucket, cache })?;
//! let manifest = stack.synthesize();
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bundle::{BuildResult, FunctionRuntime};
use crate::util::hash::{ContentHash, Hashable};
use crate::wiring::{CacheEndpoint, ResourceWiring};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StackError {
  #[error("a resource with id '{0}' is already registered")]
  DuplicateId(String),

  #[error("no resource with id '{0}' is registered")]
  UnknownResource(String),

  #[error("resource '{id}' is not a {expected}")]
  WrongKind { id: String, expected: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
  Read,
}

/// Permission for a function to access another resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
  pub resource: String,
  pub access: Access,
}

/// The deployment package of a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeAsset {
  pub path: PathBuf,
  pub sha256: ContentHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDecl {
  pub runtime: FunctionRuntime,
  pub handler: String,
  pub code: CodeAsset,
  pub environment: BTreeMap<String, String>,
  pub grants: Vec<Grant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resource {
  Bucket { bucket_name: String },
  CacheCluster { endpoint: CacheEndpoint },
  Function(FunctionDecl),
}

impl Resource {
  fn kind(&self) -> &'static str {
    match self {
      Resource::Bucket { .. } => "bucket",
      Resource::CacheCluster { .. } => "cache cluster",
      Resource::Function(_) => "function",
    }
  }
}

/// Handle to a registered bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketRef {
  pub id: String,
  pub bucket_name: String,
}

/// Handle to a registered cache cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheClusterRef {
  pub id: String,
  pub endpoint: CacheEndpoint,
}

/// The synthesized description of a stack.
///
/// Resources are kept in a [`BTreeMap`] so serialization, and therefore the
/// manifest hash, is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackManifest {
  pub stack: String,
  pub resources: BTreeMap<String, Resource>,
}

impl Hashable for StackManifest {}

#[derive(Debug, Clone, Default)]
pub struct Stack {
  id: String,
  resources: BTreeMap<String, Resource>,
}

impl Stack {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      resources: BTreeMap::new(),
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn get(&self, id: &str) -> Option<&Resource> {
    self.resources.get(id)
  }

  /// Register a child resource under `id`.
  pub fn register(&mut self, id: &str, resource: Resource) -> Result<(), StackError> {
    if self.resources.contains_key(id) {
      return Err(StackError::DuplicateId(id.to_string()));
    }
    self.resources.insert(id.to_string(), resource);
    Ok(())
  }

  pub fn add_bucket(&mut self, id: &str, bucket_name: impl Into<String>) -> Result<BucketRef, StackError> {
    let bucket_name = bucket_name.into();
    self.register(
      id,
      Resource::Bucket {
        bucket_name: bucket_name.clone(),
      },
    )?;
    Ok(BucketRef {
      id: id.to_string(),
      bucket_name,
    })
  }

  pub fn add_cache_cluster(&mut self, id: &str, endpoint: CacheEndpoint) -> Result<CacheClusterRef, StackError> {
    self.register(
      id,
      Resource::CacheCluster {
        endpoint: endpoint.clone(),
      },
    )?;
    Ok(CacheClusterRef {
      id: id.to_string(),
      endpoint,
    })
  }

  pub fn add_function(&mut self, id: &str, function: FunctionDecl) -> Result<(), StackError> {
    self.register(id, Resource::Function(function))
  }

  /// Grant `function_id` read access to the resource `resource_id`.
  ///
  /// Granting the same access twice is a no-op.
  pub fn grant_read(&mut self, function_id: &str, resource_id: &str) -> Result<(), StackError> {
    if !self.resources.contains_key(resource_id) {
      return Err(StackError::UnknownResource(resource_id.to_string()));
    }

    let function = match self.resources.get_mut(function_id) {
      Some(Resource::Function(function)) => function,
      Some(_) => {
        return Err(StackError::WrongKind {
          id: function_id.to_string(),
          expected: "function",
        });
      }
      None => return Err(StackError::UnknownResource(function_id.to_string())),
    };

    let grant = Grant {
      resource: resource_id.to_string(),
      access: Access::Read,
    };
    if !function.grants.contains(&grant) {
      function.grants.push(grant);
    }
    Ok(())
  }

  fn expect_kind(&self, id: &str, expected: &'static str) -> Result<(), StackError> {
    match self.resources.get(id) {
      Some(resource) if resource.kind() == expected => Ok(()),
      Some(_) => Err(StackError::WrongKind {
        id: id.to_string(),
        expected,
      }),
      None => Err(StackError::UnknownResource(id.to_string())),
    }
  }

  pub fn synthesize(&self) -> StackManifest {
    StackManifest {
      stack: self.id.clone(),
      resources: self.resources.clone(),
    }
  }
}

/// Resources a [`MigrationFunction`] depends on.
#[derive(Debug, Clone)]
pub struct MigrationFunctionProps {
  pub bucket: BucketRef,
  pub cache: CacheClusterRef,
}

/// The migration function: reads from a bucket and talks to a cache cluster.
///
/// The function's environment carries the [`ResourceWiring`] and it is
/// granted read access to the bucket.
#[derive(Debug, Clone)]
pub struct MigrationFunction {
  pub id: String,
  pub bucket: BucketRef,
  pub cache: CacheClusterRef,
  pub wiring: ResourceWiring,
}

impl MigrationFunction {
  pub const DEFAULT_ID: &'static str = "lambda-sf-auth-migration";

  pub fn new(
    stack: &mut Stack,
    id: &str,
    artifact: &BuildResult,
    runtime: FunctionRuntime,
    props: MigrationFunctionProps,
  ) -> Result<Self, StackError> {
    stack.expect_kind(&props.bucket.id, "bucket")?;
    stack.expect_kind(&props.cache.id, "cache cluster")?;

    let wiring = ResourceWiring::new(props.bucket.bucket_name.clone(), props.cache.endpoint.clone());

    stack.add_function(
      id,
      FunctionDecl {
        runtime,
        handler: runtime.handler().to_string(),
        code: CodeAsset {
          path: artifact.artifact_path.clone(),
          sha256: artifact.sha256.clone(),
        },
        environment: wiring.to_env(),
        grants: Vec::new(),
      },
    )?;
    stack.grant_read(id, &props.bucket.id)?;

    Ok(Self {
      id: id.to_string(),
      bucket: props.bucket,
      cache: props.cache,
      wiring,
    })
  }
}
