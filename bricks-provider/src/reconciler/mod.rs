//! Reconcilers for the supported resource kinds.
//!
//! Each reconciler drives one resource instance through
//! create/read/update/delete against the remote API, converting between the
//! declared configuration tree and the wire settings on the way.
//!
//! A reconciler holds no per-resource state; everything lives in the
//! [`Resource`] passed in. Calls for the same resource must be serialized
//! by the caller.

pub mod cluster;
pub mod job;

use std::fmt;

use async_trait::async_trait;
use bricks_api::ApiError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::tree::ConfigTree;

pub use cluster::ClusterReconciler;
pub use job::JobReconciler;

/// Which kind of remote resource a state file or reconciler refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Cluster,
    Job,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cluster => "cluster",
            ResourceKind::Job => "job",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resource stands as far as we know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No remote counterpart; no handle held.
    #[default]
    Absent,
    Present,
    /// The last read failed for a reason other than not-found.
    Unknown,
}

/// One resource instance: its remote handle (once created) and the locally
/// held configuration tree. After a successful read the tree is replaced by
/// the flattened remote settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    pub id: Option<String>,
    pub config: ConfigTree,
    pub phase: Phase,
}

impl Resource {
    /// A resource that has not been created yet.
    pub fn new(config: ConfigTree) -> Self {
        Self {
            id: None,
            config,
            phase: Phase::Absent,
        }
    }

    /// A resource known by an existing remote handle.
    pub fn existing(id: impl Into<String>, config: ConfigTree) -> Self {
        Self {
            id: Some(id.into()),
            config,
            phase: Phase::Present,
        }
    }

    pub(crate) fn mark_present(&mut self, id: String) {
        self.id = Some(id);
        self.phase = Phase::Present;
    }

    pub(crate) fn mark_absent(&mut self) {
        self.id = None;
        self.phase = Phase::Absent;
    }
}

/// How a failed read is classified as "the resource no longer exists".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotFoundPolicy {
    /// Any HTTP status of 400 or above.
    #[default]
    AnyError,
    /// Only HTTP 404 or the `RESOURCE_DOES_NOT_EXIST` error code.
    Explicit,
}

impl NotFoundPolicy {
    pub fn is_not_found(&self, err: &ApiError) -> bool {
        let Some(status) = err.status() else {
            return false;
        };
        if status < 400 {
            return false;
        }
        match self {
            NotFoundPolicy::AnyError => true,
            NotFoundPolicy::Explicit => {
                status == 404 || err.error_code() == Some("RESOURCE_DOES_NOT_EXIST")
            }
        }
    }
}

/// Lifecycle operations for one resource kind.
#[async_trait]
pub trait Reconciler: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Absent -> Present. Validates the tree, creates the remote resource,
    /// stores its handle and reads it back.
    async fn create(&self, resource: &mut Resource) -> Result<()>;

    /// Refresh the tree from the remote. A not-found answer clears the
    /// handle without error; a resource without a handle is left alone.
    async fn read(&self, resource: &mut Resource) -> Result<()>;

    /// Push the tree to an existing resource, then read it back.
    async fn update(&self, resource: &mut Resource) -> Result<()>;

    /// Permanently remove the remote resource and clear the handle. A
    /// resource without a handle is already gone.
    async fn delete(&self, resource: &mut Resource) -> Result<()>;

    /// Converge: refresh first, then create if the resource is missing or
    /// update it in place.
    async fn apply(&self, resource: &mut Resource) -> Result<()> {
        if resource.id.is_none() {
            return self.create(resource).await;
        }

        let declared = resource.config.clone();
        self.read(resource).await?;
        resource.config = declared;

        match resource.phase {
            Phase::Absent => self.create(resource).await,
            _ => self.update(resource).await,
        }
    }
}

/// Shared handling of a failed read.
pub(crate) fn read_failed(
    policy: NotFoundPolicy,
    kind: ResourceKind,
    resource: &mut Resource,
    err: ApiError,
) -> Result<()> {
    if policy.is_not_found(&err) {
        warn!(
            kind = %kind,
            id = resource.id.as_deref().unwrap_or_default(),
            error = %err,
            "resource not found remotely, clearing id"
        );
        resource.mark_absent();
        return Ok(());
    }
    resource.phase = Phase::Unknown;
    Err(err.into())
}
