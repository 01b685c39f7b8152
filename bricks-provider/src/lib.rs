//! bricks-provider: converges declared Databricks clusters and jobs with the
//! live workspace.
//!
//! - [`tree`] - the configuration tree and the [`tree::ConfigSource`] view
//! - [`transcoder`] - tree <-> wire settings for clusters and jobs
//! - [`poller`] - waits for a cluster to settle before it is mutated
//! - [`reconciler`] - create/read/update/delete state machine per kind
//! - [`drift`] - field-level differences between declared and observed trees
//! - [`state`] - the on-disk record of a managed resource

pub mod drift;
pub mod error;
pub mod poller;
pub mod reconciler;
pub mod state;
pub mod transcoder;
pub mod tree;

pub use error::{ProviderError, Result, ValidationError};
pub use poller::{PollConfig, StatePoller};
pub use reconciler::{
    ClusterReconciler, JobReconciler, NotFoundPolicy, Phase, Reconciler, Resource, ResourceKind,
};
pub use tree::{ConfigSource, ConfigTree, Value};
