//! bricks-api: client library for the Databricks 2.0 REST API.
//!
//! Exposes the wire-format request/response types for clusters and jobs, the
//! [`ClusterApi`] / [`JobApi`] traits the reconciler is written against, and
//! [`HttpClient`], the reqwest-backed implementation of both.
//!
//! # Example
//! ```ignore
//! use bricks_api::{ClusterApi, HttpClient, ProviderConfig};
//!
//! let client = HttpClient::new(&ProviderConfig::new("https://example.cloud.databricks.com", token))?;
//! let info = client.get_cluster("0123-456789-abc123").await?;
//! println!("{:?}", info.state);
//! ```

mod client;
mod config;
mod error;
pub mod types;

pub use client::{ClusterApi, HttpClient, JobApi};
pub use config::{DEFAULT_REQUEST_TIMEOUT, ProviderConfig};
pub use error::{ApiError, Result};
pub use types::*;
