//! Local state file: the handle and last observed tree of one resource.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

use crate::reconciler::{Phase, Resource, ResourceKind};
use crate::tree::ConfigTree;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed state file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state file {path} describes a {found}, not a {expected}")]
    KindMismatch {
        path: PathBuf,
        expected: ResourceKind,
        found: ResourceKind,
    },
}

pub type Result<T> = std::result::Result<T, StateError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub kind: ResourceKind,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub observed: ConfigTree,
    pub refreshed_at: DateTime<Utc>,
}

impl StateFile {
    /// Snapshot a resource after reconciliation.
    pub fn capture(kind: ResourceKind, resource: &Resource) -> Self {
        Self {
            kind,
            id: resource.id.clone(),
            observed: resource.config.clone(),
            refreshed_at: Utc::now(),
        }
    }

    /// State to persist after an apply. A failed apply keeps the tree last
    /// observed under the same handle, since the resource now holds the
    /// declaration. Returns `None` when there is nothing to record.
    pub fn after_apply(
        kind: ResourceKind,
        resource: &Resource,
        previous: Option<&StateFile>,
        succeeded: bool,
    ) -> Option<Self> {
        if succeeded {
            return Some(Self::capture(kind, resource));
        }
        if resource.id.is_none() && previous.is_none_or(|p| p.id.is_none()) {
            return None;
        }
        let kept = previous.filter(|p| p.id == resource.id);
        Some(Self {
            kind,
            id: resource.id.clone(),
            observed: kept.map(|p| p.observed.clone()).unwrap_or_default(),
            refreshed_at: kept.map(|p| p.refreshed_at).unwrap_or_else(Utc::now),
        })
    }

    /// The resource as last seen. Its phase is `Present` when a handle is
    /// held, `Absent` otherwise.
    pub fn resource(&self) -> Resource {
        Resource {
            id: self.id.clone(),
            config: self.observed.clone(),
            phase: if self.id.is_some() {
                Phase::Present
            } else {
                Phase::Absent
            },
        }
    }
}

/// Load the state file at `path`. A missing file means nothing has been
/// created yet.
pub async fn load(path: &Path, kind: ResourceKind) -> Result<Option<StateFile>> {
    let text = match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StateError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let state: StateFile = serde_json::from_str(&text).map_err(|source| StateError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if state.kind != kind {
        return Err(StateError::KindMismatch {
            path: path.to_path_buf(),
            expected: kind,
            found: state.kind,
        });
    }
    Ok(Some(state))
}

/// Write the state file, replacing any previous one atomically.
pub async fn save(path: &Path, state: &StateFile) -> Result<()> {
    let io = |source| StateError::Io {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_string_pretty(state).map_err(|source| StateError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(io)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, json).await.map_err(io)?;
    fs::rename(&tmp, path).await.map_err(io)?;
    Ok(())
}
