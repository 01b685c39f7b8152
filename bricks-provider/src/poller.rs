//! Remote state poller.
//!
//! Waits for a cluster to reach one of a set of lifecycle states by fetching
//! it at a fixed interval. Fetch failures count as "not there yet" and are
//! retried. The wait ends on success, on the optional deadline, or when the
//! cancellation token fires; a fetch in flight is abandoned in the latter two
//! cases.

use std::sync::Arc;
use std::time::Duration;

use bricks_api::{ClusterApi, ClusterInfo, ClusterState};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// States in which a cluster accepts mutations.
pub const STABLE_STATES: &[ClusterState] = &[ClusterState::Running, ClusterState::Terminated];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// Upper bound on a single wait. `None` waits indefinitely.
    pub max_wait: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }
}

pub struct StatePoller<C: ?Sized> {
    api: Arc<C>,
    config: PollConfig,
    cancel: CancellationToken,
}

impl<C: ClusterApi + ?Sized> StatePoller<C> {
    pub fn new(api: Arc<C>, config: PollConfig, cancel: CancellationToken) -> Self {
        Self {
            api,
            config,
            cancel,
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll `cluster_id` until its state is one of `targets`.
    pub async fn await_state(
        &self,
        cluster_id: &str,
        targets: &[ClusterState],
    ) -> Result<ClusterInfo> {
        let started = Instant::now();
        let deadline = self.config.max_wait.map(|w| started + w);
        let desired = describe(targets);

        loop {
            if self.cancel.is_cancelled() {
                return Err(ProviderError::Cancelled {
                    handle: cluster_id.to_string(),
                });
            }

            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(ProviderError::Cancelled {
                        handle: cluster_id.to_string(),
                    });
                }
                fetched = self.fetch(cluster_id, deadline) => fetched,
            };
            let Some(fetched) = fetched else {
                return Err(ProviderError::Timeout {
                    handle: cluster_id.to_string(),
                    waited: started.elapsed(),
                });
            };

            match fetched {
                Ok(info) if targets.contains(&info.state) => {
                    info!(
                        cluster_id,
                        state = %info.state,
                        elapsed = ?started.elapsed(),
                        "cluster reached desired state"
                    );
                    return Ok(info);
                }
                Ok(info) => {
                    debug!(
                        cluster_id,
                        observed = %info.state,
                        desired = %desired,
                        "waiting for cluster state"
                    );
                }
                Err(e) => {
                    warn!(cluster_id, error = %e, "failed to fetch cluster state, retrying");
                }
            }

            let mut wait = self.config.interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(ProviderError::Timeout {
                        handle: cluster_id.to_string(),
                        waited: now - started,
                    });
                }
                wait = wait.min(deadline - now);
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(ProviderError::Cancelled {
                        handle: cluster_id.to_string(),
                    });
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// One `get_cluster` call, cut off at `deadline`. `None` means the
    /// deadline passed before the remote answered.
    async fn fetch(
        &self,
        cluster_id: &str,
        deadline: Option<Instant>,
    ) -> Option<bricks_api::Result<ClusterInfo>> {
        let fetch = self.api.get_cluster(cluster_id);
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fetch).await.ok(),
            None => Some(fetch.await),
        }
    }
}

fn describe(states: &[ClusterState]) -> String {
    states
        .iter()
        .map(ClusterState::as_str)
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_polls_every_five_seconds_unbounded() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.max_wait, None);
    }

    #[test]
    fn test_describe_targets() {
        assert_eq!(describe(STABLE_STATES), "RUNNING|TERMINATED");
    }
}
