//! Cluster reconciler.

use std::sync::Arc;

use async_trait::async_trait;
use bricks_api::ClusterApi;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{NotFoundPolicy, Reconciler, Resource, ResourceKind, read_failed};
use crate::error::{ProviderError, Result};
use crate::poller::{PollConfig, STABLE_STATES, StatePoller};
use crate::transcoder::{expand_cluster, flatten_cluster};

pub struct ClusterReconciler<C: ?Sized> {
    api: Arc<C>,
    poller: StatePoller<C>,
    not_found: NotFoundPolicy,
}

impl<C: ClusterApi + ?Sized> ClusterReconciler<C> {
    pub fn new(
        api: Arc<C>,
        poll: PollConfig,
        cancel: CancellationToken,
        not_found: NotFoundPolicy,
    ) -> Self {
        Self {
            poller: StatePoller::new(api.clone(), poll, cancel),
            api,
            not_found,
        }
    }
}

fn handle(resource: &Resource) -> Result<String> {
    resource.id.clone().ok_or(ProviderError::MissingHandle {
        kind: ResourceKind::Cluster.as_str(),
    })
}

#[async_trait]
impl<C: ClusterApi + ?Sized> Reconciler for ClusterReconciler<C> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Cluster
    }

    async fn create(&self, resource: &mut Resource) -> Result<()> {
        let spec = expand_cluster(&resource.config)?;
        info!(
            name = spec.cluster_name.as_deref().unwrap_or_default(),
            "creating cluster"
        );

        let cluster_id = self.api.create_cluster(&spec).await?;
        info!(cluster_id = %cluster_id, "cluster created");
        resource.mark_present(cluster_id);

        self.read(resource).await
    }

    async fn read(&self, resource: &mut Resource) -> Result<()> {
        let Some(cluster_id) = resource.id.clone() else {
            debug!("cluster has no id, nothing to read");
            return Ok(());
        };

        match self.api.get_cluster(&cluster_id).await {
            Ok(info) => {
                debug!(cluster_id = %cluster_id, state = %info.state, "read cluster");
                resource.config = flatten_cluster(&info.spec);
                resource.mark_present(cluster_id);
                Ok(())
            }
            Err(e) => read_failed(self.not_found, self.kind(), resource, e),
        }
    }

    async fn update(&self, resource: &mut Resource) -> Result<()> {
        let cluster_id = handle(resource)?;
        // Validate before touching the remote.
        let spec = expand_cluster(&resource.config)?;

        // Edits are rejected while the cluster is still transitioning.
        self.poller.await_state(&cluster_id, STABLE_STATES).await?;

        info!(cluster_id = %cluster_id, "editing cluster");
        self.api.edit_cluster(&cluster_id, &spec).await?;

        self.read(resource).await
    }

    async fn delete(&self, resource: &mut Resource) -> Result<()> {
        let Some(cluster_id) = resource.id.clone() else {
            debug!("cluster has no id, nothing to delete");
            return Ok(());
        };

        info!(cluster_id = %cluster_id, "permanently deleting cluster");
        self.api.permanent_delete_cluster(&cluster_id).await?;
        resource.mark_absent();
        Ok(())
    }
}
