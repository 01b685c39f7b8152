//! Job reconciler.
//!
//! Jobs have no lifecycle state of their own, so updates are issued
//! without waiting. Job ids are decimal integers on the wire and stored as
//! strings in the resource handle.

use std::sync::Arc;

use async_trait::async_trait;
use bricks_api::JobApi;
use tracing::{debug, info};

use super::{NotFoundPolicy, Reconciler, Resource, ResourceKind, read_failed};
use crate::error::{ProviderError, Result, ValidationError};
use crate::transcoder::{expand_job, flatten_job};

pub struct JobReconciler<J: ?Sized> {
    api: Arc<J>,
    not_found: NotFoundPolicy,
}

impl<J: JobApi + ?Sized> JobReconciler<J> {
    pub fn new(api: Arc<J>, not_found: NotFoundPolicy) -> Self {
        Self { api, not_found }
    }
}

/// Parse the stored handle, if any.
fn job_id(resource: &Resource) -> Result<Option<i64>> {
    resource
        .id
        .as_deref()
        .map(|id| {
            id.trim()
                .parse::<i64>()
                .map_err(|_| ProviderError::from(ValidationError::InvalidHandle(id.to_string())))
        })
        .transpose()
}

#[async_trait]
impl<J: JobApi + ?Sized> Reconciler for JobReconciler<J> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Job
    }

    async fn create(&self, resource: &mut Resource) -> Result<()> {
        let settings = expand_job(&resource.config)?;
        info!(name = settings.name.as_deref().unwrap_or_default(), "creating job");

        let job_id = self.api.create_job(&settings).await?;
        info!(job_id, "job created");
        resource.mark_present(job_id.to_string());

        self.read(resource).await
    }

    async fn read(&self, resource: &mut Resource) -> Result<()> {
        let Some(job_id) = job_id(resource)? else {
            debug!("job has no id, nothing to read");
            return Ok(());
        };

        match self.api.get_job(job_id).await {
            Ok(job) => {
                debug!(job_id, "read job");
                resource.config = flatten_job(&job.settings.unwrap_or_default());
                resource.mark_present(job_id.to_string());
                Ok(())
            }
            Err(e) => read_failed(self.not_found, self.kind(), resource, e),
        }
    }

    async fn update(&self, resource: &mut Resource) -> Result<()> {
        let job_id = job_id(resource)?.ok_or(ProviderError::MissingHandle {
            kind: ResourceKind::Job.as_str(),
        })?;
        let settings = expand_job(&resource.config)?;

        info!(job_id, "resetting job settings");
        self.api.reset_job(job_id, &settings).await?;

        self.read(resource).await
    }

    async fn delete(&self, resource: &mut Resource) -> Result<()> {
        let Some(job_id) = job_id(resource)? else {
            debug!("job has no id, nothing to delete");
            return Ok(());
        };

        info!(job_id, "deleting job");
        self.api.delete_job(job_id).await?;
        resource.mark_absent();
        Ok(())
    }
}
