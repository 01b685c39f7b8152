//! Remote API client traits and the HTTP implementation.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{ApiError, Result};
use crate::types::{
    ClusterIdRequest, ClusterInfo, ClusterSpec, CreateClusterResponse, CreateJobResponse,
    EditClusterRequest, Job, JobIdRequest, JobSettings, ResetJobRequest,
};

/// Cluster lifecycle calls.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Create a cluster and return its id.
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<String>;

    /// Replace the configuration of an existing cluster.
    async fn edit_cluster(&self, cluster_id: &str, spec: &ClusterSpec) -> Result<()>;

    /// Fetch the current spec and state of a cluster.
    async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterInfo>;

    /// Terminate and permanently remove a cluster.
    async fn permanent_delete_cluster(&self, cluster_id: &str) -> Result<()>;
}

/// Job lifecycle calls.
#[async_trait]
pub trait JobApi: Send + Sync {
    async fn create_job(&self, settings: &JobSettings) -> Result<i64>;

    /// Overwrite all settings of a job.
    async fn reset_job(&self, job_id: i64, settings: &JobSettings) -> Result<()>;

    async fn get_job(&self, job_id: i64) -> Result<Job>;

    async fn delete_job(&self, job_id: i64) -> Result<()>;
}

/// Error body returned by the API on non-2xx responses.
#[derive(serde::Deserialize)]
struct ErrorBody {
    error_code: Option<String>,
    message: Option<String>,
}

/// reqwest-backed client for one workspace.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_path: String,
    token: String,
}

impl HttpClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("bricks/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            http,
            base_path: config.base_path()?,
            token: config.token.clone(),
        })
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_path, path)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<String> {
        let url = self.url(path);
        debug!(url = %url, "POST");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        read_body(resp).await
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        read_body(resp).await
    }
}

async fn read_body(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        let (error_code, message) = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => (parsed.error_code, parsed.message.unwrap_or_else(|| body.clone())),
            Err(_) => (None, body),
        };
        return Err(ApiError::Remote {
            status: status.as_u16(),
            error_code,
            message,
        });
    }

    Ok(body)
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl ClusterApi for HttpClient {
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<String> {
        let body = self.post("clusters/create", spec).await?;
        let resp: CreateClusterResponse = decode(&body)?;
        Ok(resp.cluster_id)
    }

    async fn edit_cluster(&self, cluster_id: &str, spec: &ClusterSpec) -> Result<()> {
        let request = EditClusterRequest {
            cluster_id: cluster_id.to_string(),
            spec: spec.clone(),
        };
        self.post("clusters/edit", &request).await?;
        Ok(())
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterInfo> {
        let body = self
            .get("clusters/get", &[("cluster_id", cluster_id.to_string())])
            .await?;
        decode(&body)
    }

    async fn permanent_delete_cluster(&self, cluster_id: &str) -> Result<()> {
        let request = ClusterIdRequest {
            cluster_id: cluster_id.to_string(),
        };
        self.post("clusters/permanent-delete", &request).await?;
        Ok(())
    }
}

#[async_trait]
impl JobApi for HttpClient {
    async fn create_job(&self, settings: &JobSettings) -> Result<i64> {
        let body = self.post("jobs/create", settings).await?;
        let resp: CreateJobResponse = decode(&body)?;
        Ok(resp.job_id)
    }

    async fn reset_job(&self, job_id: i64, settings: &JobSettings) -> Result<()> {
        let request = ResetJobRequest {
            job_id,
            new_settings: settings.clone(),
        };
        self.post("jobs/reset", &request).await?;
        Ok(())
    }

    async fn get_job(&self, job_id: i64) -> Result<Job> {
        let body = self
            .get("jobs/get", &[("job_id", job_id.to_string())])
            .await?;
        decode(&body)
    }

    async fn delete_job(&self, job_id: i64) -> Result<()> {
        self.post("jobs/delete", &JobIdRequest { job_id }).await?;
        Ok(())
    }
}
