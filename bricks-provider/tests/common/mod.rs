//! Shared test utilities: an in-memory API that records every call.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bricks_api::{
    ApiError, ClusterApi, ClusterInfo, ClusterSpec, ClusterState, Job, JobApi, JobSettings,
    Result,
};
use bricks_provider::ConfigTree;

pub const CLUSTER_ID: &str = "0923-164208-meows279";
pub const JOB_ID: i64 = 42;

/// Fake workspace holding at most one cluster and one job.
///
/// `get_*` answers come from the scripted queue first and fall back to the
/// stored resource (or a 404 once it is gone). Cluster creation fills in a
/// remote default so read-back behaviour is observable.
#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<Vec<String>>,
    cluster: Mutex<Option<ClusterInfo>>,
    cluster_gets: Mutex<VecDeque<Result<ClusterInfo>>>,
    job: Mutex<Option<Job>>,
    job_gets: Mutex<VecDeque<Result<Job>>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Start with an existing cluster in `state`.
    pub fn with_cluster(spec: ClusterSpec, state: ClusterState) -> Arc<Self> {
        let api = Self::default();
        *api.cluster.lock().unwrap() = Some(ClusterInfo {
            cluster_id: CLUSTER_ID.to_string(),
            spec,
            state,
            ..Default::default()
        });
        Arc::new(api)
    }

    pub fn with_job(settings: JobSettings) -> Arc<Self> {
        let api = Self::default();
        *api.job.lock().unwrap() = Some(Job {
            job_id: JOB_ID,
            settings: Some(settings),
            ..Default::default()
        });
        Arc::new(api)
    }

    /// Queue one answer for the next `get_cluster` call.
    pub fn script_cluster_get(&self, answer: Result<ClusterInfo>) {
        self.cluster_gets.lock().unwrap().push_back(answer);
    }

    /// Queue a successful `get_cluster` answer in `state`.
    pub fn script_cluster_state(&self, state: ClusterState) {
        let info = self.cluster.lock().unwrap().clone().unwrap_or_default();
        self.script_cluster_get(Ok(ClusterInfo { state, ..info }));
    }

    pub fn script_job_get(&self, answer: Result<Job>) {
        self.job_gets.lock().unwrap().push_back(answer);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stored_cluster(&self) -> Option<ClusterInfo> {
        self.cluster.lock().unwrap().clone()
    }

    pub fn stored_job(&self) -> Option<Job> {
        self.job.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn not_found(what: &str) -> ApiError {
    ApiError::Remote {
        status: 404,
        error_code: Some("RESOURCE_DOES_NOT_EXIST".to_string()),
        message: format!("{} does not exist", what),
    }
}

pub fn remote(status: u16) -> ApiError {
    ApiError::Remote {
        status,
        error_code: None,
        message: "scripted failure".to_string(),
    }
}

#[async_trait]
impl ClusterApi for FakeApi {
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<String> {
        self.record("create_cluster".to_string());
        let mut spec = spec.clone();
        spec.autotermination_minutes.get_or_insert(120);
        *self.cluster.lock().unwrap() = Some(ClusterInfo {
            cluster_id: CLUSTER_ID.to_string(),
            spec,
            state: ClusterState::Pending,
            ..Default::default()
        });
        Ok(CLUSTER_ID.to_string())
    }

    async fn edit_cluster(&self, cluster_id: &str, spec: &ClusterSpec) -> Result<()> {
        self.record(format!("edit_cluster {}", cluster_id));
        let mut stored = self.cluster.lock().unwrap();
        match stored.as_mut() {
            Some(info) if info.cluster_id == cluster_id => {
                info.spec = spec.clone();
                info.state = ClusterState::Restarting;
                Ok(())
            }
            _ => Err(not_found(cluster_id)),
        }
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterInfo> {
        self.record(format!("get_cluster {}", cluster_id));
        if let Some(answer) = self.cluster_gets.lock().unwrap().pop_front() {
            return answer;
        }
        match self.cluster.lock().unwrap().as_ref() {
            Some(info) if info.cluster_id == cluster_id => Ok(info.clone()),
            _ => Err(not_found(cluster_id)),
        }
    }

    async fn permanent_delete_cluster(&self, cluster_id: &str) -> Result<()> {
        self.record(format!("permanent_delete_cluster {}", cluster_id));
        let mut stored = self.cluster.lock().unwrap();
        if stored.as_ref().is_some_and(|info| info.cluster_id == cluster_id) {
            *stored = None;
            Ok(())
        } else {
            Err(not_found(cluster_id))
        }
    }
}

#[async_trait]
impl JobApi for FakeApi {
    async fn create_job(&self, settings: &JobSettings) -> Result<i64> {
        self.record("create_job".to_string());
        *self.job.lock().unwrap() = Some(Job {
            job_id: JOB_ID,
            settings: Some(settings.clone()),
            ..Default::default()
        });
        Ok(JOB_ID)
    }

    async fn reset_job(&self, job_id: i64, settings: &JobSettings) -> Result<()> {
        self.record(format!("reset_job {}", job_id));
        let mut stored = self.job.lock().unwrap();
        match stored.as_mut() {
            Some(job) if job.job_id == job_id => {
                job.settings = Some(settings.clone());
                Ok(())
            }
            _ => Err(not_found(&job_id.to_string())),
        }
    }

    async fn get_job(&self, job_id: i64) -> Result<Job> {
        self.record(format!("get_job {}", job_id));
        if let Some(answer) = self.job_gets.lock().unwrap().pop_front() {
            return answer;
        }
        match self.job.lock().unwrap().as_ref() {
            Some(job) if job.job_id == job_id => Ok(job.clone()),
            _ => Err(not_found(&job_id.to_string())),
        }
    }

    async fn delete_job(&self, job_id: i64) -> Result<()> {
        self.record(format!("delete_job {}", job_id));
        let mut stored = self.job.lock().unwrap();
        if stored.as_ref().is_some_and(|job| job.job_id == job_id) {
            *stored = None;
            Ok(())
        } else {
            Err(not_found(&job_id.to_string()))
        }
    }
}

/// Smallest valid fixed-size cluster declaration.
pub fn cluster_tree(num_workers: i64) -> ConfigTree {
    ConfigTree::new()
        .with("num_workers", num_workers)
        .with("spark_version", "4.2.x-scala2.11")
        .with("node_type_id", "Standard_D3_v2")
}

pub fn cluster_spec(num_workers: i32) -> ClusterSpec {
    ClusterSpec {
        num_workers: Some(num_workers),
        spark_version: "4.2.x-scala2.11".to_string(),
        node_type_id: "Standard_D3_v2".to_string(),
        ..Default::default()
    }
}

/// Notebook job running on an existing cluster.
pub fn job_tree(name: &str) -> ConfigTree {
    ConfigTree::new()
        .with("name", name)
        .with("existing_cluster_id", CLUSTER_ID)
        .with_block(
            "notebook_task",
            ConfigTree::new().with("notebook_path", "/Users/etl/daily"),
        )
}
