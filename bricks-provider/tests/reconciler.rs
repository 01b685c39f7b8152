//! Reconciler integration tests against the recording fake API.

mod common;

use std::sync::Arc;

use bricks_api::{ApiError, ClusterState, JobSettings};
use bricks_provider::{
    ClusterReconciler, ConfigSource, ConfigTree, JobReconciler, NotFoundPolicy, Phase,
    PollConfig, ProviderError, Reconciler, Resource, ValidationError, Value,
};
use bricks_provider::ResourceKind;
use bricks_provider::drift::diff_resource;
use common::{CLUSTER_ID, FakeApi, JOB_ID, cluster_spec, cluster_tree, job_tree, remote};
use tokio_util::sync::CancellationToken;

fn clusters(api: &Arc<FakeApi>, policy: NotFoundPolicy) -> ClusterReconciler<FakeApi> {
    ClusterReconciler::new(
        api.clone(),
        PollConfig::default(),
        CancellationToken::new(),
        policy,
    )
}

fn jobs(api: &Arc<FakeApi>) -> JobReconciler<FakeApi> {
    JobReconciler::new(api.clone(), NotFoundPolicy::default())
}

// =============================================================================
// Clusters
// =============================================================================

#[tokio::test]
async fn test_create_cluster_stores_handle_and_reads_back() {
    let api = FakeApi::new();
    let reconciler = clusters(&api, NotFoundPolicy::default());
    let mut resource = Resource::new(cluster_tree(1));

    reconciler.create(&mut resource).await.unwrap();

    assert_eq!(resource.id.as_deref(), Some(CLUSTER_ID));
    assert_eq!(resource.phase, Phase::Present);
    assert_eq!(
        api.calls(),
        vec!["create_cluster".to_string(), format!("get_cluster {}", CLUSTER_ID)]
    );

    let sent = api.stored_cluster().unwrap().spec;
    assert_eq!(sent.num_workers, Some(1));
    assert_eq!(sent.autoscale, None);

    // The remote default is now part of the local tree.
    assert_eq!(resource.config.get("autotermination_minutes"), Some(Value::Int(120)));
    assert_eq!(resource.config.get("autoscale"), Some(Value::List(vec![])));
}

#[tokio::test]
async fn test_conflicting_sizes_fail_before_any_call() {
    let api = FakeApi::new();
    let reconciler = clusters(&api, NotFoundPolicy::default());
    let tree = cluster_tree(2).with_block(
        "autoscale",
        ConfigTree::new().with("min_workers", 1).with("max_workers", 4),
    );

    let mut resource = Resource::new(tree.clone());
    let err = reconciler.create(&mut resource).await.unwrap_err();
    assert!(matches!(
        err,
        ProviderError::Validation(ValidationError::Conflict { .. })
    ));
    assert_eq!(resource.id, None);

    let mut resource = Resource::existing(CLUSTER_ID, tree);
    let err = reconciler.update(&mut resource).await.unwrap_err();
    assert!(matches!(err, ProviderError::Validation(_)));

    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_create_failure_leaves_resource_absent() {
    struct Refusing;

    #[async_trait::async_trait]
    impl bricks_api::ClusterApi for Refusing {
        async fn create_cluster(&self, _: &bricks_api::ClusterSpec) -> bricks_api::Result<String> {
            Err(ApiError::transport("connection refused"))
        }
        async fn edit_cluster(&self, _: &str, _: &bricks_api::ClusterSpec) -> bricks_api::Result<()> {
            unreachable!()
        }
        async fn get_cluster(&self, _: &str) -> bricks_api::Result<bricks_api::ClusterInfo> {
            unreachable!()
        }
        async fn permanent_delete_cluster(&self, _: &str) -> bricks_api::Result<()> {
            unreachable!()
        }
    }

    let reconciler = ClusterReconciler::new(
        Arc::new(Refusing),
        PollConfig::default(),
        CancellationToken::new(),
        NotFoundPolicy::default(),
    );
    let mut resource = Resource::new(cluster_tree(1));
    let err = reconciler.create(&mut resource).await.unwrap_err();

    assert!(matches!(err, ProviderError::Api(ApiError::Transport { .. })));
    assert_eq!(resource.id, None);
    assert_eq!(resource.phase, Phase::Absent);
}

#[tokio::test]
async fn test_read_replaces_tree_with_remote_settings() {
    let api = FakeApi::with_cluster(cluster_spec(4), ClusterState::Running);
    let reconciler = clusters(&api, NotFoundPolicy::default());
    let mut resource = Resource::existing(CLUSTER_ID, cluster_tree(2));

    reconciler.read(&mut resource).await.unwrap();

    assert_eq!(resource.phase, Phase::Present);
    assert_eq!(resource.config.get("num_workers"), Some(Value::Int(4)));
    assert!(resource.config.equivalent(&cluster_tree(4)));
}

#[tokio::test]
async fn test_read_not_found_clears_handle_without_error() {
    let api = FakeApi::new();
    let reconciler = clusters(&api, NotFoundPolicy::default());
    let mut resource = Resource::existing("deleted-out-of-band", cluster_tree(1));

    reconciler.read(&mut resource).await.unwrap();

    assert_eq!(resource.id, None);
    assert_eq!(resource.phase, Phase::Absent);
}

#[tokio::test]
async fn test_read_classification_follows_policy() {
    // Broad policy: a 403 counts as gone.
    let api = FakeApi::with_cluster(cluster_spec(1), ClusterState::Running);
    api.script_cluster_get(Err(remote(403)));
    let mut resource = Resource::existing(CLUSTER_ID, cluster_tree(1));
    clusters(&api, NotFoundPolicy::AnyError)
        .read(&mut resource)
        .await
        .unwrap();
    assert_eq!(resource.phase, Phase::Absent);

    // Strict policy: the 403 is surfaced and the handle is kept.
    let api = FakeApi::with_cluster(cluster_spec(1), ClusterState::Running);
    api.script_cluster_get(Err(remote(403)));
    let mut resource = Resource::existing(CLUSTER_ID, cluster_tree(1));
    let err = clusters(&api, NotFoundPolicy::Explicit)
        .read(&mut resource)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Api(ApiError::Remote { status: 403, .. })));
    assert_eq!(resource.id.as_deref(), Some(CLUSTER_ID));
    assert_eq!(resource.phase, Phase::Unknown);
}

#[tokio::test]
async fn test_transport_error_on_read_is_never_not_found() {
    let api = FakeApi::with_cluster(cluster_spec(1), ClusterState::Running);
    api.script_cluster_get(Err(ApiError::transport("timed out")));
    let mut resource = Resource::existing(CLUSTER_ID, cluster_tree(1));

    let err = clusters(&api, NotFoundPolicy::AnyError)
        .read(&mut resource)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Api(ApiError::Transport { .. })));
    assert_eq!(resource.phase, Phase::Unknown);
}

#[tokio::test(start_paused = true)]
async fn test_update_waits_for_stable_state_then_edits_then_reads() {
    let api = FakeApi::with_cluster(cluster_spec(2), ClusterState::Running);
    api.script_cluster_state(ClusterState::Pending);
    api.script_cluster_state(ClusterState::Resizing);
    let reconciler = clusters(&api, NotFoundPolicy::default());
    let mut resource = Resource::existing(CLUSTER_ID, cluster_tree(3));

    reconciler.update(&mut resource).await.unwrap();

    let get = format!("get_cluster {}", CLUSTER_ID);
    assert_eq!(
        api.calls(),
        vec![
            get.clone(),
            get.clone(),
            get.clone(),
            format!("edit_cluster {}", CLUSTER_ID),
            get,
        ]
    );
    assert_eq!(api.stored_cluster().unwrap().spec.num_workers, Some(3));
    assert_eq!(resource.config.get("num_workers"), Some(Value::Int(3)));
    assert_eq!(resource.id.as_deref(), Some(CLUSTER_ID));
}

#[tokio::test]
async fn test_update_without_handle() {
    let api = FakeApi::new();
    let mut resource = Resource::new(cluster_tree(1));
    let err = clusters(&api, NotFoundPolicy::default())
        .update(&mut resource)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::MissingHandle { kind: "cluster" }));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_update_cancelled_while_waiting() {
    let api = FakeApi::with_cluster(cluster_spec(2), ClusterState::Pending);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let reconciler = ClusterReconciler::new(
        api.clone(),
        PollConfig::default(),
        cancel,
        NotFoundPolicy::default(),
    );
    let mut resource = Resource::existing(CLUSTER_ID, cluster_tree(3));

    let err = reconciler.update(&mut resource).await.unwrap_err();
    assert!(matches!(err, ProviderError::Cancelled { .. }));
    // No edit was issued.
    assert_eq!(api.stored_cluster().unwrap().spec.num_workers, Some(2));
}

#[tokio::test]
async fn test_delete_clears_handle_and_repeats_as_noop() {
    let api = FakeApi::with_cluster(cluster_spec(1), ClusterState::Running);
    let reconciler = clusters(&api, NotFoundPolicy::default());
    let mut resource = Resource::existing(CLUSTER_ID, cluster_tree(1));

    reconciler.delete(&mut resource).await.unwrap();
    assert_eq!(resource.id, None);
    assert_eq!(resource.phase, Phase::Absent);
    // The tree still describes the resource.
    assert_eq!(resource.config, cluster_tree(1));

    reconciler.delete(&mut resource).await.unwrap();
    assert_eq!(
        api.calls(),
        vec![format!("permanent_delete_cluster {}", CLUSTER_ID)]
    );
}

#[tokio::test]
async fn test_delete_error_is_surfaced_and_handle_kept() {
    let api = FakeApi::new();
    let reconciler = clusters(&api, NotFoundPolicy::default());
    let mut resource = Resource::existing("unknown", cluster_tree(1));

    let err = reconciler.delete(&mut resource).await.unwrap_err();
    assert!(matches!(err, ProviderError::Api(ApiError::Remote { status: 404, .. })));
    assert_eq!(resource.id.as_deref(), Some("unknown"));
}

#[tokio::test]
async fn test_apply_recreates_cluster_deleted_out_of_band() {
    let api = FakeApi::new();
    let reconciler = clusters(&api, NotFoundPolicy::default());
    let mut resource = Resource::existing("old-cluster", cluster_tree(2));

    reconciler.apply(&mut resource).await.unwrap();

    assert_eq!(
        api.calls(),
        vec![
            "get_cluster old-cluster".to_string(),
            "create_cluster".to_string(),
            format!("get_cluster {}", CLUSTER_ID),
        ]
    );
    assert_eq!(resource.id.as_deref(), Some(CLUSTER_ID));
    assert_eq!(api.stored_cluster().unwrap().spec.num_workers, Some(2));
}

#[tokio::test]
async fn test_apply_updates_existing_cluster_with_declared_tree() {
    let api = FakeApi::with_cluster(cluster_spec(1), ClusterState::Terminated);
    let reconciler = clusters(&api, NotFoundPolicy::default());
    let mut resource = Resource::existing(CLUSTER_ID, cluster_tree(5));

    reconciler.apply(&mut resource).await.unwrap();

    assert_eq!(api.stored_cluster().unwrap().spec.num_workers, Some(5));
    assert!(api.calls().contains(&format!("edit_cluster {}", CLUSTER_ID)));
}

// =============================================================================
// Jobs
// =============================================================================

#[tokio::test]
async fn test_create_job_sends_default_concurrency() {
    let api = FakeApi::new();
    let reconciler = jobs(&api);
    let mut resource = Resource::new(job_tree("daily-etl"));

    reconciler.create(&mut resource).await.unwrap();

    assert_eq!(resource.id.as_deref(), Some("42"));
    assert_eq!(
        api.calls(),
        vec!["create_job".to_string(), format!("get_job {}", JOB_ID)]
    );
    assert_eq!(resource.config.get("max_concurrent_runs"), Some(Value::Int(1)));
    assert!(job_tree("daily-etl")
        .with("max_concurrent_runs", 1)
        .equivalent(&resource.config));
    let sent = api.stored_job().unwrap().settings.unwrap();
    assert_eq!(sent.max_concurrent_runs, Some(1));
}

#[tokio::test]
async fn test_created_job_shows_no_drift() {
    let api = FakeApi::new();
    let reconciler = jobs(&api);
    let mut resource = Resource::new(job_tree("etl"));

    reconciler.create(&mut resource).await.unwrap();

    let drift = diff_resource(ResourceKind::Job, &job_tree("etl"), &resource.config);
    assert!(drift.is_empty(), "unexpected drift: {drift:?}");
}

#[tokio::test]
async fn test_update_job_resets_without_waiting() {
    let api = FakeApi::with_job(JobSettings {
        name: Some("old".to_string()),
        ..Default::default()
    });
    let reconciler = jobs(&api);
    let mut resource = Resource::existing(JOB_ID.to_string(), job_tree("renamed"));

    reconciler.update(&mut resource).await.unwrap();

    assert_eq!(
        api.calls(),
        vec![format!("reset_job {}", JOB_ID), format!("get_job {}", JOB_ID)]
    );
    let stored = api.stored_job().unwrap().settings.unwrap();
    assert_eq!(stored.name.as_deref(), Some("renamed"));
    assert_eq!(resource.config.get("name"), Some(Value::from("renamed")));
}

#[tokio::test]
async fn test_non_numeric_job_handle() {
    let api = FakeApi::new();
    let reconciler = jobs(&api);
    let mut resource = Resource::existing("not-a-number", job_tree("x"));

    let err = reconciler.read(&mut resource).await.unwrap_err();
    assert!(matches!(
        err,
        ProviderError::Validation(ValidationError::InvalidHandle(_))
    ));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_job_read_not_found_and_delete() {
    let api = FakeApi::with_job(JobSettings::default());
    let reconciler = jobs(&api);
    let mut resource = Resource::existing(JOB_ID.to_string(), job_tree("x"));

    reconciler.delete(&mut resource).await.unwrap();
    assert_eq!(resource.id, None);

    let mut stale = Resource::existing(JOB_ID.to_string(), job_tree("x"));
    reconciler.read(&mut stale).await.unwrap();
    assert_eq!(stale.phase, Phase::Absent);
    assert_eq!(
        api.calls(),
        vec![format!("delete_job {}", JOB_ID), format!("get_job {}", JOB_ID)]
    );
}

#[tokio::test]
async fn test_job_with_two_tasks_is_rejected_locally() {
    let api = FakeApi::new();
    let tree = job_tree("x").with_block(
        "spark_python_task",
        ConfigTree::new().with("python_file", "dbfs:/main.py"),
    );
    let mut resource = Resource::new(tree);

    let err = jobs(&api).create(&mut resource).await.unwrap_err();
    assert!(matches!(
        err,
        ProviderError::Validation(ValidationError::Conflict { .. })
    ));
    assert!(api.calls().is_empty());
}
