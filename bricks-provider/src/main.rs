//! bricks: reconcile one declared Databricks cluster or job.
//!
//! The declaration is a JSON object in the configuration tree layout; the
//! resulting handle and observed tree are kept in a state file between runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use bricks_api::{HttpClient, ProviderConfig};
use bricks_provider::drift::{self, FieldDrift};
use bricks_provider::state::{self, StateFile};
use bricks_provider::transcoder::{expand_cluster, expand_job};
use bricks_provider::{
    ClusterReconciler, ConfigTree, JobReconciler, NotFoundPolicy, Phase, PollConfig, Reconciler,
    Resource, ResourceKind,
};
use clap::{Parser, Subcommand};
use tabled::{Table, Tabled};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type JsonObject = serde_json::Map<String, serde_json::Value>;

#[derive(Parser)]
#[command(name = "bricks", version, about = "Reconcile Databricks clusters and jobs")]
struct Cli {
    /// Workspace URL, e.g. https://dbc-1234.cloud.databricks.com
    #[arg(long, env = "DATABRICKS_HOST", global = true)]
    host: Option<String>,

    /// Personal access token
    #[arg(long, env = "DATABRICKS_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Seconds between state polls while waiting for a cluster to settle
    #[arg(long, default_value = "5", global = true)]
    poll_interval_secs: u64,

    /// Give up waiting for a cluster to settle after this many seconds
    #[arg(long, global = true)]
    max_wait_secs: Option<u64>,

    /// Abort any single API request after this many seconds
    #[arg(long, default_value = "60", global = true)]
    request_timeout_secs: u64,

    /// Only treat HTTP 404 / RESOURCE_DOES_NOT_EXIST as "deleted remotely"
    #[arg(long, global = true)]
    strict_not_found: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the resource to match the declaration
    Apply {
        #[arg(long, value_enum)]
        kind: ResourceKind,
        /// Declaration file (JSON object)
        #[arg(long)]
        config: PathBuf,
        /// State file
        #[arg(long)]
        state: PathBuf,
    },

    /// Read the remote resource back into the state file
    Refresh {
        #[arg(long, value_enum)]
        kind: ResourceKind,
        #[arg(long)]
        state: PathBuf,
    },

    /// Show the fields apply would change
    Plan {
        #[arg(long, value_enum)]
        kind: ResourceKind,
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        state: PathBuf,
    },

    /// Permanently delete the remote resource
    Destroy {
        #[arg(long, value_enum)]
        kind: ResourceKind,
        #[arg(long)]
        state: PathBuf,
    },

    /// Check a declaration and print the request it expands to
    Validate {
        #[arg(long, value_enum)]
        kind: ResourceKind,
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Tabled)]
struct DriftRow {
    #[tabled(rename = "FIELD")]
    field: String,
    #[tabled(rename = "OBSERVED")]
    observed: String,
    #[tabled(rename = "DECLARED")]
    declared: String,
}

impl From<FieldDrift> for DriftRow {
    fn from(d: FieldDrift) -> Self {
        let show = |v: Option<serde_json::Value>| v.map(|v| v.to_string()).unwrap_or_default();
        Self {
            field: d.field,
            observed: show(d.observed),
            declared: show(d.declared),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "bricks=info,bricks_provider=info,bricks_api=info,reqwest=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            on_signal.cancel();
        }
    });

    match &cli.command {
        Commands::Apply {
            kind,
            config,
            state,
        } => {
            let declared = read_declaration(config).await?;
            let reconciler = build_reconciler(&cli, *kind, cancel)?;
            let previous = state::load(state, *kind).await?;
            let mut resource = previous
                .as_ref()
                .map(StateFile::resource)
                .unwrap_or_default();
            resource.config = ConfigTree::from_json_object(&declared);

            let outcome = reconciler.apply(&mut resource).await;
            let next = StateFile::after_apply(*kind, &resource, previous.as_ref(), outcome.is_ok());
            if let Some(next) = next {
                state::save(state, &next).await?;
            }
            outcome.with_context(|| format!("failed to apply {}", kind))?;

            info!(kind = %kind, id = resource.id.as_deref().unwrap_or_default(), "applied");
            println!("{} {}", kind, resource.id.as_deref().unwrap_or("-"));
        }

        Commands::Refresh { kind, state } => {
            let reconciler = build_reconciler(&cli, *kind, cancel)?;
            let mut resource = load_existing(state, *kind).await?;

            reconciler
                .read(&mut resource)
                .await
                .with_context(|| format!("failed to read {}", kind))?;
            state::save(state, &StateFile::capture(*kind, &resource)).await?;

            match resource.phase {
                Phase::Absent => println!("{} no longer exists", kind),
                _ => println!("{}", serde_json::to_string_pretty(&resource.config)?),
            }
        }

        Commands::Plan {
            kind,
            config,
            state,
        } => {
            let declared = ConfigTree::from_json_object(&read_declaration(config).await?);
            validate(*kind, &declared)?;

            let mut resource = match state::load(state, *kind).await? {
                Some(previous) => previous.resource(),
                None => Resource::default(),
            };
            if resource.id.is_some() {
                let reconciler = build_reconciler(&cli, *kind, cancel)?;
                reconciler
                    .read(&mut resource)
                    .await
                    .with_context(|| format!("failed to read {}", kind))?;
            }

            if resource.phase == Phase::Absent {
                println!("{} will be created", kind);
                return Ok(());
            }

            let changes = drift::diff_resource(*kind, &declared, &resource.config);
            if changes.is_empty() {
                println!("No changes");
            } else {
                let rows: Vec<DriftRow> = changes.into_iter().map(DriftRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Destroy { kind, state } => {
            let reconciler = build_reconciler(&cli, *kind, cancel)?;
            let mut resource = load_existing(state, *kind).await?;

            reconciler
                .delete(&mut resource)
                .await
                .with_context(|| format!("failed to delete {}", kind))?;
            state::save(state, &StateFile::capture(*kind, &resource)).await?;
            println!("{} deleted", kind);
        }

        Commands::Validate { kind, config } => {
            let declared = read_declaration(config).await?;
            // Expand straight from the JSON object.
            let wire = match kind {
                ResourceKind::Cluster => serde_json::to_value(expand_cluster(&declared)?)?,
                ResourceKind::Job => serde_json::to_value(expand_job(&declared)?)?,
            };
            println!("{}", serde_json::to_string_pretty(&wire)?);
        }
    }

    Ok(())
}

fn build_reconciler(
    cli: &Cli,
    kind: ResourceKind,
    cancel: CancellationToken,
) -> Result<Box<dyn Reconciler>> {
    let (Some(host), Some(token)) = (cli.host.as_deref(), cli.token.as_deref()) else {
        bail!("--host/DATABRICKS_HOST and --token/DATABRICKS_TOKEN are required");
    };
    let config = ProviderConfig::new(host, token)
        .with_timeout(Duration::from_secs(cli.request_timeout_secs.max(1)));
    let client = Arc::new(HttpClient::new(&config).context("failed to build API client")?);
    info!(base_path = client.base_path(), "using workspace");

    let not_found = if cli.strict_not_found {
        NotFoundPolicy::Explicit
    } else {
        NotFoundPolicy::AnyError
    };

    Ok(match kind {
        ResourceKind::Cluster => {
            let poll = PollConfig {
                interval: Duration::from_secs(cli.poll_interval_secs.max(1)),
                max_wait: cli.max_wait_secs.map(Duration::from_secs),
            };
            Box::new(ClusterReconciler::new(client, poll, cancel, not_found))
        }
        ResourceKind::Job => Box::new(JobReconciler::new(client, not_found)),
    })
}

async fn read_declaration(path: &Path) -> Result<JsonObject> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON object", path.display()))
}

async fn load_existing(path: &Path, kind: ResourceKind) -> Result<Resource> {
    match state::load(path, kind).await? {
        Some(previous) if previous.id.is_some() => Ok(previous.resource()),
        _ => bail!("no {} recorded in {}", kind, path.display()),
    }
}

fn validate(kind: ResourceKind, declared: &ConfigTree) -> Result<()> {
    match kind {
        ResourceKind::Cluster => expand_cluster(declared).map(|_| ()),
        ResourceKind::Job => expand_job(declared).map(|_| ()),
    }
    .context("invalid declaration")
}
