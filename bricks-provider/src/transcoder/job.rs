//! Job schema <-> `JobSettings`.

use bricks_api::{
    CronSchedule, EmailNotifications, JobSettings, Library, MavenLibrary, NotebookTask,
    PythonPyPiLibrary, RCranLibrary, SparkJarTask, SparkPythonTask, SparkSubmitTask,
};

use super::cluster::{self, flatten_cluster};
use super::{Fields, Result, put_block, put_bool, put_int, put_map, put_string, put_strings};
use crate::tree::{ConfigSource, ConfigTree, Value};

const TARGET_GROUP: &[&str] = &["new_cluster", "existing_cluster_id"];
const TASK_GROUP: &[&str] = &[
    "notebook_task",
    "spark_jar_task",
    "spark_python_task",
    "spark_submit_task",
];
const LIBRARY_KINDS: &[&str] = &["jar", "egg", "whl", "pypi", "maven", "cran"];

/// Concurrent run limit sent when the tree leaves it unset.
pub const DEFAULT_MAX_CONCURRENT_RUNS: i32 = 1;

/// The one task a job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobTask {
    Notebook(NotebookTask),
    SparkJar(SparkJarTask),
    SparkPython(SparkPythonTask),
    SparkSubmit(SparkSubmitTask),
}

impl JobTask {
    /// The task carried by `settings`, if any. When the remote reports more
    /// than one, the first in schema order wins.
    pub fn of(settings: &JobSettings) -> Option<JobTask> {
        if let Some(t) = &settings.notebook_task {
            Some(JobTask::Notebook(t.clone()))
        } else if let Some(t) = &settings.spark_jar_task {
            Some(JobTask::SparkJar(t.clone()))
        } else if let Some(t) = &settings.spark_python_task {
            Some(JobTask::SparkPython(t.clone()))
        } else {
            settings
                .spark_submit_task
                .as_ref()
                .map(|t| JobTask::SparkSubmit(t.clone()))
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            JobTask::Notebook(_) => "notebook_task",
            JobTask::SparkJar(_) => "spark_jar_task",
            JobTask::SparkPython(_) => "spark_python_task",
            JobTask::SparkSubmit(_) => "spark_submit_task",
        }
    }

    fn apply(self, settings: &mut JobSettings) {
        match self {
            JobTask::Notebook(t) => settings.notebook_task = Some(t),
            JobTask::SparkJar(t) => settings.spark_jar_task = Some(t),
            JobTask::SparkPython(t) => settings.spark_python_task = Some(t),
            JobTask::SparkSubmit(t) => settings.spark_submit_task = Some(t),
        }
    }
}

/// Build job settings from the tree.
pub fn expand_job(src: &dyn ConfigSource) -> Result<JobSettings> {
    let f = Fields::root(src);

    let new_cluster = match f.exclusive("cluster", TARGET_GROUP)? {
        Some("new_cluster") => match f.block("new_cluster")? {
            Some(block) => Some(cluster::expand_fields(&f.nested("new_cluster", &block))?),
            None => None,
        },
        _ => None,
    };

    let mut settings = JobSettings {
        name: f.string("name")?,
        new_cluster,
        existing_cluster_id: f.string("existing_cluster_id")?,
        libraries: expand_libraries(&f)?,
        email_notifications: match f.block("email_notifications")? {
            Some(block) => Some(expand_notifications(&f.nested("email_notifications", &block))?),
            None => None,
        },
        timeout_seconds: f.int32("timeout_seconds")?,
        max_retries: f.int32("max_retries")?,
        min_retry_interval_millis: f.int32("min_retry_interval_millis")?,
        retry_on_timeout: f.bool("retry_on_timeout")?,
        schedule: match f.block("schedule")? {
            Some(block) => {
                let s = f.nested("schedule", &block);
                Some(CronSchedule {
                    quartz_cron_expression: s.required_string("quartz_cron_expression")?,
                    timezone_id: s.required_string("timezone_id")?,
                })
            }
            None => None,
        },
        max_concurrent_runs: Some(
            f.int32("max_concurrent_runs")?
                .unwrap_or(DEFAULT_MAX_CONCURRENT_RUNS),
        ),
        ..Default::default()
    };

    expand_task(&f)?.apply(&mut settings);
    Ok(settings)
}

fn expand_task(f: &Fields<'_>) -> Result<JobTask> {
    let kind = f.one_of("task", TASK_GROUP)?;
    let block = f.block(kind)?.unwrap_or_default();
    let t = f.nested(kind, &block);

    Ok(match kind {
        "notebook_task" => JobTask::Notebook(NotebookTask {
            notebook_path: t.required_string("notebook_path")?,
            base_parameters: t.string_map("base_parameters")?,
        }),
        "spark_jar_task" => JobTask::SparkJar(SparkJarTask {
            jar_uri: t.string("jar_uri")?,
            main_class_name: t.string("main_class_name")?,
            parameters: t.strings("parameters")?,
        }),
        "spark_python_task" => JobTask::SparkPython(SparkPythonTask {
            python_file: t.string("python_file")?,
            parameters: t.strings("parameters")?,
        }),
        _ => JobTask::SparkSubmit(SparkSubmitTask {
            parameters: t.strings("parameters")?,
        }),
    })
}

fn expand_libraries(f: &Fields<'_>) -> Result<Option<Vec<Library>>> {
    let blocks = f.blocks("libraries")?;
    if blocks.is_empty() {
        return Ok(None);
    }

    blocks
        .iter()
        .enumerate()
        .map(|(i, block)| {
            let lib = f.nested(&format!("libraries[{}]", i), block);
            let kind = lib.one_of("source", LIBRARY_KINDS)?;
            expand_library(&lib, kind)
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn expand_library(lib: &Fields<'_>, kind: &str) -> Result<Library> {
    let nested = |kind: &str| -> Result<ConfigTree> { Ok(lib.block(kind)?.unwrap_or_default()) };

    Ok(match kind {
        "jar" => Library::Jar(lib.required_string("jar")?),
        "egg" => Library::Egg(lib.required_string("egg")?),
        "whl" => Library::Whl(lib.required_string("whl")?),
        "pypi" => {
            let block = nested("pypi")?;
            let p = lib.nested("pypi", &block);
            Library::Pypi(PythonPyPiLibrary {
                package: Some(p.required_string("package")?),
                repo: p.string("repo")?,
            })
        }
        "maven" => {
            let block = nested("maven")?;
            let m = lib.nested("maven", &block);
            Library::Maven(MavenLibrary {
                coordinates: Some(m.required_string("coordinates")?),
                repo: m.string("repo")?,
                exclusions: m.strings("exclusions")?,
            })
        }
        _ => {
            let block = nested("cran")?;
            let c = lib.nested("cran", &block);
            Library::Cran(RCranLibrary {
                package: Some(c.required_string("package")?),
                repo: c.string("repo")?,
            })
        }
    })
}

fn expand_notifications(f: &Fields<'_>) -> Result<EmailNotifications> {
    Ok(EmailNotifications {
        on_start: f.strings("on_start")?,
        on_success: f.strings("on_success")?,
        on_failure: f.strings("on_failure")?,
        no_alert_for_skipped_runs: f.bool("no_alert_for_skipped_runs")?,
    })
}

/// Flatten job settings into a fresh tree.
pub fn flatten_job(settings: &JobSettings) -> ConfigTree {
    let mut tree = ConfigTree::new();
    flatten_job_into(settings, &mut tree);
    tree
}

/// Write every job schema field into `dst`.
pub fn flatten_job_into(settings: &JobSettings, dst: &mut dyn ConfigSource) {
    put_string(dst, "name", settings.name.as_ref());
    put_block(dst, "new_cluster", settings.new_cluster.as_ref().map(flatten_cluster));
    put_string(dst, "existing_cluster_id", settings.existing_cluster_id.as_ref());

    put_block(
        dst,
        "notebook_task",
        settings.notebook_task.as_ref().map(|t| {
            let mut tree = ConfigTree::new().with("notebook_path", t.notebook_path.as_str());
            put_map(&mut tree, "base_parameters", t.base_parameters.as_ref());
            tree
        }),
    );
    put_block(
        dst,
        "spark_jar_task",
        settings.spark_jar_task.as_ref().map(|t| {
            let mut tree = ConfigTree::new();
            put_string(&mut tree, "jar_uri", t.jar_uri.as_ref());
            put_string(&mut tree, "main_class_name", t.main_class_name.as_ref());
            put_strings(&mut tree, "parameters", t.parameters.as_ref());
            tree
        }),
    );
    put_block(
        dst,
        "spark_python_task",
        settings.spark_python_task.as_ref().map(|t| {
            let mut tree = ConfigTree::new();
            put_string(&mut tree, "python_file", t.python_file.as_ref());
            put_strings(&mut tree, "parameters", t.parameters.as_ref());
            tree
        }),
    );
    put_block(
        dst,
        "spark_submit_task",
        settings.spark_submit_task.as_ref().map(|t| {
            let mut tree = ConfigTree::new();
            put_strings(&mut tree, "parameters", t.parameters.as_ref());
            tree
        }),
    );

    let libraries = settings
        .libraries
        .iter()
        .flatten()
        .map(|lib| Value::Block(flatten_library(lib)))
        .collect();
    dst.set("libraries", Value::List(libraries));

    put_block(
        dst,
        "email_notifications",
        settings.email_notifications.as_ref().map(|n| {
            let mut tree = ConfigTree::new();
            put_strings(&mut tree, "on_start", n.on_start.as_ref());
            put_strings(&mut tree, "on_success", n.on_success.as_ref());
            put_strings(&mut tree, "on_failure", n.on_failure.as_ref());
            put_bool(&mut tree, "no_alert_for_skipped_runs", n.no_alert_for_skipped_runs);
            tree
        }),
    );

    put_int(dst, "timeout_seconds", settings.timeout_seconds);
    put_int(dst, "max_retries", settings.max_retries);
    put_int(dst, "min_retry_interval_millis", settings.min_retry_interval_millis);
    put_bool(dst, "retry_on_timeout", settings.retry_on_timeout);
    put_block(
        dst,
        "schedule",
        settings.schedule.as_ref().map(|s| {
            ConfigTree::new()
                .with("quartz_cron_expression", s.quartz_cron_expression.as_str())
                .with("timezone_id", s.timezone_id.as_str())
        }),
    );
    put_int(dst, "max_concurrent_runs", settings.max_concurrent_runs);
}

/// Write the schema defaults `expand_job` applies into a declared tree, so it
/// compares equal to what a read returns.
pub fn fill_job_defaults(dst: &mut dyn ConfigSource) {
    if dst.get_if_present("max_concurrent_runs").is_none() {
        dst.set(
            "max_concurrent_runs",
            Value::Int(DEFAULT_MAX_CONCURRENT_RUNS.into()),
        );
    }
}

/// One library element with all six source keys present.
fn flatten_library(lib: &Library) -> ConfigTree {
    let mut tree = ConfigTree::new();
    let text = |l: &Library, kind: &str| match (l, kind) {
        (Library::Jar(s), "jar") | (Library::Egg(s), "egg") | (Library::Whl(s), "whl") => {
            Some(s.clone())
        }
        _ => None,
    };
    for kind in ["jar", "egg", "whl"] {
        put_string(&mut tree, kind, text(lib, kind).as_ref());
    }

    let (pypi, maven, cran) = match lib {
        Library::Pypi(p) => {
            let mut b = ConfigTree::new();
            put_string(&mut b, "package", p.package.as_ref());
            put_string(&mut b, "repo", p.repo.as_ref());
            (Some(b), None, None)
        }
        Library::Maven(m) => {
            let mut b = ConfigTree::new();
            put_string(&mut b, "coordinates", m.coordinates.as_ref());
            put_string(&mut b, "repo", m.repo.as_ref());
            put_strings(&mut b, "exclusions", m.exclusions.as_ref());
            (None, Some(b), None)
        }
        Library::Cran(c) => {
            let mut b = ConfigTree::new();
            put_string(&mut b, "package", c.package.as_ref());
            put_string(&mut b, "repo", c.repo.as_ref());
            (None, None, Some(b))
        }
        _ => (None, None, None),
    };
    put_block(&mut tree, "pypi", pypi);
    put_block(&mut tree, "maven", maven);
    put_block(&mut tree, "cran", cran);
    tree
}
