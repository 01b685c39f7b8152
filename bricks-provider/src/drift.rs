//! Drift between a declared tree and the tree read back from the remote.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::Value as Json;

use crate::reconciler::ResourceKind;
use crate::transcoder::fill_job_defaults;
use crate::tree::ConfigTree;

/// One top-level field whose declared and observed values differ.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDrift {
    pub field: String,
    /// `None` when the field is unset on that side.
    pub declared: Option<Json>,
    pub observed: Option<Json>,
}

impl fmt::Display for FieldDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<Json>| match v {
            Some(v) => v.to_string(),
            None => "(unset)".to_string(),
        };
        match (&self.declared, &self.observed) {
            (Some(_), None) => write!(f, "+ {} = {}", self.field, show(&self.declared)),
            (None, Some(_)) => write!(f, "- {} = {}", self.field, show(&self.observed)),
            _ => write!(
                f,
                "~ {}: {} -> {}",
                self.field,
                show(&self.observed),
                show(&self.declared)
            ),
        }
    }
}

/// Fields that would change if `declared` were applied over `observed`.
/// Zero values count as unset on both sides.
pub fn diff(declared: &ConfigTree, observed: &ConfigTree) -> Vec<FieldDrift> {
    let declared = declared.pruned().into_json_object();
    let observed = observed.pruned().into_json_object();

    let fields: BTreeSet<&String> = declared.keys().chain(observed.keys()).collect();
    fields
        .into_iter()
        .filter_map(|field| {
            let d = declared.get(field);
            let o = observed.get(field);
            (d != o).then(|| FieldDrift {
                field: field.clone(),
                declared: d.cloned(),
                observed: o.cloned(),
            })
        })
        .collect()
}

/// [`diff`] after giving `declared` the defaults expansion applies for `kind`,
/// so a freshly created resource shows no drift.
pub fn diff_resource(
    kind: ResourceKind,
    declared: &ConfigTree,
    observed: &ConfigTree,
) -> Vec<FieldDrift> {
    let mut declared = declared.clone();
    match kind {
        ResourceKind::Job => fill_job_defaults(&mut declared),
        ResourceKind::Cluster => {}
    }
    diff(&declared, observed)
}
