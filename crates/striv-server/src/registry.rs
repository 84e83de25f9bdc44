//! Sort keys and relations of the entity types the server stores.
//!
//! - `job`: sorted by `name`; related to `("dvalue", "{dimension}:{value}")`
//!   for each selected dimension value.
//! - `run`: sorted by `created_at`; related to `("job", job_id)`.
//!
//! `dimension` and `execution` have neither.

use serde_json::Value;
use striv_store::{FieldSortKey, TypeRegistry};

pub const JOB: &str = "job";
pub const RUN: &str = "run";
pub const DIMENSION: &str = "dimension";
pub const EXECUTION: &str = "execution";

/// Relation linking a job to each of its dimension values.
pub const DIMENSION_VALUE: &str = "dvalue";

pub fn striv_registry() -> TypeRegistry {
    TypeRegistry::new()
        .with_sort_key(JOB, FieldSortKey::new("/name"))
        .with_relations(JOB, job_relations)
        .with_sort_key(RUN, FieldSortKey::new("/created_at"))
        .with_relations(RUN, run_relations)
}

fn job_relations(job: &Value) -> Vec<(String, String)> {
    job.get("dimensions")
        .and_then(Value::as_object)
        .map(|dimensions| {
            dimensions
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .as_str()
                        .map(|value| (DIMENSION_VALUE.to_string(), format!("{name}:{value}")))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn run_relations(run: &Value) -> Vec<(String, String)> {
    run.get("job_id")
        .and_then(Value::as_str)
        .map(|job_id| vec![(JOB.to_string(), job_id.to_string())])
        .unwrap_or_default()
}
