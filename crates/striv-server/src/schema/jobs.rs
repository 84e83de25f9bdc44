//! Job definition and job request/response types.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use striv_store::MAX_KEY_LEN;

use super::validation::{is_dimension_name, is_param_name, FieldError};

/// A job: one parameterized workload installed through an execution.
///
/// Stored as the `job` entity payload, with `modified_at` set by the server
/// on every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    pub name: String,
    /// Id of the `execution` entity that installs this job.
    pub execution: String,
    /// Dimension name -> selected value.
    #[serde(default)]
    pub dimensions: IndexMap<String, String>,
    /// Job-level parameters, applied last.
    #[serde(default)]
    pub params: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

impl JobSpec {
    /// Deserializes and validates a request body, collecting every field
    /// error rather than stopping at the first.
    pub fn parse(body: Value) -> Result<JobSpec, Vec<FieldError>> {
        let job: JobSpec =
            serde_json::from_value(body).map_err(|err| vec![FieldError::from_serde(&err)])?;
        let errors = job.validate();
        if errors.is_empty() {
            Ok(job)
        } else {
            Err(errors)
        }
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.name.is_empty() || self.name.chars().count() > MAX_KEY_LEN {
            errors.push(FieldError::new(
                "name",
                format!("must be 1 to {MAX_KEY_LEN} characters"),
            ));
        }
        if self.execution.is_empty() || self.execution.contains(':') {
            errors.push(FieldError::new("execution", "must be a non-empty id without ':'"));
        }
        for (name, value) in &self.dimensions {
            if !is_dimension_name(name) {
                errors.push(FieldError::new(
                    format!("dimensions.{name}"),
                    "dimension names must match ^[a-z_][a-z0-9_]*$",
                ));
            } else if name.chars().count() + 1 + value.chars().count() > MAX_KEY_LEN {
                errors.push(FieldError::new(
                    format!("dimensions.{name}"),
                    format!("dimension and value must total at most {MAX_KEY_LEN} characters"),
                ));
            }
        }
        for name in self.params.keys() {
            if !is_param_name(name) {
                errors.push(FieldError::new(
                    format!("params.{name}"),
                    "parameter names must match ^[A-Za-z_][A-Za-z0-9_.]*$",
                ));
            }
        }
        errors
    }
}

/// Response from creating or updating a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobIdResponse {
    pub id: String,
}

/// Response from evaluating a job without saving it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateJobResponse {
    pub payload: Value,
}
