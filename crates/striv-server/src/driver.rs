//! Execution drivers: the boundary to the systems that actually run jobs.
//!
//! An execution names its driver and carries an opaque `driver_config`.
//! Drivers are registered by name on the service at startup.

use indexmap::IndexMap;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// An execution names a driver that is not registered.
    #[error("unknown driver: {0}")]
    UnknownDriver(String),

    /// The execution backend rejected or failed the request.
    #[error("driver {driver} failed: {message}")]
    Backend { driver: String, message: String },
}

/// Pushes jobs to an execution backend and reads back their runs.
pub trait ExecutionDriver: Send + Sync {
    /// Identifies the backend namespace `config` points at. Executions
    /// sharing an identity are refreshed once.
    fn namespace_identity(&self, config: &Value) -> String;

    /// Installs or updates `job_id` with its rendered payload.
    fn sync_job(&self, config: &Value, job_id: &str, payload: &Value) -> Result<(), DriverError>;

    /// Returns run id -> run for the given jobs. Each run must carry a
    /// `job_id` and a `created_at`.
    fn fetch_runs(
        &self,
        config: &Value,
        jobs: &IndexMap<String, Value>,
    ) -> Result<IndexMap<String, Value>, DriverError>;
}

/// Accepts every job and never reports runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDriver;

impl NoopDriver {
    pub const NAME: &'static str = "noop";
}

impl ExecutionDriver for NoopDriver {
    fn namespace_identity(&self, _config: &Value) -> String {
        Self::NAME.to_string()
    }

    fn sync_job(&self, _config: &Value, job_id: &str, _payload: &Value) -> Result<(), DriverError> {
        tracing::debug!(job_id, "noop driver accepted job");
        Ok(())
    }

    fn fetch_runs(
        &self,
        _config: &Value,
        _jobs: &IndexMap<String, Value>,
    ) -> Result<IndexMap<String, Value>, DriverError> {
        Ok(IndexMap::new())
    }
}
