//! StrivService: the single coordinator between HTTP handlers and the
//! entity store, payload renderer and execution drivers.
//!
//! All business logic flows through [`StrivService`]. Handlers are thin
//! wrappers that delegate to these methods.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use striv_store::{
    Entity, EntityKey, EntityStore, FindQuery, Page, PageRequest, StoreConfig, StoreError,
};

use crate::driver::{DriverError, ExecutionDriver, NoopDriver};
use crate::error::ApiError;
use crate::registry::{striv_registry, DIMENSION, EXECUTION, JOB, RUN};
use crate::render::{LayeredRenderer, ParamLayer, PayloadRenderer};
use crate::schema::jobs::JobSpec;
use crate::schema::state::{Dimension, Execution, StateChanges, StateDump, StateRequest};

/// Format of a job's `modified_at`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// The central service coordinating jobs, runs and configuration state.
pub struct StrivService {
    store: EntityStore,
    drivers: HashMap<String, Arc<dyn ExecutionDriver>>,
    renderer: Box<dyn PayloadRenderer>,
}

impl StrivService {
    /// Wraps `store` with the layered renderer and the `noop` driver.
    pub fn new(store: EntityStore) -> Self {
        StrivService {
            store,
            drivers: HashMap::new(),
            renderer: Box::new(LayeredRenderer),
        }
        .with_driver(NoopDriver::NAME, NoopDriver)
    }

    /// Opens the configured store with the server's type registry.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        Ok(Self::new(EntityStore::open(config, striv_registry())?))
    }

    /// Creates a service over an empty in-memory store (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::open(&StoreConfig::sqlite_in_memory())
    }

    /// Registers `driver` under `name`, replacing any previous one.
    pub fn with_driver(mut self, name: &str, driver: impl ExecutionDriver + 'static) -> Self {
        self.drivers.insert(name.to_string(), Arc::new(driver));
        self
    }

    pub fn with_renderer(mut self, renderer: impl PayloadRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    // -------------------------------------------------------------------
    // Jobs
    // -------------------------------------------------------------------

    pub fn list_jobs(&mut self) -> Result<IndexMap<String, Value>, ApiError> {
        Ok(self.store.find(&FindQuery::of_type(JOB))?)
    }

    pub fn get_job(&mut self, id: &str) -> Result<Value, ApiError> {
        Ok(self.store.load_one(JOB, id)?)
    }

    /// Validates, renders and installs a new job under a fresh id.
    pub fn create_job(&mut self, body: Value) -> Result<String, ApiError> {
        let job = JobSpec::parse(body)?;
        let id = Uuid::new_v4().to_string();
        self.apply_job(&id, job)?;
        info!(job_id = %id, "created job");
        Ok(id)
    }

    /// Replaces an existing job. Never creates one.
    pub fn update_job(&mut self, id: &str, body: Value) -> Result<(), ApiError> {
        self.store.load_one(JOB, id)?;
        let job = JobSpec::parse(body)?;
        self.apply_job(id, job)?;
        info!(job_id = %id, "updated job");
        Ok(())
    }

    /// Validates and renders a job without installing or saving it.
    pub fn evaluate_job(&mut self, body: Value) -> Result<Value, ApiError> {
        let job = JobSpec::parse(body)?;
        let (_, payload) = self.job_to_payload(&job)?;
        Ok(payload)
    }

    fn apply_job(&mut self, id: &str, mut job: JobSpec) -> Result<(), ApiError> {
        let (execution, payload) = self.job_to_payload(&job)?;
        let driver = self.driver(&execution.driver)?;
        driver.sync_job(&execution.driver_config, id, &payload)?;
        job.modified_at = Some(Utc::now().format(TIMESTAMP_FORMAT).to_string());
        let payload = serde_json::to_value(&job)
            .map_err(|err| ApiError::InternalError(err.to_string()))?;
        self.store.upsert(&[Entity::new(JOB, id, payload)])?;
        Ok(())
    }

    /// Collects the job's parameter layers and renders its execution's
    /// template.
    ///
    /// Layers, first to last: the execution's `default_params`, each selected
    /// dimension value's `params` by ascending dimension priority (ties by
    /// dimension name), then the job's own `params`.
    fn job_to_payload(&mut self, job: &JobSpec) -> Result<(Execution, Value), ApiError> {
        let mut keys = vec![EntityKey::new(EXECUTION, job.execution.as_str())];
        keys.extend(
            job.dimensions
                .keys()
                .map(|name| EntityKey::new(DIMENSION, name.as_str())),
        );
        let mut loaded = self.store.load(&keys).map_err(|err| match err {
            StoreError::EntityNotFound(key) => {
                ApiError::Unprocessable(format!("job references unknown {key}"))
            }
            other => other.into(),
        })?;
        let dimensions = loaded.split_off(1);
        let execution: Execution = parse_stored(EXECUTION, &job.execution, loaded.remove(0))?;

        let mut selected = Vec::with_capacity(dimensions.len());
        for ((name, value), dimension) in job.dimensions.iter().zip(dimensions) {
            let mut dimension: Dimension = parse_stored(DIMENSION, name, dimension)?;
            let params = dimension
                .values
                .swap_remove(value)
                .ok_or_else(|| {
                    ApiError::Unprocessable(format!("dimension {name} has no value {value}"))
                })?
                .params;
            selected.push((dimension.priority, name.as_str(), params));
        }
        selected.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut layers = Vec::with_capacity(selected.len() + 2);
        layers.push(ParamLayer::new("default", execution.default_params.clone()));
        layers.extend(
            selected
                .into_iter()
                .map(|(_, name, params)| ParamLayer::new(name, params)),
        );
        layers.push(ParamLayer::new(job.name.as_str(), job.params.clone()));

        let payload = self.renderer.render(&execution.payload_template, &layers)?;
        Ok((execution, payload))
    }

    fn driver(&self, name: &str) -> Result<Arc<dyn ExecutionDriver>, DriverError> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| DriverError::UnknownDriver(name.to_string()))
    }

    // -------------------------------------------------------------------
    // Runs
    // -------------------------------------------------------------------

    /// One page of runs, most recent first unless the request says
    /// otherwise. With `job_id`, only that job's runs; 404 if the job does
    /// not exist.
    pub fn list_runs(
        &mut self,
        job_id: Option<&str>,
        request: &PageRequest,
    ) -> Result<Page, ApiError> {
        request.resolve_range()?;
        match job_id {
            Some(job_id) => {
                self.store.load_one(JOB, job_id)?;
                Ok(self.store.find_page(RUN, Some((JOB, job_id)), request)?)
            }
            None => Ok(self.store.find_page(RUN, None, request)?),
        }
    }

    pub fn get_run(&mut self, id: &str) -> Result<Value, ApiError> {
        Ok(self.store.load_one(RUN, id)?)
    }

    /// Asks each distinct driver namespace for the runs of all jobs and
    /// upserts them. Returns the number of runs processed.
    pub fn refresh_runs(&mut self) -> Result<usize, ApiError> {
        let mut namespaces: IndexMap<(String, String), (Arc<dyn ExecutionDriver>, Value)> =
            IndexMap::new();
        for (id, execution) in self.store.find(&FindQuery::of_type(EXECUTION))? {
            let execution: Execution = parse_stored(EXECUTION, &id, execution)?;
            let driver = self.driver(&execution.driver)?;
            let identity = driver.namespace_identity(&execution.driver_config);
            namespaces.insert((execution.driver, identity), (driver, execution.driver_config));
        }

        let jobs = self.store.find(&FindQuery::of_type(JOB))?;
        let mut processed = 0;
        for ((driver_name, identity), (driver, config)) in &namespaces {
            let runs: Vec<Entity> = driver
                .fetch_runs(config, &jobs)?
                .into_iter()
                .map(|(run_id, mut run)| {
                    let execution = run
                        .get("job_id")
                        .and_then(Value::as_str)
                        .and_then(|job_id| jobs.get(job_id))
                        .and_then(|job| job.get("execution"))
                        .cloned();
                    if let (Some(execution), Some(fields)) = (execution, run.as_object_mut()) {
                        fields.insert("execution".to_string(), execution);
                    }
                    Entity::new(RUN, run_id, run)
                })
                .collect();
            self.store.upsert(&runs)?;
            debug!(driver = %driver_name, namespace = %identity, runs = runs.len(), "refreshed runs");
            processed += runs.len();
        }
        info!(processed, namespaces = namespaces.len(), "refreshed runs");
        Ok(processed)
    }

    // -------------------------------------------------------------------
    // State
    // -------------------------------------------------------------------

    pub fn dump_state(&mut self) -> Result<StateDump, ApiError> {
        Ok(StateDump {
            dimensions: self.store.find(&FindQuery::of_type(DIMENSION))?,
            executions: self.store.find(&FindQuery::of_type(EXECUTION))?,
        })
    }

    /// Replaces every type present in the body. Each type is replaced in
    /// its own transaction.
    pub fn load_state(&mut self, body: Value) -> Result<StateChanges, ApiError> {
        let state = StateRequest::parse(body)?;
        let mut changes = StateChanges::default();
        if let Some(dimensions) = &state.dimensions {
            changes.dimensions = Some(self.store.replace_type(DIMENSION, dimensions)?);
        }
        if let Some(executions) = &state.executions {
            changes.executions = Some(self.store.replace_type(EXECUTION, executions)?);
        }
        info!(?changes, "loaded state");
        Ok(changes)
    }
}

/// Reads a stored configuration entity into its typed shape.
fn parse_stored<T: DeserializeOwned>(typ: &str, id: &str, value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|err| ApiError::InternalError(format!("stored {typ}:{id} is malformed: {err}")))
}
