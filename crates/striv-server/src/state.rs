//! Application state with a shared `StrivService` for concurrent access.
//!
//! [`AppState`] wraps the service in `Arc<tokio::sync::Mutex<>>` for use with
//! axum handlers. The store holds a single backend connection and is not
//! `Sync`, so every handler takes the lock for the duration of its store
//! calls.

use std::sync::Arc;

use striv_store::{StoreConfig, StoreError};

use crate::service::StrivService;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// The shared service (async Mutex, awaited without blocking the runtime).
    pub service: Arc<tokio::sync::Mutex<StrivService>>,
}

impl AppState {
    pub fn new(service: StrivService) -> Self {
        AppState {
            service: Arc::new(tokio::sync::Mutex::new(service)),
        }
    }

    /// Opens the configured store. Fails fast on any store error.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        Ok(Self::new(StrivService::open(config)?))
    }

    /// Creates state over an empty in-memory store (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(StrivService::in_memory()?))
    }
}
