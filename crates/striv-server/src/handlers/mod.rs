//! HTTP handler modules for the striv API.
//!
//! Each sub-module implements thin handlers that parse requests, acquire the
//! service lock, delegate to [`StrivService`](crate::service::StrivService),
//! and return JSON responses. No business logic lives in handlers.

pub mod jobs;
pub mod runs;
pub mod state;
