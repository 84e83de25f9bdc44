//! HTTP/JSON control plane for striv.
//!
//! Jobs, runs and configuration state are persisted through the
//! `striv-store` entity store. Jobs are rendered by a [`render::PayloadRenderer`]
//! and installed through named [`driver::ExecutionDriver`]s. This crate
//! contains the service, API schema types, error handling and routes.

pub mod driver;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod render;
pub mod router;
pub mod schema;
pub mod service;
pub mod state;
