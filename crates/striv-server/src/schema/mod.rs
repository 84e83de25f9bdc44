//! API schema types for request/response definitions.
//!
//! Each sub-module defines the request and response types for one API
//! domain. Requests that need field-level checks are validated here, before
//! any handler touches the store.

pub mod jobs;
pub mod runs;
pub mod state;
pub mod validation;
