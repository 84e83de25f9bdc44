//! Typed entity store for striv.
//!
//! Persists heterogeneous entity types, each identified by `(type, id)` and
//! carrying an opaque JSON payload, in two tables that look the same on
//! every supported SQL engine. On top of that it offers a secondary relation
//! index, range-bounded ordered retrieval and stateless cursor pagination.
//!
//! # Architecture
//!
//! - **Backend adapters** own a connection, provision the schema and run
//!   statements. SQLite is always available; PostgreSQL and MySQL sit behind
//!   the `postgres` and `mysql` features.
//! - **Dialects** render the engine-specific bits of SQL text.
//! - **[`EntityStore`]** implements load, find, upsert, delete,
//!   replace_type and find_page over any backend, using a [`TypeRegistry`]
//!   to derive sort keys and relations from payloads.
//!
//! # Modules
//!
//! - [`backend`]: Backend/Transaction traits, the `connect` factory and adapters
//! - [`config`]: StoreConfig backend selection
//! - [`dialect`]: per-engine SQL text
//! - [`error`]: StoreError with all failure modes
//! - [`key`]: EntityKey, Entity and key validation
//! - [`pagination`]: page tokens and `find_page`
//! - [`query`]: FindQuery, Range and Order
//! - [`registry`]: per-type sort-key and relation extractors
//! - [`schema`]: provisioning DDL
//! - [`statement`]: parameterized statements
//! - [`store`]: EntityStore

pub mod backend;
pub mod config;
pub mod dialect;
pub mod error;
pub mod key;
pub mod pagination;
pub mod query;
pub mod registry;
pub mod schema;
pub mod statement;
pub mod store;

// Re-export key types for ergonomic use.
pub use config::StoreConfig;
pub use error::StoreError;
pub use key::{Entity, EntityKey, MAX_KEY_LEN};
pub use pagination::{Page, PageRequest, MAX_PAGE_SIZE};
pub use query::{FindQuery, Order, Range};
pub use registry::{FieldSortKey, RelationFn, SortKeyFn, TypeRegistry};
pub use store::{EntityStore, ReplaceCounts};
