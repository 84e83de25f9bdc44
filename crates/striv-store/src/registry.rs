//! Per-type sort-key and relation extractors.
//!
//! A [`TypeRegistry`] is handed to the store once at construction. Types
//! without a registered [`SortKeyFn`] store no sort key; types without a
//! registered [`RelationFn`] have no rows in the relation index.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

/// Derives the sort key of an entity from its payload.
pub trait SortKeyFn: Send + Sync {
    fn sort_key(&self, payload: &Value) -> Option<String>;
}

/// Derives the `(relation_name, relation_key)` pairs of an entity.
pub trait RelationFn: Send + Sync {
    fn relations(&self, payload: &Value) -> Vec<(String, String)>;
}

impl<F> SortKeyFn for F
where
    F: Fn(&Value) -> Option<String> + Send + Sync,
{
    fn sort_key(&self, payload: &Value) -> Option<String> {
        self(payload)
    }
}

impl<F> RelationFn for F
where
    F: Fn(&Value) -> Vec<(String, String)> + Send + Sync,
{
    fn relations(&self, payload: &Value) -> Vec<(String, String)> {
        self(payload)
    }
}

/// Sort key read from a string field addressed by a JSON pointer
/// (e.g. `/name` or `/meta/created_at`). Non-string values yield no key.
#[derive(Debug, Clone)]
pub struct FieldSortKey {
    pointer: String,
}

impl FieldSortKey {
    pub fn new(pointer: impl Into<String>) -> Self {
        FieldSortKey {
            pointer: pointer.into(),
        }
    }
}

impl SortKeyFn for FieldSortKey {
    fn sort_key(&self, payload: &Value) -> Option<String> {
        payload
            .pointer(&self.pointer)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }
}

/// Mapping from type tag to its extractors.
#[derive(Default)]
pub struct TypeRegistry {
    sort_keys: HashMap<String, Box<dyn SortKeyFn>>,
    relations: HashMap<String, Box<dyn RelationFn>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the sort-key extractor for `typ`, replacing any previous one.
    pub fn with_sort_key(mut self, typ: impl Into<String>, f: impl SortKeyFn + 'static) -> Self {
        self.sort_keys.insert(typ.into(), Box::new(f));
        self
    }

    /// Registers the relation extractor for `typ`, replacing any previous one.
    pub fn with_relations(
        mut self,
        typ: impl Into<String>,
        f: impl RelationFn + 'static,
    ) -> Self {
        self.relations.insert(typ.into(), Box::new(f));
        self
    }

    pub fn sort_key(&self, typ: &str, payload: &Value) -> Option<String> {
        self.sort_keys.get(typ).and_then(|f| f.sort_key(payload))
    }

    pub fn relations(&self, typ: &str, payload: &Value) -> Vec<(String, String)> {
        self.relations
            .get(typ)
            .map(|f| f.relations(payload))
            .unwrap_or_default()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sort_keys: Vec<_> = self.sort_keys.keys().collect();
        sort_keys.sort();
        let mut relations: Vec<_> = self.relations.keys().collect();
        relations.sort();
        f.debug_struct("TypeRegistry")
            .field("sort_keys", &sort_keys)
            .field("relations", &relations)
            .finish()
    }
}
