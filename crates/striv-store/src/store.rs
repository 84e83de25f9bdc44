//! [`EntityStore`]: the typed entity store.
//!
//! Wraps one [`Backend`] and one [`TypeRegistry`]. Every write runs in a
//! single backend transaction, so readers never observe an entity row
//! without its matching relation rows.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::backend::{self, text, Backend};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::key::{check_len, strip_type, validate_type, Entity, EntityKey};
use crate::query::{find_statement, FindQuery};
use crate::registry::TypeRegistry;
use crate::statement;

/// Rows removed and inserted by [`EntityStore::replace_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ReplaceCounts {
    pub deleted: u64,
    pub inserted: u64,
}

/// One `find` result row.
pub(crate) struct FoundRow {
    pub(crate) id: String,
    pub(crate) payload: Value,
    pub(crate) sort_key: Option<String>,
}

/// An entity ready to be written: typed key, sort key, relations and
/// serialized payload, all validated.
struct PreparedEntity {
    typed_key: String,
    sort_key: Option<String>,
    relations: Vec<(String, String)>,
    payload: String,
}

/// Persistence for heterogeneous entity types over any supported backend.
pub struct EntityStore {
    backend: Box<dyn Backend>,
    registry: TypeRegistry,
}

impl EntityStore {
    /// Connects to the configured backend, provisions the schema and binds
    /// the registry. Intended to be called once at startup.
    pub fn open(config: &StoreConfig, registry: TypeRegistry) -> Result<Self, StoreError> {
        let backend = backend::connect(config)?;
        Ok(EntityStore { backend, registry })
    }

    /// Wraps an already connected backend, provisioning its schema.
    pub fn with_backend(
        mut backend: Box<dyn Backend>,
        registry: TypeRegistry,
    ) -> Result<Self, StoreError> {
        backend.ensure_schema()?;
        Ok(EntityStore { backend, registry })
    }

    /// An empty in-memory SQLite store.
    pub fn in_memory(registry: TypeRegistry) -> Result<Self, StoreError> {
        Self::open(&StoreConfig::sqlite_in_memory(), registry)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.dialect().name()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    // -------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------

    /// Loads entities in the order requested.
    ///
    /// All-or-nothing: if any key is absent, fails with
    /// [`StoreError::EntityNotFound`] naming the first absent key.
    pub fn load(&mut self, keys: &[EntityKey]) -> Result<Vec<Value>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let typed_keys = keys
            .iter()
            .map(EntityKey::typed_key)
            .collect::<Result<Vec<_>, _>>()?;
        let stmt = statement::select_by_keys(self.backend.dialect(), &typed_keys);
        let mut found: IndexMap<String, Value> = IndexMap::new();
        for row in self.backend.query(&stmt)? {
            let payload: Value = serde_json::from_str(text(&row, 1)?)?;
            found.insert(text(&row, 0)?.to_string(), payload);
        }
        typed_keys
            .iter()
            .map(|typed_key| {
                found
                    .get(typed_key)
                    .cloned()
                    .ok_or_else(|| StoreError::EntityNotFound(typed_key.clone()))
            })
            .collect()
    }

    /// Convenience for loading a single entity.
    pub fn load_one(&mut self, typ: &str, id: &str) -> Result<Value, StoreError> {
        let mut loaded = self.load(&[EntityKey::new(typ, id)])?;
        loaded
            .pop()
            .ok_or_else(|| StoreError::EntityNotFound(EntityKey::new(typ, id).to_string()))
    }

    /// Finds entities of one type. Keys of the returned map are bare ids, in
    /// result order.
    ///
    /// A ranged query only returns entities that have a sort key, even when
    /// both bounds are open; entities whose type registers no sort key (or
    /// whose payload lacks the field) are reachable only through unranged
    /// queries. Limits above `i64::MAX` are treated as `i64::MAX`.
    pub fn find(&mut self, query: &FindQuery) -> Result<IndexMap<String, Value>, StoreError> {
        Ok(self
            .find_rows(query)?
            .into_iter()
            .map(|row| (row.id, row.payload))
            .collect())
    }

    pub(crate) fn find_rows(&mut self, query: &FindQuery) -> Result<Vec<FoundRow>, StoreError> {
        validate_type(&query.typ)?;
        let stmt = find_statement(self.backend.dialect(), query);
        let rows = self.backend.query(&stmt)?;
        debug!(typ = %query.typ, rows = rows.len(), "find");
        rows.iter()
            .map(|row| -> Result<FoundRow, StoreError> {
                Ok(FoundRow {
                    id: strip_type(text(row, 0)?, &query.typ)?.to_string(),
                    payload: serde_json::from_str(text(row, 1)?)?,
                    sort_key: row.get(2).cloned().flatten(),
                })
            })
            .collect()
    }

    // -------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------

    /// Inserts or overwrites entities and rebuilds their relation rows.
    ///
    /// All entities are validated before anything is written; the writes
    /// themselves share one transaction.
    pub fn upsert(&mut self, entities: &[Entity]) -> Result<(), StoreError> {
        let prepared = entities
            .iter()
            .map(|e| self.prepare(&e.key.typ, &e.key.id, &e.payload))
            .collect::<Result<Vec<_>, _>>()?;
        let dialect = self.backend.dialect();
        let mut tx = self.backend.transaction()?;
        for entity in prepared {
            tx.execute(&statement::upsert_entity(
                dialect,
                &entity.typed_key,
                entity.sort_key,
                entity.payload,
            ))?;
            tx.execute(&statement::delete_relations(dialect, &entity.typed_key))?;
            for (relation, key) in &entity.relations {
                tx.execute(&statement::insert_relation(
                    dialect,
                    &entity.typed_key,
                    relation,
                    key,
                ))?;
            }
        }
        tx.commit()?;
        debug!(count = entities.len(), "upserted entities");
        Ok(())
    }

    /// Deletes entities and their relation rows.
    ///
    /// Fails with [`StoreError::EntityNotFound`] without deleting anything if
    /// any key is absent.
    pub fn delete(&mut self, keys: &[EntityKey]) -> Result<(), StoreError> {
        self.load(keys)?;
        let typed_keys = keys
            .iter()
            .map(EntityKey::typed_key)
            .collect::<Result<Vec<_>, _>>()?;
        let dialect = self.backend.dialect();
        let mut tx = self.backend.transaction()?;
        for typed_key in &typed_keys {
            tx.execute(&statement::delete_entity(dialect, typed_key))?;
            tx.execute(&statement::delete_relations(dialect, typed_key))?;
        }
        tx.commit()?;
        debug!(count = typed_keys.len(), "deleted entities");
        Ok(())
    }

    /// Replaces every entity of `typ` with `entities` (id -> payload).
    ///
    /// The type's relation rows are dropped with its entities and rebuilt
    /// from the registry for the replacements, so the relation index stays
    /// consistent. Runs in one transaction.
    pub fn replace_type(
        &mut self,
        typ: &str,
        entities: &IndexMap<String, Value>,
    ) -> Result<ReplaceCounts, StoreError> {
        validate_type(typ)?;
        let prepared = entities
            .iter()
            .map(|(id, payload)| self.prepare(typ, id, payload))
            .collect::<Result<Vec<_>, _>>()?;
        let dialect = self.backend.dialect();
        let mut tx = self.backend.transaction()?;
        tx.execute(&statement::delete_relations_of_type(dialect, typ))?;
        let deleted = tx.execute(&statement::delete_entities_of_type(dialect, typ))?;
        let mut inserted = 0;
        for entity in prepared {
            inserted += tx.execute(&statement::insert_entity(
                dialect,
                &entity.typed_key,
                entity.sort_key,
                entity.payload,
            ))?;
            for (relation, key) in &entity.relations {
                tx.execute(&statement::insert_relation(
                    dialect,
                    &entity.typed_key,
                    relation,
                    key,
                ))?;
            }
        }
        tx.commit()?;
        debug!(typ, deleted, inserted, "replaced type");
        Ok(ReplaceCounts { deleted, inserted })
    }

    fn prepare(&self, typ: &str, id: &str, payload: &Value) -> Result<PreparedEntity, StoreError> {
        let typed_key = EntityKey::new(typ, id).typed_key()?;
        let sort_key = self.registry.sort_key(typ, payload);
        if let Some(sort_key) = &sort_key {
            check_len(sort_key)?;
        }
        let relations = self.registry.relations(typ, payload);
        for (relation, key) in &relations {
            check_len(relation)?;
            check_len(key)?;
        }
        Ok(PreparedEntity {
            typed_key,
            sort_key,
            relations,
            payload: serde_json::to_string(payload)?,
        })
    }
}
