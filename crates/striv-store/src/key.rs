//! Entity identity: [`EntityKey`] and the typed key derived from it.
//!
//! A typed key is `"{type}:{id}"`. The separator is reserved, so neither
//! component may contain it, which keeps the prefix match used by `find`
//! unambiguous.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;

/// Separator between the type and id components of a typed key.
pub const KEY_SEPARATOR: char = ':';

/// Maximum length, in characters, of every indexed string column.
pub const MAX_KEY_LEN: usize = 128;

/// Identifies one entity: a type tag plus an id unique within that type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub typ: String,
    pub id: String,
}

impl EntityKey {
    pub fn new(typ: impl Into<String>, id: impl Into<String>) -> Self {
        EntityKey {
            typ: typ.into(),
            id: id.into(),
        }
    }

    /// Returns the typed key, rejecting components the store cannot represent.
    pub fn typed_key(&self) -> Result<String, StoreError> {
        validate_type(&self.typ)?;
        validate_component(&self.id, "id")?;
        let typed = format!("{}{}{}", self.typ, KEY_SEPARATOR, self.id);
        check_len(&typed)?;
        Ok(typed)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.typ, KEY_SEPARATOR, self.id)
    }
}

impl<T: Into<String>, I: Into<String>> From<(T, I)> for EntityKey {
    fn from((typ, id): (T, I)) -> Self {
        EntityKey::new(typ, id)
    }
}

/// An entity to be written: its key plus an opaque JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub key: EntityKey,
    pub payload: Value,
}

impl Entity {
    pub fn new(typ: impl Into<String>, id: impl Into<String>, payload: Value) -> Self {
        Entity {
            key: EntityKey::new(typ, id),
            payload,
        }
    }
}

/// Validates a type tag on its own (used by `find` and `replace_type`).
pub(crate) fn validate_type(typ: &str) -> Result<(), StoreError> {
    validate_component(typ, "type")
}

/// The prefix every typed key of `typ` starts with.
pub(crate) fn type_prefix(typ: &str) -> String {
    format!("{}{}", typ, KEY_SEPARATOR)
}

/// Strips the `"{type}:"` prefix from a typed key read back from the backend.
pub(crate) fn strip_type<'a>(typed_key: &'a str, typ: &str) -> Result<&'a str, StoreError> {
    typed_key
        .strip_prefix(typ)
        .and_then(|rest| rest.strip_prefix(KEY_SEPARATOR))
        .ok_or_else(|| {
            StoreError::MalformedRow(format!("typed key {typed_key} is not of type {typ}"))
        })
}

/// Rejects values longer than the indexed column width.
pub(crate) fn check_len(value: &str) -> Result<(), StoreError> {
    if value.chars().count() > MAX_KEY_LEN {
        return Err(StoreError::invalid_key(
            value,
            format!("longer than {MAX_KEY_LEN} characters"),
        ));
    }
    Ok(())
}

fn validate_component(value: &str, what: &str) -> Result<(), StoreError> {
    if value.is_empty() {
        return Err(StoreError::invalid_key(value, format!("empty {what}")));
    }
    if value.contains(KEY_SEPARATOR) {
        return Err(StoreError::invalid_key(
            value,
            format!("{what} must not contain '{KEY_SEPARATOR}'"),
        ));
    }
    check_len(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_key_joins_components() {
        let key = EntityKey::new("job", "job-01");
        assert_eq!(key.typed_key().unwrap(), "job:job-01");
        assert_eq!(key.to_string(), "job:job-01");
    }

    #[test]
    fn separator_is_reserved_in_both_components() {
        assert!(matches!(
            EntityKey::new("jo:b", "1").typed_key(),
            Err(StoreError::InvalidKey { .. })
        ));
        assert!(matches!(
            EntityKey::new("job", "a:b").typed_key(),
            Err(StoreError::InvalidKey { .. })
        ));
    }

    #[test]
    fn empty_components_are_rejected() {
        assert!(EntityKey::new("", "x").typed_key().is_err());
        assert!(EntityKey::new("job", "").typed_key().is_err());
    }

    #[test]
    fn overlong_typed_key_is_rejected() {
        let id = "x".repeat(MAX_KEY_LEN);
        let err = EntityKey::new("job", id).typed_key().unwrap_err();
        assert!(err.is_caller_error());
    }

    #[test]
    fn strip_type_requires_matching_prefix() {
        assert_eq!(strip_type("job:abc", "job").unwrap(), "abc");
        assert!(strip_type("jobs:abc", "job").is_err());
    }
}
