//! Configuration state: dimensions and executions, dumped and loaded as a
//! whole.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use striv_store::ReplaceCounts;

use super::validation::{is_dimension_name, FieldError};

/// A dimension: a named axis of parameter overrides, e.g. `region`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Lower priorities are applied first, so higher ones win.
    pub priority: i64,
    #[serde(default)]
    pub values: IndexMap<String, DimensionValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionValue {
    #[serde(default)]
    pub params: IndexMap<String, Value>,
}

/// An execution: how jobs referencing it are rendered and installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Name of a registered execution driver.
    pub driver: String,
    #[serde(default)]
    pub driver_config: Value,
    #[serde(default)]
    pub default_params: IndexMap<String, Value>,
    pub payload_template: String,
}

/// Body of `POST /state`. Only the types present are replaced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<IndexMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executions: Option<IndexMap<String, Value>>,
}

impl StateRequest {
    /// Deserializes the body and checks every entity against its shape.
    pub fn parse(body: Value) -> Result<StateRequest, Vec<FieldError>> {
        let state: StateRequest =
            serde_json::from_value(body).map_err(|err| vec![FieldError::from_serde(&err)])?;
        let mut errors = Vec::new();
        if let Some(dimensions) = &state.dimensions {
            for name in dimensions.keys() {
                if !is_dimension_name(name) {
                    errors.push(FieldError::new(
                        format!("dimensions.{name}"),
                        "dimension names must match ^[a-z_][a-z0-9_]*$",
                    ));
                }
            }
            check_shapes::<Dimension>("dimensions", dimensions, &mut errors);
        }
        if let Some(executions) = &state.executions {
            check_shapes::<Execution>("executions", executions, &mut errors);
        }
        if errors.is_empty() {
            Ok(state)
        } else {
            Err(errors)
        }
    }
}

fn check_shapes<T: DeserializeOwned>(
    kind: &str,
    entities: &IndexMap<String, Value>,
    errors: &mut Vec<FieldError>,
) {
    for (id, entity) in entities {
        if let Err(err) = T::deserialize(entity) {
            errors.push(FieldError::new(format!("{kind}.{id}"), err.to_string()));
        }
    }
}

/// Body of `GET /state`; accepted as-is by `POST /state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDump {
    pub dimensions: IndexMap<String, Value>,
    pub executions: IndexMap<String, Value>,
}

/// Per-type change counts of a state load.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StateChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<ReplaceCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executions: Option<ReplaceCounts>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_state_parses() {
        let state = StateRequest::parse(json!({
            "dimensions": {"region": {"priority": 1, "values": {"eu": {"params": {"zone": "eu-1"}}}}},
        }))
        .unwrap();
        assert!(state.executions.is_none());
        assert_eq!(state.dimensions.unwrap().len(), 1);
    }

    #[test]
    fn malformed_entities_are_reported_by_id() {
        let errors = StateRequest::parse(json!({
            "dimensions": {"region": {"values": {}}},
            "executions": {"batch": {"driver": "noop"}},
        }))
        .unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["dimensions.region", "executions.batch"]);
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(StateRequest::parse(json!({"jobs": {}})).is_err());
    }
}
