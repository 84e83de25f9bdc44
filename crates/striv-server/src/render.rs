//! Payload rendering: turns a job's parameter layers into a backend payload.
//!
//! [`PayloadRenderer`] is the seam for a real templating engine. The shipped
//! [`LayeredRenderer`] performs only the layer merge: dotted parameter names
//! are expanded into nested objects, then layers are merged key-by-key at
//! the top level with later layers winning.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

/// One named layer of parameters, e.g. an execution's defaults or a
/// dimension value's overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamLayer {
    pub name: String,
    pub params: IndexMap<String, Value>,
}

impl ParamLayer {
    pub fn new(name: impl Into<String>, params: IndexMap<String, Value>) -> Self {
        ParamLayer {
            name: name.into(),
            params,
        }
    }
}

/// Rendering failures. Always caused by the job definition or state, never
/// by the server.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A parameter name has an empty path segment.
    #[error("layer {layer}: invalid parameter name {param:?}")]
    InvalidParam { layer: String, param: String },

    /// A parameter is both a value and a prefix of another parameter.
    #[error("layer {layer}: parameter {param:?} conflicts with a nested parameter")]
    Conflict { layer: String, param: String },

    /// The template itself could not be evaluated.
    #[error("template evaluation failed: {0}")]
    Template(String),
}

/// Evaluates a template against an ordered list of parameter layers.
pub trait PayloadRenderer: Send + Sync {
    fn render(&self, template: &str, layers: &[ParamLayer]) -> Result<Value, RenderError>;
}

/// Merges layers and returns `{"template": ..., "params": ...}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LayeredRenderer;

impl PayloadRenderer for LayeredRenderer {
    fn render(&self, template: &str, layers: &[ParamLayer]) -> Result<Value, RenderError> {
        let mut merged = Map::new();
        for layer in layers {
            for (key, value) in materialize(layer)? {
                merged.insert(key, value);
            }
        }
        Ok(json!({
            "template": template,
            "params": merged,
        }))
    }
}

/// Expands dotted names (`a.b.c`) into a nested object.
fn materialize(layer: &ParamLayer) -> Result<Map<String, Value>, RenderError> {
    let mut tree = Map::new();
    for (param, value) in &layer.params {
        let path: Vec<&str> = param.split('.').collect();
        if path.iter().any(|segment| segment.is_empty()) {
            return Err(RenderError::InvalidParam {
                layer: layer.name.clone(),
                param: param.clone(),
            });
        }
        insert_path(&mut tree, &path, value.clone()).map_err(|()| RenderError::Conflict {
            layer: layer.name.clone(),
            param: param.clone(),
        })?;
    }
    Ok(tree)
}

fn insert_path(tree: &mut Map<String, Value>, path: &[&str], value: Value) -> Result<(), ()> {
    match path {
        [] => Ok(()),
        [leaf] => match tree.get(*leaf) {
            Some(Value::Object(_)) => Err(()),
            _ => {
                tree.insert((*leaf).to_string(), value);
                Ok(())
            }
        },
        [head, rest @ ..] => {
            let child = tree
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            match child {
                Value::Object(map) => insert_path(map, rest, value),
                _ => Err(()),
            }
        }
    }
}
