//! Frozen component initialization parameters.
//!
//! The engine never interprets parameters: it freezes the value tree when a
//! component is added and forwards it to the component's init callback.

use crate::pipeline::error::{GraphError, GraphResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::rc::Rc;

/// Immutable, cheaply clonable parameter tree.
#[derive(Debug, Clone)]
pub struct Params(Rc<Value>);

impl Params {
    /// An empty map.
    pub fn empty() -> Self {
        Self(Rc::new(Value::Object(Default::default())))
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Entry of a map parameter tree.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        match &*self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Decode into a typed parameter struct.
    pub fn decode<T: DeserializeOwned>(&self) -> GraphResult<T> {
        let value = match &*self.0 {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        serde_json::from_value(value).map_err(|e| GraphError::Params(e.to_string()))
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        Self(Rc::new(value))
    }
}
