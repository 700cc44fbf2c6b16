use crate::element::{classify_json, DatabaseElement};
use std::fmt;
use std::sync::Arc;

/// Uniform read access to one already-fetched record of any backend
///
/// Implementations wrap the backend's native record type and must not
/// perform I/O. `names()` has no cross-backend ordering guarantee, but
/// repeated calls on the same instance return the same order.
pub trait ObjectWrapper: Send + Sync + fmt::Debug {
    /// Field names of the record
    fn names(&self) -> Vec<String>;

    /// Classified value of a field, `None` when the field is absent
    fn get(&self, name: &str) -> Option<DatabaseElement>;
}

/// Shared handle to a wrapped record
pub type Record = Arc<dyn ObjectWrapper>;

/// Wrapper over a JSON object (Elasticsearch hits, Couchbase rows)
#[derive(Debug, Clone)]
pub struct JsonObjectWrapper {
    object: serde_json::Map<String, serde_json::Value>,
}

impl JsonObjectWrapper {
    pub fn new(object: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { object }
    }

    /// Wrap any JSON value. Non-objects are exposed under `unnamed_field`.
    pub fn from_value(value: serde_json::Value, unnamed_field: &str) -> Self {
        match value {
            serde_json::Value::Object(object) => Self { object },
            other => {
                let mut object = serde_json::Map::new();
                object.insert(unnamed_field.to_string(), other);
                Self { object }
            }
        }
    }

    pub fn into_record(self) -> Record {
        Arc::new(self)
    }

    pub fn as_json(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.object
    }
}

impl ObjectWrapper for JsonObjectWrapper {
    fn names(&self) -> Vec<String> {
        self.object.keys().cloned().collect()
    }

    fn get(&self, name: &str) -> Option<DatabaseElement> {
        self.object.get(name).map(classify_json)
    }
}
