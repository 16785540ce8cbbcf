//! Inbound event records
//!
//! Events are opaque, externally defined records. The runtime only ever reads
//! the `type` field to decide which handlers run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Named arguments bound to a handler at registration time
pub type BoundArgs = Map<String, Value>;

/// Field read to route an event to its handlers
pub const TYPE_FIELD: &str = "type";

/// A single event returned by a transport poll
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(Map<String, Value>);

impl Event {
    /// Create an event carrying only a `type` field
    pub fn new<S: Into<String>>(event_type: S) -> Self {
        let mut fields = Map::new();
        fields.insert(TYPE_FIELD.to_string(), Value::String(event_type.into()));
        Self(fields)
    }

    /// Add a field, builder style
    pub fn with<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Routing type of the event
    ///
    /// `Some("")` when the field is absent. `None` when it is present but not
    /// a string: such an event matches no typed registration, not even one
    /// for `""`, and only reaches wildcard handlers.
    pub fn event_type(&self) -> Option<&str> {
        match self.0.get(TYPE_FIELD) {
            None => Some(""),
            Some(Value::String(event_type)) => Some(event_type.as_str()),
            Some(_) => None,
        }
    }

    /// Printable form of the `type` field, for logs and errors
    pub fn type_label(&self) -> String {
        match self.0.get(TYPE_FIELD) {
            Some(Value::String(event_type)) => event_type.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Convenience accessor for string fields such as `channel` or `text`
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Event {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl TryFrom<Value> for Event {
    type Error = Value;

    /// Only JSON objects are events; anything else is handed back
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(other),
        }
    }
}
