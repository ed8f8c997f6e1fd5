use std::sync::Arc;

use serde::{Deserialize, Serialize};

use serde_json::{Map, Value};

use tokio::sync::RwLock;

/// The name of the primary payload field of a [`Message`].
pub const PAYLOAD: &str = "payload";

fn get_path<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = map.get(segments.next()?)?;
    segments.try_fold(first, |value, segment| value.get(segment))
}

// Intermediate segments which are not objects are replaced by objects.
fn set_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = map;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            let _previous = current.insert(segment.to_owned(), value);
            return;
        }

        let next = current
            .entry(segment)
            .or_insert_with(|| Value::Object(Map::new()));
        if !next.is_object() {
            *next = Value::Object(Map::new());
        }
        let Value::Object(next) = next else {
            return;
        };
        current = next;
    }
}

/// A message flowing through the host flow engine.
///
/// A message is a `JSON` object whose primary field is [`PAYLOAD`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Map<String, Value>);

impl Message {
    /// Creates an empty [`Message`].
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Creates a [`Message`] carrying the given payload.
    #[must_use]
    #[inline]
    pub fn with_payload(payload: Value) -> Self {
        let mut message = Self::new();
        message.set_payload(payload);
        message
    }

    /// Builds a [`Message`] from a `JSON` object.
    ///
    /// The return value is [`None`] when the value is not an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Returns the primary payload.
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.0.get(PAYLOAD)
    }

    /// Sets the primary payload.
    pub fn set_payload(&mut self, payload: Value) {
        let _previous = self.0.insert(PAYLOAD.into(), payload);
    }

    /// Returns the value at the given dotted path, such as `data.level`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        get_path(&self.0, path)
    }

    /// Returns the string value at the given dotted path.
    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Sets the value at the given dotted path, creating all missing
    /// intermediate objects.
    pub fn set(&mut self, path: &str, value: Value) {
        set_path(&mut self.0, path, value);
    }

    /// Returns the raw message fields.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Converts the [`Message`] into a `JSON` value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// A shared key-value store, such as the flow or the global context of the
/// host flow engine.
///
/// Cloning a [`Context`] produces a new handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct Context(Arc<RwLock<Map<String, Value>>>);

impl Context {
    /// Creates an empty [`Context`].
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the value at the given dotted path.
    pub async fn get(&self, path: &str) -> Option<Value> {
        get_path(&*self.0.read().await, path).cloned()
    }

    /// Sets the value at the given dotted path.
    pub async fn set(&self, path: &str, value: Value) {
        set_path(&mut *self.0.write().await, path, value);
    }

    /// Returns a copy of the whole store.
    pub async fn snapshot(&self) -> Map<String, Value> {
        self.0.read().await.clone()
    }
}

/// The shared stores reachable by a consumer.
#[derive(Debug, Clone, Default)]
pub struct Contexts {
    /// State shared among the nodes of the same flow.
    pub flow: Context,
    /// State shared among all flows of the process.
    pub global: Context,
}

impl Contexts {
    /// Creates [`Contexts`] from a flow and a global [`Context`].
    #[must_use]
    #[inline]
    pub const fn new(flow: Context, global: Context) -> Self {
        Self { flow, global }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Context, Message};

    #[test]
    fn dotted_paths() {
        let mut message = Message::with_payload(json!(1));

        message.set("data.level", json!(3));
        message.set("data.unit", json!("lx"));
        assert_eq!(message.get("data"), Some(&json!({ "level": 3, "unit": "lx" })));
        assert_eq!(message.get("data.level"), Some(&json!(3)));
        assert_eq!(message.get("data.level.missing"), None);
        assert_eq!(message.get("missing"), None);

        // A scalar on the path becomes an object.
        message.set("payload.value", json!(true));
        assert_eq!(message.payload(), Some(&json!({ "value": true })));
    }

    #[test]
    fn message_from_value() {
        let message = Message::from_value(json!({ "topic": "lamp", "payload": 5 })).unwrap();
        assert_eq!(message.get_str("topic"), Some("lamp"));
        assert_eq!(message.payload(), Some(&json!(5)));

        assert!(Message::from_value(json!([1, 2])).is_none());
    }

    #[tokio::test]
    async fn shared_context() {
        let context = Context::new();
        let handle = context.clone();

        handle.set("lamp.status", json!("on")).await;
        assert_eq!(context.get("lamp.status").await, Some(json!("on")));
        assert_eq!(context.snapshot().await.len(), 1);
    }
}
