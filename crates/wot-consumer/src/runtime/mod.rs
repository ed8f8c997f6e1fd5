//! The seam between the consumer and the runtime which binds a Thing
//! Description to a transport.
//!
//! A runtime is started once, producing a [`ThingFactory`]. The factory
//! consumes Thing Descriptions into live [`ConsumedThing`] sessions, and every
//! operation on a session resolves to an [`InteractionOutput`].
//!
//! Transport selection (`HTTP`, `CoAP`, `MQTT` and so on) is entirely up to
//! the runtime.

use std::sync::Arc;

use async_trait::async_trait;

use serde_json::Value;

use wot_td::ThingDescription;

use crate::error::Result;

mod simulated;

pub use simulated::{Call, SimulatedRuntime};

/// A live device session.
pub type Session = Arc<dyn ConsumedThing>;

/// The output of an operation performed on a device.
#[async_trait]
pub trait InteractionOutput: Send + Sync {
    /// Resolves the concrete value carried by the output.
    ///
    /// A [`Value::Null`] means that the operation produced no value.
    async fn value(&self) -> Result<Value>;
}

/// An [`InteractionOutput`] whose value is already known.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyOutput(Value);

impl ReadyOutput {
    /// Creates a [`ReadyOutput`] carrying the given value.
    #[must_use]
    #[inline]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// Creates an empty [`ReadyOutput`].
    #[must_use]
    #[inline]
    pub const fn empty() -> Self {
        Self(Value::Null)
    }

    /// Boxes the output.
    #[must_use]
    #[inline]
    pub fn boxed(self) -> Box<dyn InteractionOutput> {
        Box::new(self)
    }
}

#[async_trait]
impl InteractionOutput for ReadyOutput {
    async fn value(&self) -> Result<Value> {
        Ok(self.0.clone())
    }
}

/// A device session obtained by consuming a Thing Description.
///
/// Every capability is keyed by the affordance name.
#[async_trait]
pub trait ConsumedThing: Send + Sync {
    /// Reads a property.
    async fn read_property(&self, name: &str) -> Result<Box<dyn InteractionOutput>>;

    /// Writes a property.
    async fn write_property(&self, name: &str, value: Value) -> Result<Box<dyn InteractionOutput>>;

    /// Observes a property.
    async fn observe_property(&self, name: &str) -> Result<Box<dyn InteractionOutput>>;

    /// Invokes an action, optionally with an input value.
    async fn invoke_action(
        &self,
        name: &str,
        input: Option<Value>,
    ) -> Result<Box<dyn InteractionOutput>>;

    /// Subscribes an event.
    async fn subscribe_event(&self, name: &str) -> Result<Box<dyn InteractionOutput>>;
}

/// A factory of device sessions.
#[async_trait]
pub trait ThingFactory: Send + Sync {
    /// Consumes a [`ThingDescription`] into a live [`Session`].
    async fn consume(&self, thing: &ThingDescription) -> Result<Session>;
}

/// A runtime able to bind Thing Descriptions to transports.
#[async_trait]
pub trait ThingRuntime: Send + Sync {
    /// Starts the runtime and returns its [`ThingFactory`].
    async fn start(&self) -> Result<Arc<dyn ThingFactory>>;
}
