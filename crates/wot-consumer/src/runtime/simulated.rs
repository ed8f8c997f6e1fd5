use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use serde_json::{Map, Value};

use tokio::sync::Mutex;

use tracing::debug;

use wot_td::{Category, ThingDescription};

use crate::dispatcher::OperationKind;
use crate::error::{Error, Result};

use super::{ConsumedThing, InteractionOutput, ReadyOutput, Session, ThingFactory, ThingRuntime};

// Identity given to things without any identity member.
const ANONYMOUS: &str = "anonymous";

/// A capability call received by a simulated device.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Identity of the device.
    pub thing: String,
    /// Operation kind.
    pub operation: OperationKind,
    /// Affordance name.
    pub affordance: String,
    /// Input value, if any.
    pub input: Option<Value>,
}

#[derive(Debug, Default)]
struct Shared {
    consumed: AtomicUsize,
    offline: AtomicBool,
    calls: Mutex<Vec<Call>>,
}

/// An in-memory runtime which simulates devices.
///
/// A simulated device:
///
/// - Holds a value for each property, initialized from a seeded value or,
///   when missing, from the `const` or `default` member of the property
/// - Updates the value of a property on write
/// - Returns the input of an action as its output
/// - Returns the seeded data of an event on subscription
/// - Rejects every call on an affordance marked as failing
///
/// All devices produced by the same runtime, and all clones of the runtime,
/// share the same call log.
#[derive(Debug, Clone, Default)]
pub struct SimulatedRuntime {
    properties: Map<String, Value>,
    events: Map<String, Value>,
    failing: Vec<String>,
    shared: Arc<Shared>,
}

impl SimulatedRuntime {
    /// Creates a [`SimulatedRuntime`].
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the initial value of all properties with the given name.
    #[must_use]
    #[inline]
    pub fn property(mut self, name: impl Into<String>, value: Value) -> Self {
        let _previous = self.properties.insert(name.into(), value);
        self
    }

    /// Seeds the data of all events with the given name.
    #[must_use]
    #[inline]
    pub fn event(mut self, name: impl Into<String>, data: Value) -> Self {
        let _previous = self.events.insert(name.into(), data);
        self
    }

    /// Makes every call on the affordances with the given name fail.
    #[must_use]
    #[inline]
    pub fn failing(mut self, name: impl Into<String>) -> Self {
        self.failing.push(name.into());
        self
    }

    /// Makes every subsequent consumption fail, or succeed again.
    #[inline]
    pub fn set_offline(&self, offline: bool) {
        self.shared.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns the number of successful consumptions.
    #[must_use]
    #[inline]
    pub fn consumed(&self) -> usize {
        self.shared.consumed.load(Ordering::SeqCst)
    }

    /// Returns all the calls received so far, in arrival order.
    pub async fn calls(&self) -> Vec<Call> {
        self.shared.calls.lock().await.clone()
    }
}

#[async_trait]
impl ThingRuntime for SimulatedRuntime {
    async fn start(&self) -> Result<Arc<dyn ThingFactory>> {
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl ThingFactory for SimulatedRuntime {
    async fn consume(&self, thing: &ThingDescription) -> Result<Session> {
        let identity = thing.identity().unwrap_or(ANONYMOUS).to_owned();

        if self.shared.offline.load(Ordering::SeqCst) {
            return Err(Error::runtime(format!("Device `{identity}` is unreachable")));
        }

        let properties = thing
            .affordances(Category::Properties)
            .map(|property| {
                let value = self
                    .properties
                    .get(property.name())
                    .or_else(|| property.default_value())
                    .cloned()
                    .unwrap_or(Value::Null);
                (property.name().to_owned(), value)
            })
            .collect();

        let actions = thing
            .affordances(Category::Actions)
            .map(|action| action.name().to_owned())
            .collect();

        let events = thing
            .affordances(Category::Events)
            .map(|event| {
                let data = self.events.get(event.name()).cloned().unwrap_or(Value::Null);
                (event.name().to_owned(), data)
            })
            .collect();

        let _count = self.shared.consumed.fetch_add(1, Ordering::SeqCst);
        debug!("Simulated device `{identity}` consumed");

        Ok(Arc::new(SimulatedThing {
            identity,
            properties: Mutex::new(properties),
            actions,
            events,
            failing: self.failing.clone(),
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct SimulatedThing {
    identity: String,
    properties: Mutex<Map<String, Value>>,
    actions: Vec<String>,
    events: Map<String, Value>,
    failing: Vec<String>,
    shared: Arc<Shared>,
}

impl SimulatedThing {
    async fn record(
        &self,
        operation: OperationKind,
        affordance: &str,
        input: Option<Value>,
    ) -> Result<()> {
        self.shared.calls.lock().await.push(Call {
            thing: self.identity.clone(),
            operation,
            affordance: affordance.to_owned(),
            input,
        });

        if self.failing.iter().any(|name| name == affordance) {
            return Err(Error::runtime(format!(
                "Device `{}` rejected `{operation}` on `{affordance}`",
                self.identity
            )));
        }
        Ok(())
    }

    fn not_found(&self, category: Category, name: &str) -> Error {
        Error::runtime(format!(
            "No {category} named `{name}` on device `{}`",
            self.identity
        ))
    }

    async fn current(&self, name: &str) -> Result<Box<dyn InteractionOutput>> {
        self.properties
            .lock()
            .await
            .get(name)
            .cloned()
            .map(|value| ReadyOutput::new(value).boxed())
            .ok_or_else(|| self.not_found(Category::Properties, name))
    }
}

#[async_trait]
impl ConsumedThing for SimulatedThing {
    async fn read_property(&self, name: &str) -> Result<Box<dyn InteractionOutput>> {
        self.record(OperationKind::ReadProperty, name, None).await?;
        self.current(name).await
    }

    async fn write_property(&self, name: &str, value: Value) -> Result<Box<dyn InteractionOutput>> {
        self.record(OperationKind::WriteProperty, name, Some(value.clone()))
            .await?;

        let mut properties = self.properties.lock().await;
        let property = properties
            .get_mut(name)
            .ok_or_else(|| self.not_found(Category::Properties, name))?;
        *property = value;

        Ok(ReadyOutput::empty().boxed())
    }

    async fn observe_property(&self, name: &str) -> Result<Box<dyn InteractionOutput>> {
        self.record(OperationKind::ObserveProperty, name, None).await?;
        self.current(name).await
    }

    async fn invoke_action(
        &self,
        name: &str,
        input: Option<Value>,
    ) -> Result<Box<dyn InteractionOutput>> {
        self.record(OperationKind::InvokeAction, name, input.clone())
            .await?;

        if !self.actions.iter().any(|action| action == name) {
            return Err(self.not_found(Category::Actions, name));
        }

        Ok(ReadyOutput::new(input.unwrap_or(Value::Null)).boxed())
    }

    async fn subscribe_event(&self, name: &str) -> Result<Box<dyn InteractionOutput>> {
        self.record(OperationKind::SubscribeEvent, name, None).await?;

        self.events
            .get(name)
            .cloned()
            .map(|data| ReadyOutput::new(data).boxed())
            .ok_or_else(|| self.not_found(Category::Events, name))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use wot_td::ThingDescription;

    use crate::dispatcher::OperationKind;
    use crate::error::ErrorKind;
    use crate::runtime::{ThingFactory, ThingRuntime};

    use super::{Call, SimulatedRuntime};

    fn thermostat() -> ThingDescription {
        ThingDescription::from_value(json!({
            "id": "urn:dev:thermostat",
            "properties": {
                "target": { "type": "number", "default": 20.0 },
                "mode": { "type": "string" },
            },
            "actions": { "boost": {} },
            "events": { "overheat": {} },
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn simulated_device() {
        let runtime = SimulatedRuntime::new()
            .property("mode", json!("eco"))
            .event("overheat", json!({ "celsius": 31 }));
        let factory = runtime.start().await.unwrap();
        let thing = factory.consume(&thermostat()).await.unwrap();

        assert_eq!(runtime.consumed(), 1);

        let target = thing.read_property("target").await.unwrap();
        assert_eq!(target.value().await.unwrap(), json!(20.0));

        let mode = thing.observe_property("mode").await.unwrap();
        assert_eq!(mode.value().await.unwrap(), json!("eco"));

        let written = thing.write_property("target", json!(22.5)).await.unwrap();
        assert_eq!(written.value().await.unwrap(), json!(null));
        let target = thing.read_property("target").await.unwrap();
        assert_eq!(target.value().await.unwrap(), json!(22.5));

        let boost = thing.invoke_action("boost", Some(json!(10))).await.unwrap();
        assert_eq!(boost.value().await.unwrap(), json!(10));

        let overheat = thing.subscribe_event("overheat").await.unwrap();
        assert_eq!(overheat.value().await.unwrap(), json!({ "celsius": 31 }));

        assert_eq!(runtime.calls().await.len(), 6);
        assert_eq!(
            runtime.calls().await[3],
            Call {
                thing: "urn:dev:thermostat".into(),
                operation: OperationKind::WriteProperty,
                affordance: "target".into(),
                input: Some(json!(22.5)),
            }
        );
    }

    #[tokio::test]
    async fn unknown_affordances() {
        let runtime = SimulatedRuntime::new();
        let thing = runtime.consume(&thermostat()).await.unwrap();

        let Err(error) = thing.read_property("humidity").await else {
            panic!("`humidity` is not a property");
        };
        assert_eq!(error.kind(), ErrorKind::Runtime);

        assert!(thing.invoke_action("target", None).await.is_err());
        assert!(thing.subscribe_event("boost").await.is_err());
        assert!(thing.write_property("boost", json!(1)).await.is_err());
    }

    #[tokio::test]
    async fn failing_affordances() {
        let runtime = SimulatedRuntime::new().failing("boost");
        let thing = runtime.consume(&thermostat()).await.unwrap();

        let Err(error) = thing.invoke_action("boost", None).await else {
            panic!("`boost` is failing");
        };
        assert_eq!(error.kind(), ErrorKind::Runtime);
        assert!(thing.read_property("target").await.is_ok());

        // Rejected calls are logged too.
        assert_eq!(runtime.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn offline_device() {
        let runtime = SimulatedRuntime::new();
        runtime.set_offline(true);

        let Err(error) = runtime.consume(&thermostat()).await else {
            panic!("The device is offline");
        };
        assert_eq!(error.kind(), ErrorKind::Runtime);
        assert_eq!(runtime.consumed(), 0);

        runtime.set_offline(false);
        assert!(runtime.consume(&thermostat()).await.is_ok());
        assert_eq!(runtime.consumed(), 1);
    }
}
