use std::str::FromStr;

use serde_json::Value;

use tracing::debug;

use wot_td::Category;

use crate::error::{Error, ErrorKind, Result};
use crate::runtime::ConsumedThing;

/// All [`OperationKind`]s.
pub const ALL_OPERATIONS: &[OperationKind] = &[
    OperationKind::ReadProperty,
    OperationKind::WriteProperty,
    OperationKind::ObserveProperty,
    OperationKind::InvokeAction,
    OperationKind::SubscribeEvent,
];

/// Operations which can be performed on an affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Reads a property.
    ReadProperty,
    /// Writes a property.
    WriteProperty,
    /// Observes a property.
    ObserveProperty,
    /// Invokes an action.
    InvokeAction,
    /// Subscribes an event.
    SubscribeEvent,
}

impl OperationKind {
    /// Returns the [`OperationKind`] name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ReadProperty => "readProperty",
            Self::WriteProperty => "writeProperty",
            Self::ObserveProperty => "observeProperty",
            Self::InvokeAction => "invokeAction",
            Self::SubscribeEvent => "subscribeEvent",
        }
    }

    /// Returns the affordance [`Category`] the operation targets.
    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::ReadProperty | Self::WriteProperty | Self::ObserveProperty => {
                Category::Properties
            }
            Self::InvokeAction => Category::Actions,
            Self::SubscribeEvent => Category::Events,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(operation: &str) -> std::result::Result<Self, Self::Err> {
        ALL_OPERATIONS
            .iter()
            .copied()
            .find(|kind| kind.name() == operation)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::UnknownOperationKind,
                    format!("`{operation}` is not an operation kind"),
                )
            })
    }
}

/// Performs an operation on an affordance of a device session and resolves
/// its output.
///
/// Input precedence for [`OperationKind::InvokeAction`]: the constant input
/// declared by the action, then the caller input, then no input at all.
/// Other operations ignore the constant input.
///
/// The return value is [`None`] when the operation produced no value.
///
/// # Errors
///
/// - [`ErrorKind::MissingInput`] when writing a property without an input
///   value. No device call is made in this case.
/// - Any error returned by the device runtime, either when invoking the
///   capability or when resolving its output.
pub async fn dispatch(
    session: &dyn ConsumedThing,
    operation: OperationKind,
    affordance: &str,
    input: Option<&Value>,
    const_input: Option<&Value>,
) -> Result<Option<Value>> {
    debug!("Dispatch `{operation}` on `{affordance}`");

    let output = match operation {
        OperationKind::ReadProperty => session.read_property(affordance).await?,
        OperationKind::WriteProperty => {
            let value = input.ok_or_else(|| {
                Error::new(
                    ErrorKind::MissingInput,
                    format!("Writing `{affordance}` requires an input value"),
                )
            })?;
            session.write_property(affordance, value.clone()).await?
        }
        OperationKind::ObserveProperty => session.observe_property(affordance).await?,
        OperationKind::InvokeAction => {
            session
                .invoke_action(affordance, const_input.or(input).cloned())
                .await?
        }
        OperationKind::SubscribeEvent => session.subscribe_event(affordance).await?,
    };

    let value = output.value().await?;
    Ok((!value.is_null()).then_some(value))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use wot_td::{Category, ThingDescription};

    use crate::error::ErrorKind;
    use crate::runtime::{SimulatedRuntime, ThingFactory};

    use super::{ALL_OPERATIONS, OperationKind, dispatch};

    fn fan() -> ThingDescription {
        ThingDescription::from_value(json!({
            "title": "Fan",
            "properties": {
                "speed": { "type": "integer", "default": 2 },
                "label": { "type": "string" },
            },
            "actions": {
                "spin": { "input": { "type": "integer", "const": 5 } },
                "stop": {},
            },
            "events": { "jammed": {} },
        }))
        .unwrap()
    }

    #[test]
    fn operation_kinds() {
        for operation in ALL_OPERATIONS {
            assert_eq!(operation.name().parse::<OperationKind>().unwrap(), *operation);
        }

        assert_eq!(OperationKind::WriteProperty.category(), Category::Properties);
        assert_eq!(OperationKind::InvokeAction.category(), Category::Actions);
        assert_eq!(OperationKind::SubscribeEvent.category(), Category::Events);

        let error = "deleteProperty".parse::<OperationKind>().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UnknownOperationKind);
    }

    #[tokio::test]
    async fn property_operations() {
        let runtime = SimulatedRuntime::new();
        let session = runtime.consume(&fan()).await.unwrap();

        let speed = dispatch(&*session, OperationKind::ReadProperty, "speed", None, None).await;
        assert_eq!(speed, Ok(Some(json!(2))));

        let written = dispatch(
            &*session,
            OperationKind::WriteProperty,
            "speed",
            Some(&json!(4)),
            None,
        )
        .await;
        assert_eq!(written, Ok(None));

        let speed = dispatch(&*session, OperationKind::ObserveProperty, "speed", None, None).await;
        assert_eq!(speed, Ok(Some(json!(4))));

        // A property without any value resolves to nothing.
        let label = dispatch(&*session, OperationKind::ReadProperty, "label", None, None).await;
        assert_eq!(label, Ok(None));
    }

    #[tokio::test]
    async fn write_without_input() {
        let runtime = SimulatedRuntime::new();
        let session = runtime.consume(&fan()).await.unwrap();

        let error = dispatch(&*session, OperationKind::WriteProperty, "speed", None, None)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MissingInput);

        // No device call has been made.
        assert!(runtime.calls().await.is_empty());
    }

    #[tokio::test]
    async fn action_input_precedence() {
        let runtime = SimulatedRuntime::new();
        let session = runtime.consume(&fan()).await.unwrap();

        let spin = dispatch(
            &*session,
            OperationKind::InvokeAction,
            "spin",
            Some(&json!(1)),
            Some(&json!(5)),
        )
        .await;
        assert_eq!(spin, Ok(Some(json!(5))));

        let stop = dispatch(&*session, OperationKind::InvokeAction, "stop", Some(&json!(1)), None).await;
        assert_eq!(stop, Ok(Some(json!(1))));

        let stop = dispatch(&*session, OperationKind::InvokeAction, "stop", None, None).await;
        assert_eq!(stop, Ok(None));

        let inputs: Vec<_> = runtime
            .calls()
            .await
            .into_iter()
            .map(|call| call.input)
            .collect();
        assert_eq!(inputs, vec![Some(json!(5)), Some(json!(1)), None]);
    }

    #[tokio::test]
    async fn runtime_failures() {
        let runtime = SimulatedRuntime::new();
        let session = runtime.consume(&fan()).await.unwrap();

        let error = dispatch(&*session, OperationKind::SubscribeEvent, "overheat", None, None)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Runtime);

        let jammed = dispatch(&*session, OperationKind::SubscribeEvent, "jammed", None, None).await;
        assert_eq!(jammed, Ok(None));
    }
}
