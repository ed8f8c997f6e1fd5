use std::str::FromStr;

use async_trait::async_trait;

use serde_json::Value;

use tokio::sync::mpsc::{self, Receiver, Sender};

use tracing::{debug, error};

use crate::error::{Error, ErrorKind, Result};
use crate::message::{Contexts, Message};

/// Scopes which can receive a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputScope {
    /// The outgoing message.
    Msg,
    /// The flow context.
    Flow,
    /// The global context.
    Global,
}

impl OutputScope {
    /// Returns the [`OutputScope`] name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Msg => "msg",
            Self::Flow => "flow",
            Self::Global => "global",
        }
    }
}

impl std::fmt::Display for OutputScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputScope {
    type Err = Error;

    fn from_str(scope: &str) -> std::result::Result<Self, Self::Err> {
        match scope {
            "msg" => Ok(Self::Msg),
            "flow" => Ok(Self::Flow),
            "global" => Ok(Self::Global),
            _ => Err(Error::new(
                ErrorKind::InvalidOutputScope,
                format!("`{scope}` is not an output scope"),
            )),
        }
    }
}

/// Where a result is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    /// Dotted path of the variable receiving the result.
    pub var: String,
    /// Scope of the variable.
    pub scope: OutputScope,
    /// Whether the result is also copied onto the message payload.
    pub mirror_payload: bool,
}

impl OutputTarget {
    /// Creates an [`OutputTarget`] from a textual scope.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::InvalidOutputScope`] when the scope is not one of `msg`,
    /// `flow` and `global`.
    pub fn new(var: impl Into<String>, scope: &str, mirror_payload: bool) -> Result<Self> {
        Ok(Self {
            var: var.into(),
            scope: scope.parse()?,
            mirror_payload,
        })
    }
}

/// A diagnostic reported to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// The encountered error.
    pub error: Error,
    /// The message being processed when the error occurred.
    pub message: Message,
}

/// The outputs of a node of the host flow engine.
#[async_trait]
pub trait NodeOutput: Send + Sync {
    /// Emits a message on the node output.
    ///
    /// # Errors
    ///
    /// The message cannot be delivered to the host.
    async fn send(&self, message: Message) -> Result<()>;

    /// Reports an error on the diagnostic channel of the host.
    async fn error(&self, error: Error, message: &Message);
}

/// A [`NodeOutput`] backed by bounded asynchronous channels.
///
/// When a buffer is full, emitting waits until an element is consumed from
/// the channel.
#[derive(Debug, Clone)]
pub struct ChannelOutput {
    messages: Sender<Message>,
    diagnostics: Sender<Diagnostic>,
}

impl ChannelOutput {
    /// Creates a [`ChannelOutput`] along with the receivers of messages and
    /// diagnostics.
    ///
    /// The `buffer_size` parameter specifies how many elements each buffer
    /// can hold.
    #[must_use]
    pub fn new(buffer_size: usize) -> (Self, Receiver<Message>, Receiver<Diagnostic>) {
        let (messages, messages_rx) = mpsc::channel(buffer_size);
        let (diagnostics, diagnostics_rx) = mpsc::channel(buffer_size);
        (
            Self {
                messages,
                diagnostics,
            },
            messages_rx,
            diagnostics_rx,
        )
    }
}

#[async_trait]
impl NodeOutput for ChannelOutput {
    async fn send(&self, message: Message) -> Result<()> {
        self.messages.send(message).await.map_err(|e| {
            Error::new(
                ErrorKind::Output,
                format!("Unable to emit the message: {e}"),
            )
        })
    }

    async fn error(&self, error: Error, message: &Message) {
        let diagnostic = Diagnostic {
            error,
            message: message.clone(),
        };
        if let Err(e) = self.diagnostics.send(diagnostic).await {
            error!("Unable to report the error `{}`: receiver dropped", e.0.error);
        }
    }
}

/// Writes a result into its [`OutputTarget`], then emits the message.
///
/// An absent result writes nothing, but the message is emitted anyway.
///
/// # Errors
///
/// The message cannot be delivered to the host.
pub async fn route(
    result: Option<Value>,
    target: &OutputTarget,
    message: &mut Message,
    contexts: &Contexts,
    output: &dyn NodeOutput,
) -> Result<()> {
    if let Some(value) = result {
        let payload = target.mirror_payload.then(|| value.clone());

        match target.scope {
            OutputScope::Msg => message.set(&target.var, value),
            OutputScope::Flow => contexts.flow.set(&target.var, value).await,
            OutputScope::Global => contexts.global.set(&target.var, value).await,
        }

        if let Some(payload) = payload {
            message.set_payload(payload);
        }

        debug!("Result routed to `{}.{}`", target.scope, target.var);
    } else {
        debug!("No result to route");
    }

    output.send(message.clone()).await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::error::ErrorKind;
    use crate::message::{Contexts, Message};

    use super::{ChannelOutput, OutputScope, OutputTarget, route};

    #[test]
    fn output_scopes() {
        assert_eq!("msg".parse::<OutputScope>().unwrap(), OutputScope::Msg);
        assert_eq!("flow".parse::<OutputScope>().unwrap(), OutputScope::Flow);
        assert_eq!("global".parse::<OutputScope>().unwrap(), OutputScope::Global);

        let error = OutputTarget::new("payload", "env", false).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidOutputScope);
    }

    #[tokio::test]
    async fn route_to_message() {
        let (output, mut messages, _diagnostics) = ChannelOutput::new(4);
        let contexts = Contexts::default();
        let target = OutputTarget::new("reading.celsius", "msg", false).unwrap();

        let mut message = Message::with_payload(json!("trigger"));
        route(Some(json!(21.5)), &target, &mut message, &contexts, &output)
            .await
            .unwrap();

        let emitted = messages.recv().await.unwrap();
        assert_eq!(emitted.get("reading.celsius"), Some(&json!(21.5)));
        assert_eq!(emitted.payload(), Some(&json!("trigger")));
        assert!(contexts.flow.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn route_to_flow_and_payload() {
        let (output, mut messages, _diagnostics) = ChannelOutput::new(4);
        let contexts = Contexts::default();
        let target = OutputTarget::new("temperature", "flow", true).unwrap();

        let mut message = Message::new();
        route(Some(json!(19)), &target, &mut message, &contexts, &output)
            .await
            .unwrap();

        assert_eq!(contexts.flow.get("temperature").await, Some(json!(19)));
        assert!(contexts.global.snapshot().await.is_empty());
        assert_eq!(messages.recv().await.unwrap().payload(), Some(&json!(19)));
    }

    #[tokio::test]
    async fn route_to_global() {
        let (output, mut messages, _diagnostics) = ChannelOutput::new(4);
        let contexts = Contexts::default();
        let target = OutputTarget::new("lamp", "global", false).unwrap();

        let mut message = Message::with_payload(json!(1));
        route(Some(json!("on")), &target, &mut message, &contexts, &output)
            .await
            .unwrap();

        assert_eq!(contexts.global.get("lamp").await, Some(json!("on")));
        assert_eq!(messages.recv().await.unwrap(), Message::with_payload(json!(1)));
    }

    #[tokio::test]
    async fn absent_result_is_still_emitted() {
        let (output, mut messages, _diagnostics) = ChannelOutput::new(4);
        let contexts = Contexts::default();
        let target = OutputTarget::new("payload", "msg", true).unwrap();

        let mut message = Message::with_payload(json!("unchanged"));
        route(None, &target, &mut message, &contexts, &output)
            .await
            .unwrap();

        assert_eq!(
            messages.recv().await.unwrap(),
            Message::with_payload(json!("unchanged"))
        );
    }

    #[tokio::test]
    async fn closed_output() {
        let (output, messages, _diagnostics) = ChannelOutput::new(1);
        drop(messages);

        let target = OutputTarget::new("payload", "msg", false).unwrap();
        let error = route(
            Some(json!(1)),
            &target,
            &mut Message::new(),
            &Contexts::default(),
            &output,
        )
        .await
        .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Output);
    }
}
