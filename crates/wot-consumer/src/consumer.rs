use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use tracing::{debug, error, info, warn};

use wot_td::{Category, ThingDescription};

use crate::cache::{SessionCache, minutes};
use crate::config::{ConsumerConfig, InputSource};
use crate::dispatcher::{OperationKind, dispatch};
use crate::error::{Error, ErrorKind, Result};
use crate::message::{Contexts, Message};
use crate::router::{NodeOutput, OutputTarget, route};
use crate::runtime::{Session, ThingFactory, ThingRuntime};
use crate::selector::{AffordanceFilter, select_affordances};

/// A cache of device sessions.
pub type Sessions = SessionCache<Session>;

/// The outcome of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// All selected affordances have been dispatched.
    Done {
        /// Number of results routed and emitted.
        routed: usize,
        /// Number of affordances whose operation failed.
        failed: usize,
    },
    /// No affordance matched the filter, so nothing has been done.
    Dropped,
    /// The request failed before or while acquiring the device session.
    Errored(Error),
}

// A request whose fields have been merged with the configuration defaults
// and validated.
struct Request {
    operation: OperationKind,
    filter: AffordanceFilter,
    input: Option<Value>,
    target: OutputTarget,
    ttl: Duration,
    thing: ThingDescription,
    identity: String,
}

fn text_field<'a>(message: &'a Message, name: &str, default: &'a str) -> &'a str {
    match message.get(name) {
        Some(Value::String(value)) => value.as_str(),
        Some(value) if !value.is_null() => {
            warn!("Ignore the `{name}` field: not a string");
            default
        }
        _ => default,
    }
}

fn flag_field(message: &Message, name: &str, default: bool) -> bool {
    match message.get(name) {
        Some(Value::Bool(value)) => *value,
        Some(value) if !value.is_null() => {
            warn!("Ignore the `{name}` field: not a boolean");
            default
        }
        _ => default,
    }
}

fn minutes_field(message: &Message, name: &str, default: u64) -> u64 {
    match message.get(name) {
        Some(value) if value.is_null() => default,
        Some(value) => value.as_u64().unwrap_or_else(|| {
            warn!("Ignore the `{name}` field: not a non-negative integer");
            default
        }),
        None => default,
    }
}

/// A consumer of Web of Things devices.
///
/// For each incoming message, a consumer:
///
/// 1. Merges the message fields with its configuration defaults and
///    validates them
/// 2. Selects the affordances of the Thing Description the operation targets
/// 3. Retrieves the device session from its cache, consuming the Thing
///    Description when no live session exists
/// 4. Performs the operation on each selected affordance, one after the
///    other, routing and emitting each result before the next operation
///    starts
///
/// Configuration errors and session failures end the request and are
/// reported once on the diagnostic channel. A failed operation on an
/// affordance is reported too, but it does not prevent the operations on the
/// remaining affordances.
pub struct ThingConsumer {
    factory: Arc<dyn ThingFactory>,
    sessions: Sessions,
    config: ConsumerConfig,
    contexts: Contexts,
    output: Arc<dyn NodeOutput>,
}

impl ThingConsumer {
    /// Starts a [`ThingRuntime`] and creates a [`ThingConsumer`] on top of
    /// its factory.
    ///
    /// # Errors
    ///
    /// The runtime fails to start.
    pub async fn start(
        runtime: &dyn ThingRuntime,
        config: ConsumerConfig,
        output: Arc<dyn NodeOutput>,
    ) -> Result<Self> {
        let factory = runtime.start().await?;
        info!("Thing runtime started");
        Ok(Self::new(factory, config, output))
    }

    /// Creates a [`ThingConsumer`] from a [`ThingFactory`].
    ///
    /// The consumer owns a private session cache and private contexts.
    #[must_use]
    #[inline]
    pub fn new(
        factory: Arc<dyn ThingFactory>,
        config: ConsumerConfig,
        output: Arc<dyn NodeOutput>,
    ) -> Self {
        Self {
            factory,
            sessions: Sessions::new(),
            config,
            contexts: Contexts::default(),
            output,
        }
    }

    /// Defines the session cache while constructing a [`ThingConsumer`].
    ///
    /// Consumers constructed with clones of the same cache share their
    /// device sessions.
    #[must_use]
    #[inline]
    pub fn sessions(mut self, sessions: Sessions) -> Self {
        self.sessions = sessions;
        self
    }

    /// Defines the flow and global contexts while constructing a
    /// [`ThingConsumer`].
    #[must_use]
    #[inline]
    pub fn contexts(mut self, contexts: Contexts) -> Self {
        self.contexts = contexts;
        self
    }

    /// Returns the [`ConsumerConfig`].
    #[must_use]
    pub const fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Returns the session cache.
    #[must_use]
    pub const fn session_cache(&self) -> &Sessions {
        &self.sessions
    }

    /// Handles an incoming message.
    ///
    /// Failures never escape this method: they are reported on the
    /// diagnostic channel and described by the returned [`RequestOutcome`].
    pub async fn handle(&self, mut message: Message) -> RequestOutcome {
        match self.process(&mut message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Request failed: {e}");
                self.output.error(e.clone(), &message).await;
                RequestOutcome::Errored(e)
            }
        }
    }

    /// Shuts down the [`ThingConsumer`], releasing all cached sessions and
    /// stopping their expiration timers.
    ///
    /// # Note
    ///
    /// A shared session cache is released for all the consumers using it.
    pub async fn shutdown(self) {
        self.sessions.shutdown().await;
    }

    async fn process(&self, message: &mut Message) -> Result<RequestOutcome> {
        let request = self.validate(message).await?;

        let affordances = select_affordances(&request.thing, request.operation, &request.filter);
        if affordances.is_empty() {
            debug!(
                "Drop `{}` request for `{}`: no matching {}",
                request.operation,
                request.identity,
                request.operation.category()
            );
            return Ok(RequestOutcome::Dropped);
        }

        let session = self
            .sessions
            .get_or_create(&request.identity, request.ttl, || {
                self.factory.consume(&request.thing)
            })
            .await
            .map_err(|e| {
                Error::new(
                    ErrorKind::Session,
                    format!("Unable to consume `{}`: {e}", request.identity),
                )
            })?;

        let mut routed = 0;
        let mut failed = 0;
        for affordance in &affordances {
            let const_input = if request.operation == OperationKind::InvokeAction {
                request
                    .thing
                    .affordance(Category::Actions, affordance)
                    .and_then(|action| action.const_input())
            } else {
                None
            };

            match dispatch(
                &*session,
                request.operation,
                affordance,
                request.input.as_ref(),
                const_input,
            )
            .await
            {
                Ok(result) => {
                    route(
                        result,
                        &request.target,
                        message,
                        &self.contexts,
                        &*self.output,
                    )
                    .await?;
                    routed += 1;
                }
                Err(e) => {
                    let e = Error::new(
                        ErrorKind::Dispatch,
                        format!("`{}` on `{affordance}` failed: {e}", request.operation),
                    );
                    error!("{e}");
                    self.output.error(e, message).await;
                    failed += 1;
                }
            }
        }

        Ok(RequestOutcome::Done { routed, failed })
    }

    async fn validate(&self, message: &Message) -> Result<Request> {
        let config = &self.config;

        let operation: OperationKind =
            text_field(message, "operationType", &config.operation_type).parse()?;

        let filter = AffordanceFilter {
            mode: text_field(message, "filterMode", &config.filter_mode).parse()?,
            name: text_field(message, "affordanceName", &config.affordance_name).to_owned(),
            semantic_type: text_field(message, "affordanceType", &config.affordance_type)
                .to_owned(),
        };

        let target = OutputTarget::new(
            text_field(message, "outputVar", &config.output_var),
            text_field(message, "outputVarType", &config.output_var_type),
            flag_field(message, "outputPayload", config.output_payload),
        )?;

        let ttl = minutes(minutes_field(message, "cacheMinutes", config.cache_minutes));

        let thing = match message.get("thingDescription") {
            Some(value) if !value.is_null() => ThingDescription::from_value(value.clone())
                .map_err(|e| Error::new(ErrorKind::InvalidThingDescription, e.to_string()))?,
            _ => config.thing_description.clone().ok_or_else(|| {
                Error::new(
                    ErrorKind::MissingThingDescription,
                    "Neither the message nor the configuration carry a Thing Description",
                )
            })?,
        };

        let identity = thing
            .identity()
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::MissingThingIdentity,
                    "The Thing Description has no `id`, `base` or `title`",
                )
            })?
            .to_owned();

        let input = self.input(message).await?;
        if operation == OperationKind::WriteProperty && input.is_none() {
            return Err(Error::new(
                ErrorKind::MissingInput,
                format!("`{operation}` requires an input value"),
            ));
        }

        Ok(Request {
            operation,
            filter,
            input,
            target,
            ttl,
            thing,
            identity,
        })
    }

    async fn input(&self, message: &Message) -> Result<Option<Value>> {
        let raw = match &self.config.input {
            InputSource::Msg(path) => message.get(path).cloned(),
            InputSource::Flow(path) => self.contexts.flow.get(path).await,
            InputSource::Global(path) => self.contexts.global.get(path).await,
            InputSource::Constant(value) => Some(value.clone()),
        };

        match raw {
            Some(Value::String(text)) if self.config.parse_input => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| {
                    Error::new(
                        ErrorKind::InvalidInput,
                        format!("Unable to decode the input value: {e}"),
                    )
                }),
            raw => Ok(raw.filter(|value| !value.is_null())),
        }
    }
}
