use serde::{Deserialize, Serialize};

use serde_json::Value;

use wot_td::ThingDescription;

use crate::error::{Error, ErrorKind, Result};
use crate::message::PAYLOAD;

/// Default time-to-live, in minutes, of a cached device session.
pub const DEFAULT_CACHE_MINUTES: u64 = 15;

/// Where the input value of an operation comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum InputSource {
    /// A dotted path on the incoming message.
    Msg(String),
    /// A dotted path on the flow context.
    Flow(String),
    /// A dotted path on the global context.
    Global(String),
    /// A constant value.
    Constant(Value),
}

impl Default for InputSource {
    fn default() -> Self {
        Self::Msg(PAYLOAD.into())
    }
}

fn default_operation_type() -> String {
    "readProperty".into()
}

fn default_filter_mode() -> String {
    "affordanceName".into()
}

fn default_output_var() -> String {
    PAYLOAD.into()
}

fn default_output_var_type() -> String {
    "msg".into()
}

const fn default_cache_minutes() -> u64 {
    DEFAULT_CACHE_MINUTES
}

/// Configuration-time defaults of a consumer.
///
/// Each field is overridden by the homonymous field of an incoming message,
/// when present. Textual fields are validated once per request, so a bad
/// value makes a request fail rather than the consumer construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerConfig {
    /// Operation kind, such as `readProperty`.
    #[serde(default = "default_operation_type")]
    pub operation_type: String,
    /// Affordance filter mode: `affordanceName`, `@type` or `both`.
    #[serde(default = "default_filter_mode")]
    pub filter_mode: String,
    /// Name of the target affordance.
    #[serde(default)]
    pub affordance_name: String,
    /// Semantic type of the target affordances.
    #[serde(default)]
    pub affordance_type: String,
    /// Source of the input value.
    #[serde(default)]
    pub input: InputSource,
    /// Whether a textual input value is decoded as `JSON` before use.
    #[serde(default)]
    pub parse_input: bool,
    /// Name of the variable receiving the result.
    #[serde(default = "default_output_var")]
    pub output_var: String,
    /// Scope of the output variable: `msg`, `flow` or `global`.
    #[serde(default = "default_output_var_type")]
    pub output_var_type: String,
    /// Whether the result is also copied onto the message payload.
    #[serde(default)]
    pub output_payload: bool,
    /// Time-to-live, in minutes, of a cached device session.
    ///
    /// Zero disables the expiration.
    #[serde(default = "default_cache_minutes")]
    pub cache_minutes: u64,
    /// Thing Description used when a message does not carry one.
    #[serde(default)]
    pub thing_description: Option<ThingDescription>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            operation_type: default_operation_type(),
            filter_mode: default_filter_mode(),
            affordance_name: String::new(),
            affordance_type: String::new(),
            input: InputSource::default(),
            parse_input: false,
            output_var: default_output_var(),
            output_var_type: default_output_var_type(),
            output_payload: false,
            cache_minutes: DEFAULT_CACHE_MINUTES,
            thing_description: None,
        }
    }
}

impl ConsumerConfig {
    /// Creates a [`ConsumerConfig`] with all default values.
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a [`ConsumerConfig`] from its `JSON` encoding.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// The text is not a valid configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("Invalid consumer configuration: {e}"),
            )
        })
    }

    /// Sets the operation kind.
    #[must_use]
    #[inline]
    pub fn operation_type(mut self, operation_type: impl Into<String>) -> Self {
        self.operation_type = operation_type.into();
        self
    }

    /// Selects affordances by name.
    #[must_use]
    #[inline]
    pub fn by_name(mut self, name: impl Into<String>) -> Self {
        self.filter_mode = "affordanceName".into();
        self.affordance_name = name.into();
        self
    }

    /// Selects affordances by semantic type.
    #[must_use]
    #[inline]
    pub fn by_type(mut self, semantic_type: impl Into<String>) -> Self {
        self.filter_mode = "@type".into();
        self.affordance_type = semantic_type.into();
        self
    }

    /// Selects the affordance with the given name, provided that it also
    /// has the given semantic type.
    #[must_use]
    #[inline]
    pub fn by_name_and_type(
        mut self,
        name: impl Into<String>,
        semantic_type: impl Into<String>,
    ) -> Self {
        self.filter_mode = "both".into();
        self.affordance_name = name.into();
        self.affordance_type = semantic_type.into();
        self
    }

    /// Sets the [`InputSource`].
    #[must_use]
    #[inline]
    pub fn input(mut self, input: InputSource) -> Self {
        self.input = input;
        self
    }

    /// Decodes a textual input value as `JSON` before use.
    #[must_use]
    #[inline]
    pub const fn parse_input(mut self, parse_input: bool) -> Self {
        self.parse_input = parse_input;
        self
    }

    /// Sets the output variable and its scope.
    #[must_use]
    #[inline]
    pub fn output(mut self, var: impl Into<String>, scope: impl Into<String>) -> Self {
        self.output_var = var.into();
        self.output_var_type = scope.into();
        self
    }

    /// Copies every result onto the message payload.
    #[must_use]
    #[inline]
    pub const fn output_payload(mut self, output_payload: bool) -> Self {
        self.output_payload = output_payload;
        self
    }

    /// Sets the time-to-live, in minutes, of cached device sessions.
    #[must_use]
    #[inline]
    pub const fn cache_minutes(mut self, cache_minutes: u64) -> Self {
        self.cache_minutes = cache_minutes;
        self
    }

    /// Sets the default [`ThingDescription`].
    #[must_use]
    #[inline]
    pub fn thing_description(mut self, thing_description: ThingDescription) -> Self {
        self.thing_description = Some(thing_description);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::error::ErrorKind;

    use super::{ConsumerConfig, DEFAULT_CACHE_MINUTES, InputSource};

    #[test]
    fn default_config() {
        let config = ConsumerConfig::new();

        assert_eq!(config.operation_type, "readProperty");
        assert_eq!(config.filter_mode, "affordanceName");
        assert_eq!(config.input, InputSource::Msg("payload".into()));
        assert_eq!(config.output_var, "payload");
        assert_eq!(config.output_var_type, "msg");
        assert!(!config.output_payload);
        assert_eq!(config.cache_minutes, DEFAULT_CACHE_MINUTES);
        assert!(config.thing_description.is_none());

        assert_eq!(ConsumerConfig::from_json("{}").unwrap(), config);
    }

    #[test]
    fn config_from_json() {
        let config = ConsumerConfig::from_json(
            &json!({
                "operationType": "invokeAction",
                "filterMode": "@type",
                "affordanceType": "Toggle",
                "input": { "type": "flow", "value": "lamp.level" },
                "parseInput": true,
                "outputVar": "result",
                "outputVarType": "global",
                "cacheMinutes": 0,
            })
            .to_string(),
        )
        .unwrap();

        assert_eq!(
            config,
            ConsumerConfig::new()
                .operation_type("invokeAction")
                .by_type("Toggle")
                .input(InputSource::Flow("lamp.level".into()))
                .parse_input(true)
                .output("result", "global")
                .cache_minutes(0)
        );

        let config = ConsumerConfig::from_json(
            &json!({ "input": { "type": "constant", "value": { "level": 3 } } }).to_string(),
        )
        .unwrap();
        assert_eq!(config.input, InputSource::Constant(json!({ "level": 3 })));
    }

    #[test]
    fn invalid_config() {
        let error = ConsumerConfig::from_json(r#"{ "cacheMinutes": "soon" }"#).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidInput);
    }
}
