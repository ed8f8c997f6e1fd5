//! The `wot-consumer` library crate operates Web of Things devices on behalf
//! of a flow-based automation engine.
//!
//! Each incoming message is turned into one or more interactions with a
//! device described by a Thing Description:
//!
//! - Selecting the affordances an operation targets, either by name, by
//!   semantic type, or by both
//! - Reusing a device session across requests through a cache whose entries
//!   expire after a period of inactivity
//! - Reading, writing and observing properties, invoking actions, and
//!   subscribing events
//! - Writing each result into the outgoing message, the flow context or the
//!   global context, and emitting the message towards the next node
//!
//! Transport bindings are provided by a [`runtime::ThingRuntime`]
//! implementation. A [`runtime::SimulatedRuntime`] is bundled for tests and
//! demonstrations.
//!
//! `wot-consumer` leverages `tokio` as an asynchronous executor, hence
//! independent requests can be handled concurrently while session
//! expirations run as background tasks.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// A time-bounded cache of device sessions.
pub mod cache;
/// Configuration-time defaults.
pub mod config;
/// The request orchestrator.
pub mod consumer;
/// Operation kinds and their dispatch on a device session.
pub mod dispatcher;
/// Error management.
pub mod error;
/// Messages and contexts of the host flow engine.
pub mod message;
/// Result routing and node outputs.
pub mod router;
pub mod runtime;
/// Affordance selection.
pub mod selector;

pub use config::ConsumerConfig;
pub use consumer::{RequestOutcome, Sessions, ThingConsumer};
pub use error::{Error, ErrorKind, Result};
pub use message::{Context, Contexts, Message};

#[cfg(test)]
mod tests;
