//! The data model of a Web of Things device as seen by a consumer.
//!
//! This crate provides APIs to:
//!
//! - Hold a Thing Description exactly as it was produced by a discovery
//!   service. The document is never rewritten, so it can be handed as-is to
//!   the runtime that binds it to a transport.
//! - Browse the affordances of a device, grouped by [`affordance::Category`],
//!   in the order in which they were declared.
//! - Normalize the semantic type of an affordance, which a Thing
//!   Description may express either as a single string or as a list of
//!   strings.
//!
//! Validation of a Thing Description against its schema is out of the scope
//! of this crate: a document is accepted as long as it is a JSON object.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Affordance categories, affordance views and semantic types.
pub mod affordance;
/// The Thing Description document.
pub mod thing;

pub use affordance::{ALL_CATEGORIES, Affordance, Category, SemanticType, SemanticTypes};
pub use thing::ThingDescription;
