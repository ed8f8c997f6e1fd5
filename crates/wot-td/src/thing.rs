use serde::{Deserialize, Serialize};

use serde_json::{Map, Value};

use crate::affordance::{Affordance, Category};

// Members which identify a thing, in priority order.
const IDENTITY_MEMBERS: &[&str] = &["id", "base", "title"];

/// A Thing Description.
///
/// The document is kept exactly as received. Only the members a consumer
/// needs are interpreted, and only on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThingDescription(Map<String, Value>);

impl ThingDescription {
    /// Parses a [`ThingDescription`] from its textual `JSON` encoding.
    ///
    /// # Errors
    ///
    /// The text is not valid `JSON` or it does not encode an object.
    #[inline]
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Builds a [`ThingDescription`] from a `JSON` value.
    ///
    /// # Errors
    ///
    /// The value is not an object.
    #[inline]
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Returns the identity of the thing.
    ///
    /// The identity is the first non-empty string among the `id`, `base`
    /// and `title` members, checked in this order.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        IDENTITY_MEMBERS.iter().find_map(|member| {
            self.0
                .get(*member)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
        })
    }

    /// Returns the thing title, if any.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }

    /// Returns an iterator over all the affordances of a [`Category`], in
    /// declaration order.
    ///
    /// The iterator is empty when the category is missing or it is not an
    /// object.
    pub fn affordances(&self, category: Category) -> impl Iterator<Item = Affordance<'_>> {
        self.0
            .get(category.key())
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(move |affordances| {
                affordances
                    .iter()
                    .map(move |(name, record)| Affordance::new(name, category, record))
            })
    }

    /// Returns the affordance of a [`Category`] with the given name.
    #[must_use]
    pub fn affordance(&self, category: Category, name: &str) -> Option<Affordance<'_>> {
        self.0
            .get(category.key())
            .and_then(Value::as_object)
            .and_then(|affordances| affordances.get_key_value(name))
            .map(|(name, record)| Affordance::new(name, category, record))
    }

    /// Returns the raw document.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Converts the [`ThingDescription`] back into a `JSON` value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}
