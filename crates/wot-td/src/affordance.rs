use hashbrown::DefaultHashBuilder;

use indexmap::IndexSet;

use serde::{Deserialize, Serialize};

use serde_json::Value;

/// All [`Category`]s.
pub const ALL_CATEGORIES: &[Category] = &[Category::Properties, Category::Actions, Category::Events];

/// Affordance categories of a Thing Description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Properties, which can be read, written and observed.
    Properties,
    /// Actions, which can be invoked.
    Actions,
    /// Events, which can be subscribed.
    Events,
}

impl core::fmt::Display for Category {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.key())
    }
}

impl Category {
    /// Returns the name of the Thing Description member which contains
    /// the affordances of this [`Category`].
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Properties => "properties",
            Self::Actions => "actions",
            Self::Events => "events",
        }
    }

    /// Returns the [`Category`] associated with the given Thing Description
    /// member name.
    ///
    /// The return value is [`None`] when the member name does not identify
    /// any affordance category.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        ALL_CATEGORIES
            .iter()
            .copied()
            .find(|category| category.key() == key)
    }
}

/// An ordered set of semantic types.
pub type SemanticTypes<'a> = IndexSet<&'a str, DefaultHashBuilder>;

/// The semantic type (`@type`) of an affordance, as declared in a
/// Thing Description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticType<'a> {
    /// No semantic type has been declared.
    Absent,
    /// A single semantic type.
    Single(&'a str),
    /// A list of semantic types.
    ///
    /// Members which are not strings are discarded.
    List(Vec<&'a str>),
    /// The semantic type has a shape which is neither a string nor a list.
    Unrecognized,
}

impl<'a> SemanticType<'a> {
    /// Builds a [`SemanticType`] from the raw `@type` member of an
    /// affordance.
    #[must_use]
    pub fn from_value(value: Option<&'a Value>) -> Self {
        match value {
            None => Self::Absent,
            Some(Value::String(semantic_type)) => Self::Single(semantic_type),
            Some(Value::Array(items)) => Self::List(items.iter().filter_map(Value::as_str).collect()),
            Some(_) => Self::Unrecognized,
        }
    }

    /// Normalizes the semantic type into a set of strings.
    ///
    /// The return value is [`None`] for an [`SemanticType::Unrecognized`]
    /// shape, and an empty set when no semantic type has been declared.
    #[must_use]
    pub fn types(&self) -> Option<SemanticTypes<'a>> {
        match self {
            Self::Absent => Some(SemanticTypes::default()),
            Self::Single(semantic_type) => Some(core::iter::once(*semantic_type).collect()),
            Self::List(semantic_types) => Some(semantic_types.iter().copied().collect()),
            Self::Unrecognized => None,
        }
    }

    /// Checks whether the given semantic type is declared.
    #[must_use]
    pub fn contains(&self, semantic_type: &str) -> bool {
        self.types()
            .is_some_and(|semantic_types| semantic_types.contains(semantic_type))
    }
}

/// A borrowed view over an affordance record of a Thing Description.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affordance<'a> {
    name: &'a str,
    category: Category,
    record: &'a Value,
}

impl<'a> Affordance<'a> {
    pub(crate) const fn new(name: &'a str, category: Category, record: &'a Value) -> Self {
        Self {
            name,
            category,
            record,
        }
    }

    /// Returns the affordance name.
    #[must_use]
    pub const fn name(&self) -> &'a str {
        self.name
    }

    /// Returns the affordance [`Category`].
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Returns the raw affordance record.
    #[must_use]
    pub const fn record(&self) -> &'a Value {
        self.record
    }

    /// Returns the affordance title, if any.
    #[must_use]
    pub fn title(&self) -> Option<&'a str> {
        self.record.get("title").and_then(Value::as_str)
    }

    /// Returns the affordance [`SemanticType`].
    #[must_use]
    pub fn semantic_type(&self) -> SemanticType<'a> {
        SemanticType::from_value(self.record.get("@type"))
    }

    /// Returns the constant input value declared by an action.
    ///
    /// The value is read from the `const` member of the `input` data schema.
    #[must_use]
    pub fn const_input(&self) -> Option<&'a Value> {
        self.record.get("input")?.get("const")
    }

    /// Returns the value declared by a data schema, preferring `const`
    /// over `default`.
    #[must_use]
    pub fn default_value(&self) -> Option<&'a Value> {
        self.record
            .get("const")
            .or_else(|| self.record.get("default"))
    }
}
