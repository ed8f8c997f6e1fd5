use std::str::FromStr;

use hashbrown::DefaultHashBuilder;

use indexmap::IndexSet;

use tracing::{debug, warn};

use wot_td::{SemanticType, ThingDescription};

use crate::dispatcher::OperationKind;
use crate::error::{Error, ErrorKind};

/// An ordered set of affordance names.
pub type Affordances = IndexSet<String, DefaultHashBuilder>;

/// How affordances are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Selects the affordance with the given name.
    ByName,
    /// Selects all affordances with the given semantic type.
    ByType,
    /// Selects the affordance with the given name, provided that it also
    /// has the given semantic type.
    Both,
}

impl FilterMode {
    /// Returns the [`FilterMode`] name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ByName => "affordanceName",
            Self::ByType => "@type",
            Self::Both => "both",
        }
    }
}

impl std::fmt::Display for FilterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterMode {
    type Err = Error;

    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        match mode {
            "affordanceName" | "byName" => Ok(Self::ByName),
            "@type" | "byType" => Ok(Self::ByType),
            "both" => Ok(Self::Both),
            _ => Err(Error::new(
                ErrorKind::IllegalFilterMode,
                format!("`{mode}` is not a filter mode"),
            )),
        }
    }
}

/// Criteria to select the affordances of a Thing Description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffordanceFilter {
    /// Filter mode.
    pub mode: FilterMode,
    /// Name of the target affordance.
    pub name: String,
    /// Semantic type of the target affordances.
    pub semantic_type: String,
}

impl AffordanceFilter {
    /// Creates an [`AffordanceFilter`] selecting by name.
    #[must_use]
    #[inline]
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            mode: FilterMode::ByName,
            name: name.into(),
            semantic_type: String::new(),
        }
    }

    /// Creates an [`AffordanceFilter`] selecting by semantic type.
    #[must_use]
    #[inline]
    pub fn by_type(semantic_type: impl Into<String>) -> Self {
        Self {
            mode: FilterMode::ByType,
            name: String::new(),
            semantic_type: semantic_type.into(),
        }
    }

    /// Creates an [`AffordanceFilter`] selecting by both name and
    /// semantic type.
    #[must_use]
    #[inline]
    pub fn both(name: impl Into<String>, semantic_type: impl Into<String>) -> Self {
        Self {
            mode: FilterMode::Both,
            name: name.into(),
            semantic_type: semantic_type.into(),
        }
    }
}

/// Selects the affordances of a Thing Description an operation targets.
///
/// Names are returned in declaration order. An empty set means that the
/// request must be dropped.
///
/// - [`FilterMode::ByName`] selects the named affordance, if it exists in
///   the category of the operation.
/// - [`FilterMode::ByType`] selects every affordance whose semantic types
///   contain the target type. Affordances with a malformed `@type` are
///   skipped.
/// - [`FilterMode::Both`] collapses the [`FilterMode::ByType`] selection to
///   the named affordance when it belongs to it, and to nothing otherwise.
#[must_use]
pub fn select_affordances(
    thing: &ThingDescription,
    operation: OperationKind,
    filter: &AffordanceFilter,
) -> Affordances {
    let category = operation.category();

    if filter.mode == FilterMode::ByName {
        return thing
            .affordance(category, &filter.name)
            .map(|affordance| affordance.name().to_owned())
            .into_iter()
            .collect();
    }

    let selected: Affordances = thing
        .affordances(category)
        .filter(|affordance| match affordance.semantic_type() {
            SemanticType::Unrecognized => {
                warn!(
                    "Skip {category} `{}`: malformed semantic type",
                    affordance.name()
                );
                false
            }
            semantic_type => semantic_type.contains(&filter.semantic_type),
        })
        .map(|affordance| affordance.name().to_owned())
        .collect();

    if filter.mode == FilterMode::Both {
        if selected.contains(&filter.name) {
            return std::iter::once(filter.name.clone()).collect();
        }
        debug!(
            "`{}` is not among the {category} with semantic type `{}`",
            filter.name, filter.semantic_type
        );
        return Affordances::default();
    }

    selected
}
