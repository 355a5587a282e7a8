//! Type-specific constraints attached to a [`crate::ParamSpec`].

use crate::types::Format;
use regex::Regex;
use std::collections::BTreeMap;

/// Inclusive length bounds for strings and arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LengthBounds {
    /// Minimum length, inclusive.
    pub min: Option<usize>,
    /// Maximum length, inclusive.
    pub max: Option<usize>,
}

/// Inclusive numeric bounds for integers and floats.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumericBounds {
    /// Minimum value, inclusive.
    pub min: Option<f64>,
    /// Maximum value, inclusive.
    pub max: Option<f64>,
}

/// A compiled regex pattern constraint.
///
/// Wraps [`regex::Regex`] with a hand-written [`PartialEq`] (compiled regexes
/// don't implement it) that compares the source pattern string.
#[derive(Debug, Clone)]
pub struct PatternConstraint(Regex);

impl PatternConstraint {
    /// Compile `pattern`, returning `None` on invalid regex syntax.
    #[must_use]
    pub fn compile(pattern: &str) -> Option<Self> {
        Regex::new(pattern).ok().map(Self)
    }

    /// The underlying compiled regex.
    #[must_use]
    pub fn regex(&self) -> &Regex {
        &self.0
    }

    /// Source pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for PatternConstraint {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

/// Enum value list with per-value deprecation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumConstraint {
    /// Current, non-deprecated member values.
    pub values: Vec<String>,
    /// Deprecated source value → replacement value.
    pub deprecated: BTreeMap<String, String>,
}

impl EnumConstraint {
    /// Returns the replacement for `value` if it is a deprecated member.
    #[must_use]
    pub fn replacement_for(&self, value: &str) -> Option<&str> {
        self.deprecated.get(value).map(String::as_str)
    }

    /// `true` if `value` is a current (non-deprecated) member.
    #[must_use]
    pub fn is_member(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// Object field map with required-fields list and open/closed discipline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectConstraint {
    /// Declared field name → field schema.
    pub fields: BTreeMap<String, crate::param::ParamSpec>,
    /// Field names that must be present.
    pub required: Vec<String>,
    /// When `false`, fields outside `fields` are rejected (closed discipline).
    pub additional_properties: bool,
}

/// Array element schema with a uniqueness flag.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayConstraint {
    /// Schema every element must satisfy.
    pub element: Box<crate::param::ParamSpec>,
    /// Whether duplicate elements are rejected.
    pub unique: bool,
}

/// The full set of optional constraints a [`crate::ParamSpec`] may carry.
///
/// Only the fields relevant to the parameter's [`crate::ParamType`] are
/// populated; the rest stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    /// Length bounds (strings, arrays).
    pub length: Option<LengthBounds>,
    /// Numeric bounds (integers, floats).
    pub numeric: Option<NumericBounds>,
    /// Regex pattern (strings).
    pub pattern: Option<PatternConstraint>,
    /// Named format (strings).
    pub format: Option<Format>,
    /// Enum membership and deprecation (enums).
    pub enum_: Option<EnumConstraint>,
    /// Field map and required-fields discipline (objects).
    pub object: Option<ObjectConstraint>,
    /// Element schema and uniqueness (arrays).
    pub array: Option<ArrayConstraint>,
}
