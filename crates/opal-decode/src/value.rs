//! The typed output of validation: a canonical map of [`ArgValue`]s.

use std::collections::BTreeMap;
use std::time::Duration;

/// A validated, strictly-typed argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// String value.
    String(String),
    /// Integer value.
    Integer(i64),
    /// Floating-point value.
    Float(f64),
    /// Boolean value.
    Boolean(bool),
    /// Parsed duration.
    Duration(Duration),
    /// Nested object.
    Object(BTreeMap<String, ArgValue>),
    /// Array of values.
    Array(Vec<ArgValue>),
    /// Opaque auth/secret handle identifier.
    Handle(String),
}

impl ArgValue {
    /// Borrow as a string, if this is a [`ArgValue::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as an integer, if this is a [`ArgValue::Integer`].
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Borrow as a duration, if this is a [`ArgValue::Duration`].
    #[must_use]
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Duration(d) => Some(*d),
            _ => None,
        }
    }
}

/// A field-name-matching view over a validated canonical map.
///
/// Lookups are case-insensitive and underscore/hyphen-insensitive, so a
/// decorator implementation's struct field `max_workers` matches a caller
/// who wrote `maxWorkers`, `max-workers`, or `MAX_WORKERS`.
pub struct CanonicalRecord<'a>(&'a BTreeMap<String, ArgValue>);

impl<'a> CanonicalRecord<'a> {
    /// Wrap an already-validated canonical map.
    #[must_use]
    pub fn new(map: &'a BTreeMap<String, ArgValue>) -> Self {
        Self(map)
    }

    /// Look up a field by name, ignoring case and `_`/`-` separators.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'a ArgValue> {
        let target = normalize_field_name(name);
        self.0
            .iter()
            .find(|(key, _)| normalize_field_name(key) == target)
            .map(|(_, value)| value)
    }
}

fn normalize_field_name(s: &str) -> String {
    s.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_matching_ignores_case_and_separators() {
        let mut map = BTreeMap::new();
        map.insert("max_workers".to_string(), ArgValue::Integer(5));
        let record = CanonicalRecord::new(&map);
        assert_eq!(record.field("maxWorkers"), Some(&ArgValue::Integer(5)));
        assert_eq!(record.field("max-workers"), Some(&ArgValue::Integer(5)));
        assert_eq!(record.field("MAX_WORKERS"), Some(&ArgValue::Integer(5)));
        assert_eq!(record.field("nope"), None);
    }
}
