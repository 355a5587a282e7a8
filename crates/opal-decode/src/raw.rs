//! The raw, caller-supplied argument shape the decoder consumes.

use std::cmp::Ordering;

/// A raw argument key: either a parameter name or a synthetic positional
/// marker `arg<N>` (N starting at 1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgKey {
    /// A named parameter (or deprecated alias).
    Named(String),
    /// A positional marker, 1-indexed.
    Positional(usize),
}

impl ArgKey {
    /// Parse a raw key, recognizing `arg<N>` markers.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if let Some(digits) = raw.strip_prefix("arg") {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(n) = digits.parse::<usize>() {
                    if n >= 1 {
                        return Self::Positional(n);
                    }
                }
            }
        }
        Self::Named(raw.to_string())
    }
}

impl PartialOrd for ArgKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArgKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Positional(a), Self::Positional(b)) => a.cmp(b),
            (Self::Named(a), Self::Named(b)) => a.cmp(b),
            (Self::Positional(_), Self::Named(_)) => Ordering::Less,
            (Self::Named(_), Self::Positional(_)) => Ordering::Greater,
        }
    }
}

/// The raw invocation the decoder normalizes: an optional primary value
/// (present iff dot syntax was used) plus a key-value map of the remaining
/// arguments.
#[derive(Debug, Clone, Default)]
pub struct RawCall {
    /// The primary value, if dot syntax (`@name.X`) or the first positional
    /// bound to the primary parameter was used.
    pub primary: Option<String>,
    /// Remaining arguments, keyed by name or positional marker.
    pub args: std::collections::BTreeMap<ArgKey, serde_json::Value>,
}
