//! The decorator-call shape a plan compiler hands the runtime: a dotted
//! path, an optional primary value, a raw argument map, and an optional
//! child block (`spec.md` §6).

use std::collections::BTreeMap;

/// One decorator invocation as written in a plan, prior to schema lookup
/// and decoding. `args` keys are either parameter names or `arg<N>`
/// positional markers, matching [`opal_decode::ArgKey::parse`]'s input.
#[derive(Debug, Clone, Default)]
pub struct DecoratorCall {
    /// Dotted decorator path, e.g. `"retry"` or `"ssh.connect"`.
    pub path: String,
    /// The primary value, present iff dot syntax (`@name.X`) was used.
    pub primary: Option<String>,
    /// Raw arguments, keyed by parameter name or positional marker.
    pub args: BTreeMap<String, serde_json::Value>,
    /// Nested calls in this call's child block, if any.
    pub block: Option<Vec<DecoratorCall>>,
}

impl DecoratorCall {
    /// Construct a call with no arguments and no block.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            primary: None,
            args: BTreeMap::new(),
            block: None,
        }
    }

    /// Convert this call's raw argument map into an [`opal_decode::RawCall`]
    /// ready for [`opal_decode::decode`] against the target path's schema.
    #[must_use]
    pub fn to_raw_call(&self) -> opal_decode::RawCall {
        let args = self
            .args
            .iter()
            .map(|(key, value)| (opal_decode::ArgKey::parse(key), value.clone()))
            .collect();
        opal_decode::RawCall {
            primary: self.primary.clone(),
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_keys_round_trip_through_arg_key_parse() {
        let mut call = DecoratorCall::new("retry");
        call.args.insert("arg1".to_string(), serde_json::json!(3));
        call.args.insert("delay".to_string(), serde_json::json!("5s"));
        let raw = call.to_raw_call();
        assert_eq!(raw.args.len(), 2);
        assert!(raw.args.contains_key(&opal_decode::ArgKey::Positional(1)));
        assert!(raw.args.contains_key(&opal_decode::ArgKey::Named("delay".to_string())));
    }

    #[test]
    fn primary_value_carries_through() {
        let mut call = DecoratorCall::new("env");
        call.primary = Some("HOME".to_string());
        assert_eq!(call.to_raw_call().primary.as_deref(), Some("HOME"));
    }
}
