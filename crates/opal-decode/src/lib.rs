// SPDX-License-Identifier: MIT OR Apache-2.0
//! Normalizes and validates decorator call arguments against an
//! `opal-schema` descriptor.
//!
//! Decoding happens in two passes, run via [`decode`]: [`normalize::normalize`]
//! turns a caller-supplied [`RawCall`] (primary value plus positional/named
//! arguments) into a canonical `BTreeMap<String, serde_json::Value>`, and
//! [`validate::validate`] applies defaults, enforces required parameters,
//! rewrites deprecated enum values, and checks strict types and declarative
//! constraints, producing a typed [`ArgValue`] map. Both passes thread a
//! [`Warnings`] collector for non-fatal deprecation notices.

#![warn(missing_docs)]

mod duration;
mod normalize;
mod raw;
mod validate;
mod value;
mod warning;

pub use duration::parse_duration;
pub use normalize::normalize;
pub use raw::{ArgKey, RawCall};
pub use validate::validate;
pub use value::{ArgValue, CanonicalRecord};
pub use warning::{Warning, Warnings};

use opal_error::OpalError;
use opal_schema::Schema;
use std::collections::BTreeMap;

/// Run both decode passes: normalize `call` against `schema`, then validate
/// the result, merging warnings from both stages.
///
/// This is the re-entrant entry point: it may also be invoked with a
/// canonical map that's already fully bound (e.g. to decode an object
/// parameter's nested value), since `normalize` is idempotent on an
/// already-canonical map.
pub fn decode(schema: &Schema, call: RawCall) -> Result<(BTreeMap<String, ArgValue>, Warnings), OpalError> {
    let (canonical, mut warnings) = normalize::normalize(schema, call)?;
    let (validated, validate_warnings) = validate::validate(schema, canonical)?;
    warnings.0.extend(validate_warnings.0);
    Ok((validated, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_schema::{DescriptorBuilder, ParamType};
    use std::collections::BTreeMap as Map;

    #[test]
    fn full_decode_pipeline_scenario_env_dot_syntax() {
        let schema = DescriptorBuilder::new("env")
            .param("property", ParamType::String)
            .primary()
            .commit()
            .build()
            .unwrap()
            .schema;
        let call = RawCall {
            primary: Some("HOME".to_string()),
            args: Map::new(),
        };
        let (validated, warnings) = decode(&schema, call).unwrap();
        assert_eq!(validated.get("property"), Some(&ArgValue::String("HOME".to_string())));
        assert!(warnings.is_empty());
    }

    #[test]
    fn full_decode_pipeline_scenario_retry_deprecated_alias() {
        let schema = DescriptorBuilder::new("retry")
            .deprecated_alias("times", "attempts")
            .param("attempts", ParamType::Integer)
            .range(Some(1.0), Some(10.0))
            .default(3)
            .commit()
            .param("delay", ParamType::Duration)
            .default("1s")
            .commit()
            .build()
            .unwrap()
            .schema;
        let mut args = Map::new();
        args.insert(ArgKey::Named("times".to_string()), serde_json::Value::from(3));
        args.insert(ArgKey::Positional(1), serde_json::Value::String("5s".to_string()));
        let call = RawCall { primary: None, args };
        let (validated, warnings) = decode(&schema, call).unwrap();
        assert_eq!(validated.get("attempts").and_then(ArgValue::as_integer), Some(3));
        assert_eq!(warnings.0.len(), 1);
        assert_eq!(warnings.0[0].param, "times");
    }

    #[test]
    fn decode_is_idempotent_on_already_canonical_map() {
        let schema = DescriptorBuilder::new("parallel")
            .param("max_workers", ParamType::Integer)
            .default(4)
            .commit()
            .build()
            .unwrap()
            .schema;
        let first = decode(
            &schema,
            RawCall {
                primary: None,
                args: Map::new(),
            },
        )
        .unwrap()
        .0;
        // Re-normalizing an already-canonical map (named, not positional)
        // should produce the same result.
        let mut args = Map::new();
        args.insert(ArgKey::Named("max_workers".to_string()), serde_json::Value::from(4));
        let second = decode(&schema, RawCall { primary: None, args }).unwrap().0;
        assert_eq!(first, second);
    }
}
