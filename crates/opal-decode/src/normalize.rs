//! Step 1 of decoding: turn a [`RawCall`] into a canonical `BTreeMap<String,
//! Value>` keyed only by real parameter names.

use crate::raw::{ArgKey, RawCall};
use crate::warning::Warnings;
use opal_error::{ErrorCode, OpalError};
use opal_schema::Schema;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Normalize a raw call against `schema`, producing the canonical parameter
/// map and any deprecation warnings emitted along the way.
pub fn normalize(schema: &Schema, call: RawCall) -> Result<(BTreeMap<String, Value>, Warnings), OpalError> {
    let mut canonical: BTreeMap<String, Value> = BTreeMap::new();
    let mut warnings = Warnings::new();

    // Step 1 & 2: primary value.
    if let Some(primary_value) = call.primary {
        let Some(primary_name) = schema.primary.clone() else {
            return Err(OpalError::new(
                ErrorCode::DecodeNoPrimaryParameter,
                "a primary value was supplied but this schema has no primary parameter",
            ));
        };
        canonical.insert(primary_name, Value::String(primary_value));
    }

    // Step 3: partition into positionals and named.
    let mut positionals: Vec<(usize, Value)> = Vec::new();
    for (key, value) in call.args {
        match key {
            ArgKey::Positional(index) => positionals.push((index, value)),
            ArgKey::Named(name) => {
                let canonical_name = if let Some(target) = schema.deprecated_aliases.get(&name) {
                    warnings.push(
                        name.clone(),
                        format!("'{name}' is deprecated; use '{target}' instead"),
                    );
                    target.clone()
                } else {
                    name.clone()
                };

                if !schema.params.contains_key(&canonical_name) {
                    return Err(OpalError::new(
                        ErrorCode::DecodeUnknownParameter,
                        format!("unknown parameter '{name}'"),
                    ));
                }
                if canonical.contains_key(&canonical_name) {
                    return Err(OpalError::new(
                        ErrorCode::DecodeDuplicateBinding,
                        format!("parameter '{canonical_name}' bound more than once"),
                    ));
                }
                canonical.insert(canonical_name, value);
            }
        }
    }

    positionals.sort_by_key(|(index, _)| *index);

    // Step 4: validate the sparse index set against the binding order.
    let binding_order = schema.positional_binding_order();
    let used_indices: BTreeSet<usize> = positionals.iter().map(|(i, _)| *i).collect();
    let max_index = used_indices.iter().copied().max().unwrap_or(0);
    let mut bound_names: BTreeSet<String> = canonical.keys().cloned().collect();

    for position in 1..=max_index {
        if used_indices.contains(&position) {
            continue;
        }
        let Some(name_at_position) = binding_order.get(position - 1) else {
            return Err(OpalError::new(
                ErrorCode::DecodeMissingRequired,
                format!("missing arg{position}"),
            ));
        };
        if !bound_names.contains(*name_at_position) {
            return Err(OpalError::new(
                ErrorCode::DecodeMissingRequired,
                format!("missing arg{position}"),
            ));
        }
    }

    // Step 5: bind ascending positionals to the next unbound slot in order.
    let mut remaining: Vec<&str> = binding_order
        .iter()
        .filter(|name| !bound_names.contains(**name))
        .copied()
        .collect();

    if positionals.len() > remaining.len() {
        return Err(OpalError::new(
            ErrorCode::DecodeUnknownParameter,
            "too many positional arguments for this schema",
        ));
    }

    for (value_index, (_, value)) in positionals.into_iter().enumerate() {
        let name = remaining[value_index].to_string();
        if canonical.contains_key(&name) {
            return Err(OpalError::new(
                ErrorCode::DecodeDuplicateBinding,
                format!("parameter '{name}' bound more than once"),
            ));
        }
        canonical.insert(name.clone(), value);
        bound_names.insert(name);
    }

    Ok((canonical, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_schema::{DescriptorBuilder, ParamType};

    fn retry_schema() -> Schema {
        DescriptorBuilder::new("retry")
            .param("attempts", ParamType::Integer)
            .required()
            .commit()
            .param("delay", ParamType::Duration)
            .default("1s")
            .commit()
            .build()
            .unwrap()
            .schema
    }

    fn call(primary: Option<&str>, named: &[(&str, Value)], positional: &[(usize, Value)]) -> RawCall {
        let mut args = BTreeMap::new();
        for (k, v) in named {
            args.insert(ArgKey::Named((*k).to_string()), v.clone());
        }
        for (i, v) in positional {
            args.insert(ArgKey::Positional(*i), v.clone());
        }
        RawCall {
            primary: primary.map(str::to_string),
            args,
        }
    }

    #[test]
    fn primary_without_schema_primary_fails() {
        let schema = retry_schema();
        let result = normalize(&schema, call(Some("x"), &[], &[]));
        assert!(result.is_err());
    }

    #[test]
    fn arg2_alone_fails_missing_arg1() {
        let schema = retry_schema();
        let result = normalize(&schema, call(None, &[], &[(2, Value::String("5s".into()))]));
        assert!(result.is_err());
    }

    #[test]
    fn named_plus_arg2_succeeds() {
        let schema = retry_schema();
        let (canonical, warnings) = normalize(
            &schema,
            call(None, &[("attempts", Value::from(3))], &[(1, Value::String("5s".into()))]),
        )
        .unwrap();
        assert_eq!(canonical.get("delay"), Some(&Value::String("5s".into())));
        assert!(warnings.is_empty());
    }

    #[test]
    fn deprecated_alias_emits_warning() {
        let schema = DescriptorBuilder::new("parallel")
            .deprecated_alias("maxConcurrency", "max_workers")
            .param("max_workers", ParamType::Integer)
            .commit()
            .build()
            .unwrap()
            .schema;
        let (canonical, warnings) = normalize(&schema, call(None, &[("maxConcurrency", Value::from(5))], &[])).unwrap();
        assert_eq!(canonical.get("max_workers"), Some(&Value::from(5)));
        assert_eq!(warnings.0.len(), 1);
        assert_eq!(warnings.0[0].param, "maxConcurrency");
    }

    #[test]
    fn unknown_named_parameter_fails() {
        let schema = retry_schema();
        let result = normalize(&schema, call(None, &[("bogus", Value::from(1))], &[]));
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_binding_fails() {
        let schema = retry_schema();
        let result = normalize(
            &schema,
            call(None, &[("attempts", Value::from(3))], &[(1, Value::from(4))]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn excess_positionals_fail() {
        let schema = retry_schema();
        let result = normalize(
            &schema,
            call(None, &[], &[(1, Value::from(3)), (2, Value::from("5s")), (3, Value::from("x"))]),
        );
        assert!(result.is_err());
    }
}
