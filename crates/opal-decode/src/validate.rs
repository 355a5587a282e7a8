//! Step 2 of decoding: apply defaults, enforce required parameters, rewrite
//! deprecated enum values, and check strict types and declarative
//! constraints.

use crate::duration::parse_duration;
use crate::value::ArgValue;
use crate::warning::Warnings;
use opal_error::{ErrorCode, OpalError};
use opal_schema::{Format, ParamSpec, ParamType, Schema};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

/// Validate a normalized canonical map against `schema`, producing the
/// strictly-typed argument map and any warnings emitted along the way.
pub fn validate(schema: &Schema, mut canonical: BTreeMap<String, Value>) -> Result<(BTreeMap<String, ArgValue>, Warnings), OpalError> {
    let mut warnings = Warnings::new();

    for name in &schema.order {
        let Some(spec) = schema.params.get(name) else {
            continue;
        };
        if !canonical.contains_key(name) {
            if let Some(ref default) = spec.default {
                canonical.insert(name.clone(), default.clone());
            }
        }
    }

    let mut out = BTreeMap::new();
    for name in &schema.order {
        let Some(spec) = schema.params.get(name) else {
            continue;
        };
        match canonical.remove(name) {
            Some(value) => {
                let validated = validate_param(spec, value, &mut warnings)?;
                out.insert(name.clone(), validated);
            }
            None => {
                if spec.required {
                    return Err(OpalError::new(
                        ErrorCode::DecodeMissingRequired,
                        format!("missing required parameter '{name}'"),
                    ));
                }
            }
        }
    }

    Ok((out, warnings))
}

fn validate_param(spec: &ParamSpec, mut value: Value, warnings: &mut Warnings) -> Result<ArgValue, OpalError> {
    if spec.param_type == ParamType::Enum {
        if let (Some(s), Some(e)) = (value.as_str(), spec.constraints.enum_.as_ref()) {
            if let Some(replacement) = e.replacement_for(s) {
                warnings.push(
                    spec.name.clone(),
                    format!("'{s}' is deprecated; use '{replacement}' instead"),
                );
                value = Value::String(replacement.to_string());
            }
        }
    }

    match spec.param_type {
        ParamType::String => {
            let s = value.as_str().ok_or_else(|| type_err(spec, "string"))?.to_string();
            check_length(spec, s.chars().count())?;
            check_pattern(spec, &s)?;
            check_format(spec, &s)?;
            Ok(ArgValue::String(s))
        }
        ParamType::Integer => {
            let i = value.as_i64().ok_or_else(|| type_err(spec, "integer"))?;
            check_numeric(spec, i as f64)?;
            Ok(ArgValue::Integer(i))
        }
        ParamType::Float => {
            let f = value.as_f64().ok_or_else(|| type_err(spec, "float"))?;
            check_numeric(spec, f)?;
            Ok(ArgValue::Float(f))
        }
        ParamType::Boolean => {
            let b = value.as_bool().ok_or_else(|| type_err(spec, "boolean"))?;
            Ok(ArgValue::Boolean(b))
        }
        ParamType::Duration => {
            let d = parse_value_duration(&value).ok_or_else(|| type_err(spec, "duration"))?;
            Ok(ArgValue::Duration(d))
        }
        ParamType::Enum => {
            let s = value.as_str().ok_or_else(|| type_err(spec, "enum"))?.to_string();
            if let Some(e) = spec.constraints.enum_.as_ref() {
                if !e.is_member(&s) {
                    return Err(constraint_err(spec, format!("'{s}' is not a member of this enum")));
                }
            }
            Ok(ArgValue::String(s))
        }
        ParamType::ScrubMode => {
            let s = value.as_str().ok_or_else(|| type_err(spec, "scrub-mode"))?.to_string();
            if !matches!(s.as_str(), "none" | "stdin" | "stdout" | "both") {
                return Err(constraint_err(spec, format!("'{s}' is not a valid scrub mode")));
            }
            Ok(ArgValue::String(s))
        }
        ParamType::AuthHandle | ParamType::SecretHandle => {
            let s = value.as_str().ok_or_else(|| type_err(spec, "handle"))?.to_string();
            Ok(ArgValue::Handle(s))
        }
        ParamType::Object => {
            let obj = value.as_object().ok_or_else(|| type_err(spec, "object"))?;
            let mut out = BTreeMap::new();
            if let Some(oc) = spec.constraints.object.as_ref() {
                for required in &oc.required {
                    if !obj.contains_key(required) {
                        return Err(constraint_err(spec, format!("missing required field '{required}'")));
                    }
                }
                for (key, val) in obj {
                    match oc.fields.get(key) {
                        Some(field_spec) => {
                            out.insert(key.clone(), validate_param(field_spec, val.clone(), warnings)?);
                        }
                        None if oc.additional_properties => {
                            out.insert(key.clone(), loose_arg_value(val));
                        }
                        None => {
                            return Err(constraint_err(spec, format!("unexpected field '{key}'")));
                        }
                    }
                }
            } else {
                for (key, val) in obj {
                    out.insert(key.clone(), loose_arg_value(val));
                }
            }
            Ok(ArgValue::Object(out))
        }
        ParamType::Array => {
            let arr = value.as_array().ok_or_else(|| type_err(spec, "array"))?;
            check_length(spec, arr.len())?;
            let Some(ac) = spec.constraints.array.as_ref() else {
                return Err(constraint_err(spec, "array parameter has no element schema"));
            };
            let mut out = Vec::with_capacity(arr.len());
            for item in arr {
                out.push(validate_param(&ac.element, item.clone(), warnings)?);
            }
            if ac.unique {
                for i in 0..out.len() {
                    for j in (i + 1)..out.len() {
                        if out[i] == out[j] {
                            return Err(constraint_err(spec, "array elements must be unique"));
                        }
                    }
                }
            }
            Ok(ArgValue::Array(out))
        }
    }
}

fn loose_arg_value(value: &Value) -> ArgValue {
    match value {
        Value::String(s) => ArgValue::String(s.clone()),
        Value::Bool(b) => ArgValue::Boolean(*b),
        Value::Number(n) => n
            .as_i64()
            .map(ArgValue::Integer)
            .unwrap_or_else(|| ArgValue::Float(n.as_f64().unwrap_or_default())),
        Value::Array(items) => ArgValue::Array(items.iter().map(loose_arg_value).collect()),
        Value::Object(map) => ArgValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), loose_arg_value(v)))
                .collect(),
        ),
        Value::Null => ArgValue::String(String::new()),
    }
}

fn parse_value_duration(value: &Value) -> Option<Duration> {
    match value {
        Value::String(s) => parse_duration(s),
        Value::Number(n) => n.as_f64().map(Duration::from_secs_f64),
        _ => None,
    }
}

fn type_err(spec: &ParamSpec, expected: &str) -> OpalError {
    OpalError::new(
        ErrorCode::DecodeConstraintViolation,
        format!("parameter '{}' expects a {expected} value", spec.name),
    )
}

fn constraint_err(spec: &ParamSpec, message: impl Into<String>) -> OpalError {
    OpalError::new(
        ErrorCode::DecodeConstraintViolation,
        format!("parameter '{}': {}", spec.name, message.into()),
    )
}

fn check_length(spec: &ParamSpec, len: usize) -> Result<(), OpalError> {
    if let Some(bounds) = spec.constraints.length.as_ref() {
        if let Some(min) = bounds.min {
            if len < min {
                return Err(constraint_err(spec, format!("length {len} is below minimum {min}")));
            }
        }
        if let Some(max) = bounds.max {
            if len > max {
                return Err(constraint_err(spec, format!("length {len} exceeds maximum {max}")));
            }
        }
    }
    Ok(())
}

fn check_numeric(spec: &ParamSpec, value: f64) -> Result<(), OpalError> {
    if let Some(bounds) = spec.constraints.numeric.as_ref() {
        if let Some(min) = bounds.min {
            if value < min {
                return Err(constraint_err(spec, format!("{value} is below minimum {min}")));
            }
        }
        if let Some(max) = bounds.max {
            if value > max {
                return Err(constraint_err(spec, format!("{value} exceeds maximum {max}")));
            }
        }
    }
    Ok(())
}

fn check_pattern(spec: &ParamSpec, s: &str) -> Result<(), OpalError> {
    if let Some(pattern) = spec.constraints.pattern.as_ref() {
        if !pattern.regex().is_match(s) {
            return Err(constraint_err(spec, format!("'{s}' does not match pattern {}", pattern.as_str())));
        }
    }
    Ok(())
}

fn check_format(spec: &ParamSpec, s: &str) -> Result<(), OpalError> {
    if let Some(format) = spec.constraints.format {
        if !matches_format(format, s) {
            return Err(constraint_err(spec, format!("'{s}' does not match format {format:?}")));
        }
    }
    Ok(())
}

fn matches_format(format: Format, s: &str) -> bool {
    fn regex_for(pattern: &'static str, cell: &'static OnceLock<regex::Regex>) -> &'static regex::Regex {
        cell.get_or_init(|| regex::Regex::new(pattern).expect("static format pattern compiles"))
    }

    static URI: OnceLock<regex::Regex> = OnceLock::new();
    static HOSTNAME: OnceLock<regex::Regex> = OnceLock::new();
    static IPV4: OnceLock<regex::Regex> = OnceLock::new();
    static IPV6: OnceLock<regex::Regex> = OnceLock::new();
    static EMAIL: OnceLock<regex::Regex> = OnceLock::new();
    static CIDR: OnceLock<regex::Regex> = OnceLock::new();
    static SEMVER: OnceLock<regex::Regex> = OnceLock::new();

    match format {
        Format::Uri => regex_for(r"^[a-zA-Z][a-zA-Z0-9+.-]*://\S+$", &URI).is_match(s),
        Format::Hostname => regex_for(
            r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
            &HOSTNAME,
        )
        .is_match(s),
        Format::Ipv4 => {
            regex_for(r"^(\d{1,3}\.){3}\d{1,3}$", &IPV4).is_match(s)
                && s.split('.').all(|octet| octet.parse::<u8>().is_ok())
        }
        Format::Ipv6 => regex_for(r"^[0-9a-fA-F:]+$", &IPV6).is_match(s) && s.contains(':'),
        Format::Email => regex_for(r"^[^\s@]+@[^\s@]+\.[^\s@]+$", &EMAIL).is_match(s),
        Format::Cidr => regex_for(r"^(\d{1,3}\.){3}\d{1,3}/\d{1,2}$", &CIDR).is_match(s),
        Format::Semver => regex_for(
            r"^\d+\.\d+\.\d+(-[0-9A-Za-z.-]+)?(\+[0-9A-Za-z.-]+)?$",
            &SEMVER,
        )
        .is_match(s),
        Format::Duration => parse_duration(s).is_some(),
    }
}
