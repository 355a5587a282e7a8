//! A single parameter's declared shape: type, requiredness, default, and
//! constraints.

use crate::constraint::Constraints;
use crate::types::ParamType;
use serde_json::Value;

/// The full declared shape of one decorator parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Semantic type.
    pub param_type: ParamType,
    /// Whether the parameter must be supplied (directly, or have a default).
    pub required: bool,
    /// Default value, if any. Mutually exclusive with `required`.
    pub default: Option<Value>,
    /// Example values, for documentation/introspection only.
    pub examples: Vec<Value>,
    /// Type-specific constraints.
    pub constraints: Constraints,
}

impl ParamSpec {
    /// Construct a bare parameter spec with no constraints, not required,
    /// and no default.
    #[must_use]
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            default: None,
            examples: Vec::new(),
            constraints: Constraints::default(),
        }
    }
}
