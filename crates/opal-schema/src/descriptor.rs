//! The registered shape of a decorator: its parameter schema plus its
//! declared capabilities.

use crate::param::ParamSpec;
use crate::types::{BlockRequirement, IoSemantics, TransportScope};
use std::collections::BTreeMap;

/// A decorator's parameter schema: the name-keyed parameter map, the
/// declaration order (used for positional binding), the designated primary
/// parameter, and the deprecated-alias map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    /// Parameter name → spec.
    pub params: BTreeMap<String, ParamSpec>,
    /// Declaration order, preserved for positional binding.
    pub order: Vec<String>,
    /// The single parameter nominated as primary, if any.
    pub primary: Option<String>,
    /// Deprecated alias name → canonical parameter name.
    pub deprecated_aliases: BTreeMap<String, String>,
}

impl Schema {
    /// Look up a parameter by name, resolving a deprecated alias first.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&ParamSpec> {
        if let Some(canonical) = self.deprecated_aliases.get(name) {
            return self.params.get(canonical);
        }
        self.params.get(name)
    }

    /// Parameters in declaration order, required parameters first.
    ///
    /// This is the "positional binding order" used by the decoder: all
    /// required parameters in declaration order, followed by all optional
    /// parameters in declaration order.
    #[must_use]
    pub fn positional_binding_order(&self) -> Vec<&str> {
        let mut required = Vec::new();
        let mut optional = Vec::new();
        for name in &self.order {
            let Some(spec) = self.params.get(name) else {
                continue;
            };
            if spec.required {
                required.push(name.as_str());
            } else {
                optional.push(name.as_str());
            }
        }
        required.extend(optional);
        required
    }
}

/// Declared capabilities of a decorator: transport scope, purity,
/// idempotence, block requirement, and I/O semantics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capabilities {
    /// Locality class this decorator may run under.
    pub transport_scope: TransportScope,
    /// Whether behavior differs meaningfully across transports.
    pub transport_sensitive: bool,
    /// Whether repeated invocation with the same params has no side effects.
    pub pure: bool,
    /// Whether repeated invocation is safe to retry without side effects.
    pub idempotent: bool,
    /// Whether a trailing child block is forbidden/optional/required.
    pub block_requirement: BlockRequirement,
    /// Declared I/O semantics.
    pub io: IoSemantics,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            transport_scope: TransportScope::Any,
            transport_sensitive: false,
            pure: false,
            idempotent: false,
            block_requirement: BlockRequirement::Forbidden,
            io: IoSemantics::default(),
        }
    }
}

/// A fully built, immutable decorator descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    /// Dotted registration path (e.g. `env`, `aws.s3.object`).
    pub path: String,
    /// One-line summary.
    pub summary: String,
    /// Argument schema.
    pub schema: Schema,
    /// Return schema for value decorators, if applicable.
    pub return_schema: Option<Schema>,
    /// Declared capabilities.
    pub capabilities: Capabilities,
}
