//! Fluent, panic-free descriptor builder.
//!
//! Each parameter-adder ([`DescriptorBuilder::param`]) returns a sub-builder
//! ([`ParamBuilder`]) whose terminal [`ParamBuilder::commit`] pushes the
//! parameter into both the name-keyed map and the declaration-order list,
//! then hands the outer builder back. Guardrail violations never panic —
//! they accumulate as problems surfaced together at [`DescriptorBuilder::build`].

use crate::constraint::{ArrayConstraint, Constraints, EnumConstraint, LengthBounds, NumericBounds, ObjectConstraint, PatternConstraint};
use crate::descriptor::{Capabilities, Descriptor, Schema};
use crate::param::ParamSpec;
use crate::types::{BlockRequirement, Format, IoSemantics, ParamType, ScrubMode, TransportScope};
use opal_error::{ErrorCode, OpalError};
use serde_json::Value;
use std::collections::BTreeMap;

/// Builds a [`Descriptor`] incrementally.
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    path: String,
    summary: String,
    params: BTreeMap<String, ParamSpec>,
    order: Vec<String>,
    primary: Option<String>,
    deprecated_aliases: BTreeMap<String, String>,
    return_schema: Option<Schema>,
    capabilities: Capabilities,
    scrub_default_override: Option<ScrubMode>,
    problems: Vec<String>,
}

impl DescriptorBuilder {
    /// Start building a descriptor registered under `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            summary: String::new(),
            params: BTreeMap::new(),
            order: Vec::new(),
            primary: None,
            deprecated_aliases: BTreeMap::new(),
            return_schema: None,
            capabilities: Capabilities::default(),
            scrub_default_override: None,
            problems: Vec::new(),
        }
    }

    /// Set the one-line summary.
    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Declare a deprecated alias: calls using `alias` are rewritten to
    /// `canonical` with a warning at decode time.
    #[must_use]
    pub fn deprecated_alias(mut self, alias: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.deprecated_aliases.insert(alias.into(), canonical.into());
        self
    }

    /// Set the transport scope.
    #[must_use]
    pub fn transport_scope(mut self, scope: TransportScope) -> Self {
        self.capabilities.transport_scope = scope;
        self
    }

    /// Mark the decorator as transport-sensitive.
    #[must_use]
    pub fn transport_sensitive(mut self, sensitive: bool) -> Self {
        self.capabilities.transport_sensitive = sensitive;
        self
    }

    /// Mark the decorator as pure.
    #[must_use]
    pub fn pure(mut self, pure: bool) -> Self {
        self.capabilities.pure = pure;
        self
    }

    /// Mark the decorator as idempotent.
    #[must_use]
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.capabilities.idempotent = idempotent;
        self
    }

    /// Set the child-block requirement.
    #[must_use]
    pub fn block_requirement(mut self, requirement: BlockRequirement) -> Self {
        self.capabilities.block_requirement = requirement;
        self
    }

    /// Declare I/O semantics. Declaring any direction causes `build()` to
    /// auto-add the `scrub` parameter.
    #[must_use]
    pub fn io(mut self, io: IoSemantics) -> Self {
        self.capabilities.io = io;
        self
    }

    /// Override the auto-derived default for the `scrub` parameter.
    #[must_use]
    pub fn scrub_default(mut self, mode: ScrubMode) -> Self {
        self.scrub_default_override = Some(mode);
        self
    }

    /// Set the return schema (value decorators only).
    #[must_use]
    pub fn return_schema(mut self, schema: Schema) -> Self {
        self.return_schema = Some(schema);
        self
    }

    /// Begin adding a parameter named `name` of type `ty`.
    #[must_use]
    pub fn param(self, name: impl Into<String>, ty: ParamType) -> ParamBuilder {
        ParamBuilder {
            outer: self,
            spec: ParamSpec::new(name, ty),
            is_primary: false,
        }
    }

    fn push_param(&mut self, spec: ParamSpec, is_primary: bool) {
        if spec.required && spec.default.is_some() {
            self.problems.push(format!(
                "parameter '{}' is required and also carries a default",
                spec.name
            ));
        }

        if let Some(ref numeric) = spec.constraints.numeric {
            if let (Some(min), Some(max)) = (numeric.min, numeric.max) {
                if min > max {
                    self.problems.push(format!(
                        "parameter '{}' has min ({min}) greater than max ({max})",
                        spec.name
                    ));
                }
            }
        }

        if let Some(ref length) = spec.constraints.length {
            if let (Some(min), Some(max)) = (length.min, length.max) {
                if min > max {
                    self.problems.push(format!(
                        "parameter '{}' has length min ({min}) greater than max ({max})",
                        spec.name
                    ));
                }
            }
        }

        if let Some(ref e) = spec.constraints.enum_ {
            if e.values.is_empty() {
                self.problems
                    .push(format!("parameter '{}' declares an empty enum", spec.name));
            }
            if let Some(ref default) = spec.default {
                if let Some(s) = default.as_str() {
                    if !e.is_member(s) {
                        self.problems.push(format!(
                            "parameter '{}' default '{s}' is not an enum member",
                            spec.name
                        ));
                    }
                }
            }
            for (source, replacement) in &e.deprecated {
                if e.is_member(source) {
                    self.problems.push(format!(
                        "parameter '{}' deprecated enum value '{source}' is also a current member",
                        spec.name
                    ));
                }
                if !e.is_member(replacement) {
                    self.problems.push(format!(
                        "parameter '{}' deprecated enum value '{source}' replacement '{replacement}' is not a current member",
                        spec.name
                    ));
                }
            }
        }

        if let Some(ref obj) = spec.constraints.object {
            for required_field in &obj.required {
                if !obj.fields.contains_key(required_field) {
                    self.problems.push(format!(
                        "parameter '{}' required field '{required_field}' has no field schema",
                        spec.name
                    ));
                }
            }
        }

        if matches!(spec.param_type, ParamType::Array) && spec.constraints.array.is_none() {
            self.problems
                .push(format!("parameter '{}' is an array with no element schema", spec.name));
        }

        if is_primary {
            if self.primary.is_some() {
                self.problems
                    .push(format!("descriptor already has a primary parameter, cannot add '{}'", spec.name));
            } else if spec.param_type != ParamType::String {
                self.problems.push(format!(
                    "primary parameter '{}' must be of type string",
                    spec.name
                ));
            } else if !spec.required {
                self.problems
                    .push(format!("primary parameter '{}' must be required", spec.name));
            } else {
                self.primary = Some(spec.name.clone());
            }
        }

        if self.params.contains_key(&spec.name) {
            self.problems
                .push(format!("parameter '{}' declared more than once", spec.name));
        }

        // The primary parameter is always first in declaration order,
        // regardless of the order `.param()` calls were made in.
        if self.primary.as_deref() == Some(spec.name.as_str()) {
            self.order.insert(0, spec.name.clone());
        } else {
            self.order.push(spec.name.clone());
        }
        self.params.insert(spec.name.clone(), spec);
    }

    /// Finish building, returning the [`Descriptor`] or an aggregate error
    /// describing every guardrail violation encountered.
    pub fn build(mut self) -> Result<Descriptor, OpalError> {
        if self.capabilities.io.any_io() && !self.params.contains_key("scrub") {
            let default_mode = self
                .scrub_default_override
                .unwrap_or_else(|| self.capabilities.io.default_scrub_mode());
            let default_str = match default_mode {
                ScrubMode::None => "none",
                ScrubMode::Stdin => "stdin",
                ScrubMode::Stdout => "stdout",
                ScrubMode::Both => "both",
            };
            let scrub_spec = ParamSpec {
                name: "scrub".to_string(),
                param_type: ParamType::Enum,
                required: false,
                default: Some(Value::String(default_str.to_string())),
                examples: Vec::new(),
                constraints: Constraints {
                    enum_: Some(EnumConstraint {
                        values: vec![
                            "none".to_string(),
                            "stdin".to_string(),
                            "stdout".to_string(),
                            "both".to_string(),
                        ],
                        deprecated: BTreeMap::new(),
                    }),
                    ..Constraints::default()
                },
            };
            self.order.push(scrub_spec.name.clone());
            self.params.insert(scrub_spec.name.clone(), scrub_spec);
        }

        if !self.problems.is_empty() {
            return Err(OpalError::new(
                ErrorCode::SchemaInvalidDescriptor,
                format!("descriptor '{}' failed validation", self.path),
            )
            .with_context("problems", self.problems));
        }

        Ok(Descriptor {
            path: self.path,
            summary: self.summary,
            schema: Schema {
                params: self.params,
                order: self.order,
                primary: self.primary,
                deprecated_aliases: self.deprecated_aliases,
            },
            return_schema: self.return_schema,
            capabilities: self.capabilities,
        })
    }
}

/// Sub-builder for a single parameter, returned by [`DescriptorBuilder::param`].
#[derive(Debug, Clone)]
pub struct ParamBuilder {
    outer: DescriptorBuilder,
    spec: ParamSpec,
    is_primary: bool,
}

impl ParamBuilder {
    /// Mark this parameter required. Conflicts with [`Self::default`] are
    /// reported at `.build()`, not here.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.spec.required = true;
        self
    }

    /// Mark this parameter as the descriptor's primary parameter.
    ///
    /// Implies required; the type-is-string and at-most-one-primary
    /// guardrails are enforced at commit.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self.spec.required = true;
        self
    }

    /// Set a default value.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.spec.default = Some(value.into());
        self
    }

    /// Attach an example value (documentation only).
    #[must_use]
    pub fn example(mut self, value: impl Into<Value>) -> Self {
        self.spec.examples.push(value.into());
        self
    }

    /// Set length bounds (strings, arrays).
    #[must_use]
    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.spec.constraints.length = Some(LengthBounds { min, max });
        self
    }

    /// Set numeric bounds (integers, floats).
    #[must_use]
    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.spec.constraints.numeric = Some(NumericBounds { min, max });
        self
    }

    /// Set a regex pattern constraint (strings). An invalid pattern is
    /// recorded as a build problem rather than panicking immediately.
    #[must_use]
    pub fn pattern(mut self, pattern: &str) -> Self {
        match PatternConstraint::compile(pattern) {
            Some(compiled) => self.spec.constraints.pattern = Some(compiled),
            None => self.outer.problems.push(format!(
                "parameter '{}' has an invalid regex pattern: {pattern}",
                self.spec.name
            )),
        }
        self
    }

    /// Set a named format constraint (strings).
    #[must_use]
    pub fn format(mut self, format: Format) -> Self {
        self.spec.constraints.format = Some(format);
        self
    }

    /// Declare enum membership.
    #[must_use]
    pub fn enum_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.spec.constraints.enum_.get_or_insert_with(EnumConstraint::default);
        entry.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Declare a deprecated enum value and its replacement.
    #[must_use]
    pub fn deprecated_enum_value(mut self, source: impl Into<String>, replacement: impl Into<String>) -> Self {
        let entry = self.spec.constraints.enum_.get_or_insert_with(EnumConstraint::default);
        entry.deprecated.insert(source.into(), replacement.into());
        self
    }

    /// Declare an object field map, required fields, and open/closed
    /// discipline.
    #[must_use]
    pub fn object_fields(
        mut self,
        fields: BTreeMap<String, ParamSpec>,
        required: Vec<String>,
        additional_properties: bool,
    ) -> Self {
        self.spec.constraints.object = Some(ObjectConstraint {
            fields,
            required,
            additional_properties,
        });
        self
    }

    /// Declare an array element schema and uniqueness requirement.
    #[must_use]
    pub fn array_element(mut self, element: ParamSpec, unique: bool) -> Self {
        self.spec.constraints.array = Some(ArrayConstraint {
            element: Box::new(element),
            unique,
        });
        self
    }

    /// Commit this parameter into the outer builder's name-keyed map and
    /// declaration-order list, returning the outer builder.
    #[must_use]
    pub fn commit(self) -> DescriptorBuilder {
        let mut outer = self.outer;
        outer.push_param(self.spec, self.is_primary);
        outer
    }
}
