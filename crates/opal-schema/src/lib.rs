// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed parameter schema and fluent descriptor builder for Opal decorators.
//!
//! A decorator advertises a [`Descriptor`]: a dotted path, a one-line
//! summary, a [`Schema`] of named parameters (with a declaration order for
//! positional binding and an optional primary parameter), and declared
//! [`Capabilities`] (transport scope, purity, idempotence, block
//! requirement, I/O semantics). Descriptors are assembled with
//! [`DescriptorBuilder`], which never panics — guardrail violations
//! accumulate and surface together from [`DescriptorBuilder::build`].

#![warn(missing_docs)]

mod builder;
mod constraint;
mod descriptor;
mod param;
mod types;

pub use builder::{DescriptorBuilder, ParamBuilder};
pub use constraint::{ArrayConstraint, Constraints, EnumConstraint, LengthBounds, NumericBounds, ObjectConstraint, PatternConstraint};
pub use descriptor::{Capabilities, Descriptor, Schema};
pub use param::ParamSpec;
pub use types::{BlockRequirement, Format, IoSemantics, ParamType, ScrubMode, TransportScope};
