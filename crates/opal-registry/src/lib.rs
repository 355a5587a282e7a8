// SPDX-License-Identifier: MIT OR Apache-2.0
//! Path-keyed decorator registry with role inference and batch value
//! resolution.
//!
//! This crate is the structural hub of the runtime: it owns the shared
//! contract types every other component implements against —
//! [`Session`](session::Session) (the execution-environment abstraction
//! `opal-session` implements concretely), [`ExecNode`](exec::ExecNode) (the
//! composition unit `opal-exec`'s wrappers build), and
//! [`ValueCall`]/[`ValueResult`]/[`EvalContext`] (the value-resolution
//! vocabulary `opal-resolve`'s providers use) and [`SecretHandle`] (the
//! deterministic secret-id factory value resolution tags its results
//! with) — alongside the four capability interfaces ([`Provider`],
//! [`Wrapper`], [`Boundary`], [`Endpoint`]) a decorator implementation may
//! satisfy.
//!
//! Consolidating these contracts here (rather than splitting each into its
//! "natural" component crate) keeps the dependency graph acyclic: the
//! heavier session/resolve/exec crates depend downward on this one instead
//! of it depending upward on them.

#![warn(missing_docs)]

mod batch;
mod capability;
mod exec;
mod registry;
mod resolve;
mod secret;
mod session;
mod types;

pub use batch::resolve_values;
pub use capability::{infer_roles, Boundary, Decorator, Endpoint, Provider, Role, Wrapper};
pub use exec::{ExecNode, ExecResult};
pub use registry::{Registry, RegistryEntry};
pub use resolve::{CallError, EvalContext, ValueCall, ValueResult};
pub use secret::{derive_display_id, SecretHandle, SecretIdFactory};
pub use session::{RunOptions, RunResult, Session};
pub use types::{CanonicalArgs, ExitOutcome};
