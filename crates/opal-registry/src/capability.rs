//! The four capability interfaces a decorator implementation may satisfy,
//! and the role each implies.
//!
//! Roles are derived, never declared: a registrant exposes itself through
//! [`Decorator`]'s `as_*` query methods, and [`crate::registry::Registry`]
//! infers the role set by checking which return `Some`.

use crate::exec::ExecNode;
use crate::resolve::{EvalContext, ValueCall, ValueResult};
use crate::session::Session;
use crate::types::CanonicalArgs;
use async_trait::async_trait;
use opal_error::OpalError;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// A behavioral capability inferred at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// Implements value resolution.
    Provider,
    /// Implements execution wrapping.
    Wrapper,
    /// Implements session opening.
    Boundary,
    /// Implements I/O redirection.
    Endpoint,
}

/// Resolves a batch of same-path calls to their values, in a single round
/// trip where the provider supports coalescing (e.g. a secrets store).
#[async_trait]
pub trait Provider: Send + Sync {
    /// Resolve `calls` (all sharing one dotted path), returning exactly one
    /// result per call in the same order.
    async fn resolve_batch(&self, ctx: &EvalContext, calls: &[ValueCall]) -> Vec<ValueResult>;
}

/// Wraps an inner execution node, applying a policy (retry, timeout,
/// parallel) before or around delegating to it.
pub trait Wrapper: Send + Sync {
    /// Build a node that applies this decorator's effect and delegates to
    /// `next`.
    fn wrap(&self, next: Arc<dyn ExecNode>, params: &CanonicalArgs) -> Arc<dyn ExecNode>;
}

/// Opens a session, e.g. an SSH transport decorator.
#[async_trait]
pub trait Boundary: Send + Sync {
    /// Open (or retrieve from the pool) a session for `params`.
    async fn open_session(&self, ctx: &EvalContext, params: &CanonicalArgs) -> Result<Arc<dyn Session>, OpalError>;
}

/// Provides a readable or writable I/O redirection target.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Open a readable stream, if this endpoint supports input redirection.
    async fn open_read(
        &self,
        ctx: &EvalContext,
        params: &CanonicalArgs,
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>, OpalError>;

    /// Open a writable stream, if this endpoint supports output redirection.
    async fn open_write(
        &self,
        ctx: &EvalContext,
        params: &CanonicalArgs,
    ) -> Result<Box<dyn AsyncWrite + Send + Unpin>, OpalError>;
}

/// The base trait every registrant implements. Multi-role decorators are
/// explicitly permitted: a cloud-object decorator, for example, is both a
/// [`Provider`] (returns metadata) and an [`Endpoint`] (opens streams).
///
/// Default methods return `None`; implementors override only the ones
/// matching the roles they support.
pub trait Decorator: Send + Sync {
    /// Capability query: value resolution.
    fn as_provider(&self) -> Option<&dyn Provider> {
        None
    }
    /// Capability query: execution wrapping.
    fn as_wrapper(&self) -> Option<&dyn Wrapper> {
        None
    }
    /// Capability query: session opening.
    fn as_boundary(&self) -> Option<&dyn Boundary> {
        None
    }
    /// Capability query: I/O redirection.
    fn as_endpoint(&self) -> Option<&dyn Endpoint> {
        None
    }
}

/// Infer the [`Role`] set a registrant satisfies by probing its capability
/// query methods.
#[must_use]
pub fn infer_roles(decorator: &dyn Decorator) -> std::collections::BTreeSet<Role> {
    let mut roles = std::collections::BTreeSet::new();
    if decorator.as_provider().is_some() {
        roles.insert(Role::Provider);
    }
    if decorator.as_wrapper().is_some() {
        roles.insert(Role::Wrapper);
    }
    if decorator.as_boundary().is_some() {
        roles.insert(Role::Boundary);
    }
    if decorator.as_endpoint().is_some() {
        roles.insert(Role::Endpoint);
    }
    roles
}
