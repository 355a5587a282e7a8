//! Value-resolution contracts (`spec.md` §4.E): batch calls into a value
//! decorator and the ambient context they run under.

use crate::secret::SecretIdFactory;
use crate::session::Session;
use crate::types::CanonicalArgs;
use opal_error::ErrorCode;
use opal_schema::TransportScope;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

/// One call into a value decorator, part of a same-path batch.
#[derive(Debug, Clone)]
pub struct ValueCall {
    /// Dotted decorator path this call targets.
    pub path: String,
    /// Decoded, validated arguments for this call.
    pub args: CanonicalArgs,
    /// This call's position within its batch (used for deterministic
    /// secret display-id derivation).
    pub call_index: usize,
}

/// A lightweight, cloneable error snapshot carried per-call in a
/// [`ValueResult`] — a full [`opal_error::OpalError`] isn't `Clone` because
/// it may box an arbitrary source error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallError {
    /// Stable error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// The outcome of resolving a single [`ValueCall`].
#[derive(Debug, Clone)]
pub struct ValueResult {
    /// The raw resolved value.
    pub raw: serde_json::Value,
    /// Human-readable audit label (e.g. `"env:HOME"`).
    pub origin: String,
    /// Per-call error; non-fatal to sibling calls in the same batch.
    pub error: Option<CallError>,
    /// Present when the registry has tagged this value as a secret, per
    /// the resolved decorator's declared return type.
    pub secret: Option<crate::secret::SecretHandle>,
}

impl ValueResult {
    /// Construct a successful result.
    #[must_use]
    pub fn ok(raw: serde_json::Value, origin: impl Into<String>) -> Self {
        Self {
            raw,
            origin: origin.into(),
            error: None,
            secret: None,
        }
    }

    /// Construct a failed result carrying only an error.
    #[must_use]
    pub fn err(origin: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            raw: serde_json::Value::Null,
            origin: origin.into(),
            error: Some(CallError {
                code,
                message: message.into(),
            }),
            secret: None,
        }
    }

    /// Attach a secret handle, marking this result as a tagged secret.
    #[must_use]
    pub fn tag_secret(mut self, handle: crate::secret::SecretHandle) -> Self {
        self.secret = Some(handle);
        self
    }
}

/// The ambient context a value resolution or execution node runs under:
/// the current session, the variable store (primary source of truth for
/// `@var`), a secret-id factory, the plan hash, the current step path, and
/// a telemetry span.
#[derive(Clone)]
pub struct EvalContext {
    /// The session value decorators and execution nodes run against.
    pub session: Arc<dyn Session>,
    /// In-memory variable store shared across the plan.
    pub variables: Arc<RwLock<BTreeMap<String, serde_json::Value>>>,
    /// Hash identifying the compiled plan, for deterministic secret ids.
    pub plan_hash: String,
    /// Dotted path of the current step within the plan.
    pub step_path: String,
    /// The transport scope calls in this context are evaluated under.
    pub transport_scope: TransportScope,
    /// Mints deterministic secret handles for value-resolution calls made
    /// within this context's step path.
    pub secret_ids: SecretIdFactory,
    /// Telemetry span covering evaluation at this step. Execution nodes
    /// and providers may enter it to correlate their own events.
    pub span: tracing::Span,
    /// Cooperative cancellation for work performed under this context.
    /// Wrappers that introduce a deadline (e.g. `@timeout`) derive a child
    /// token from this one rather than replacing it outright.
    pub cancel: CancellationToken,
}

impl EvalContext {
    /// Construct a context rooted at `session`.
    #[must_use]
    pub fn new(session: Arc<dyn Session>, plan_hash: impl Into<String>, step_path: impl Into<String>) -> Self {
        let transport_scope = session.transport_scope();
        let plan_hash = plan_hash.into();
        let step_path = step_path.into();
        let span = tracing::info_span!(target: "opal.eval", "step", plan_hash = %plan_hash, step_path = %step_path);
        let secret_ids = SecretIdFactory::new(plan_hash.clone(), step_path.clone());
        Self {
            session,
            variables: Arc::new(RwLock::new(BTreeMap::new())),
            plan_hash,
            step_path,
            transport_scope,
            secret_ids,
            span,
            cancel: CancellationToken::new(),
        }
    }

    /// Return a context with the same session/variables but a different
    /// step path, used when descending into a nested block. Derives a
    /// fresh secret-id factory and telemetry span scoped to the new path,
    /// but shares the same cancellation lineage.
    #[must_use]
    pub fn with_step_path(&self, step_path: impl Into<String>) -> Self {
        let step_path = step_path.into();
        let span = tracing::info_span!(target: "opal.eval", "step", plan_hash = %self.plan_hash, step_path = %step_path);
        let secret_ids = SecretIdFactory::new(self.plan_hash.clone(), step_path.clone());
        Self {
            session: self.session.clone(),
            variables: self.variables.clone(),
            plan_hash: self.plan_hash.clone(),
            step_path,
            transport_scope: self.transport_scope,
            secret_ids,
            span,
            cancel: self.cancel.clone(),
        }
    }
}
