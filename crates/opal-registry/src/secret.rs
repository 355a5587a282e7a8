//! Deterministic secret-handle derivation (`spec.md` §4.E, §9).
//!
//! The registry tags resolved values believed to be secrets with an opaque
//! handle and a display id. The display id must be deterministic from
//! `(plan_hash, step_path, call_index)` so two plans computed from the
//! same inputs produce identical ids; the opaque handle itself only needs
//! to be unique per process.

use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// An opaque reference to a secret value. Never exposes the underlying
/// value or its own UUID through `Debug`/`Display` — only the display id.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretHandle {
    id: Uuid,
    display_id: String,
}

impl SecretHandle {
    /// Mint a handle for the secret produced by `call_index` within
    /// `step_path` of the plan identified by `plan_hash`.
    #[must_use]
    pub fn new(plan_hash: &str, step_path: &str, call_index: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_id: derive_display_id(plan_hash, step_path, call_index),
        }
    }

    /// The deterministic, audit-safe display id (e.g. in logs or error
    /// messages). Never the value itself.
    #[must_use]
    pub fn display_id(&self) -> &str {
        &self.display_id
    }

    /// The process-local opaque handle, used to look the real value back
    /// up in a secret store. Not guaranteed stable across processes or
    /// plan re-evaluations.
    #[must_use]
    pub fn opaque_id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Debug for SecretHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretHandle({})", self.display_id)
    }
}

/// Derive the deterministic display id for `(plan_hash, step_path,
/// call_index)`.
#[must_use]
pub fn derive_display_id(plan_hash: &str, step_path: &str, call_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plan_hash.as_bytes());
    hasher.update(b"\0");
    hasher.update(step_path.as_bytes());
    hasher.update(b"\0");
    hasher.update(call_index.to_le_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(12);
    for byte in &digest[..6] {
        hex.push_str(&format!("{byte:02x}"));
    }
    format!("sec_{hex}")
}

/// Mints [`SecretHandle`]s for every value-resolution call made within one
/// [`EvalContext`](crate::resolve::EvalContext), scoped to that context's
/// plan hash and step path.
#[derive(Clone)]
pub struct SecretIdFactory {
    plan_hash: String,
    step_path: String,
}

impl SecretIdFactory {
    #[must_use]
    pub(crate) fn new(plan_hash: impl Into<String>, step_path: impl Into<String>) -> Self {
        Self {
            plan_hash: plan_hash.into(),
            step_path: step_path.into(),
        }
    }

    /// Mint the handle for the call at `call_index` within this factory's
    /// scope.
    #[must_use]
    pub fn handle(&self, call_index: usize) -> SecretHandle {
        SecretHandle::new(&self.plan_hash, &self.step_path, call_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_produce_identical_display_ids() {
        let a = derive_display_id("hash1", "steps.0", 2);
        let b = derive_display_id("hash1", "steps.0", 2);
        assert_eq!(a, b);
    }

    #[test]
    fn different_call_index_produces_different_display_id() {
        let a = derive_display_id("hash1", "steps.0", 0);
        let b = derive_display_id("hash1", "steps.0", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn handles_for_the_same_coordinates_share_a_display_id_but_distinct_opaque_ids() {
        let a = SecretHandle::new("hash1", "steps.0", 0);
        let b = SecretHandle::new("hash1", "steps.0", 0);
        assert_eq!(a.display_id(), b.display_id());
        assert_ne!(a.opaque_id(), b.opaque_id());
    }

    #[test]
    fn debug_never_prints_the_opaque_id() {
        let handle = SecretHandle::new("hash1", "steps.0", 0);
        let rendered = format!("{handle:?}");
        assert!(!rendered.contains(&handle.opaque_id().to_string()));
        assert!(rendered.contains(handle.display_id()));
    }

    #[test]
    fn factory_mints_handles_scoped_to_its_own_coordinates() {
        let factory = SecretIdFactory::new("hash1", "steps.0");
        let handle = factory.handle(3);
        assert_eq!(handle.display_id(), derive_display_id("hash1", "steps.0", 3));
    }
}
