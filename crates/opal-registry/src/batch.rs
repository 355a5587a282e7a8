//! The registry's high-level value-resolution entry point (`spec.md`
//! §4.C): locate, verify capability, enforce scope, batch-resolve, and
//! check the result-count invariant.

use crate::capability::Role;
use crate::registry::Registry;
use crate::resolve::{EvalContext, ValueCall, ValueResult};
use opal_error::{ErrorCode, OpalError};
use opal_schema::{Descriptor, ParamType};

/// Resolve a batch of [`ValueCall`]s, all for the same dotted path.
pub async fn resolve_values(registry: &Registry, ctx: &EvalContext, calls: &[ValueCall]) -> Result<Vec<ValueResult>, OpalError> {
    let Some(first) = calls.first() else {
        return Ok(Vec::new());
    };

    if calls.iter().any(|c| c.path != first.path) {
        return Err(OpalError::new(
            ErrorCode::RegistryBatchPathMismatch,
            "a value-resolution batch must contain calls for a single dotted path",
        ));
    }

    let descriptor = registry.descriptor(&first.path).ok_or_else(|| {
        OpalError::new(ErrorCode::RegistryNotFound, format!("no decorator registered at '{}'", first.path))
    })?;

    let roles = registry.roles_of(&first.path).unwrap_or_default();
    if !roles.contains(&Role::Provider) {
        return Err(OpalError::new(
            ErrorCode::RegistryNoCapability,
            format!("'{}' does not implement value resolution", first.path),
        ));
    }

    if !descriptor.capabilities.transport_scope.allows(ctx.transport_scope) {
        return Err(OpalError::new(
            ErrorCode::RegistryScopeMismatch,
            format!(
                "'{}' declares transport scope {:?} which does not allow the current scope {:?}",
                first.path, descriptor.capabilities.transport_scope, ctx.transport_scope
            ),
        ));
    }

    let implementation = registry
        .lookup(&first.path)
        .ok_or_else(|| OpalError::new(ErrorCode::RegistryNotFound, format!("no decorator registered at '{}'", first.path)))?;
    let provider = implementation
        .as_provider()
        .ok_or_else(|| OpalError::new(ErrorCode::RegistryNoCapability, format!("'{}' does not implement value resolution", first.path)))?;

    let results = provider.resolve_batch(ctx, calls).await;
    if results.len() != calls.len() {
        return Err(OpalError::new(
            ErrorCode::RegistryBatchArityMismatch,
            format!(
                "batch resolve for '{}' returned {} results for {} calls",
                first.path,
                results.len(),
                calls.len()
            ),
        ));
    }

    // Batches are atomic with respect to failure: a single failed call
    // fails the whole batch rather than letting siblings silently succeed
    // alongside it.
    if let Some((call, result)) = calls.iter().zip(&results).find(|(_, r)| r.error.is_some()) {
        let failed = result.error.as_ref().expect("checked by find() above");
        return Err(OpalError::new(
            failed.code,
            format!(
                "batch resolve for '{}' failed at call {}: {}",
                first.path, call.call_index, failed.message
            ),
        ));
    }

    if return_type_is_secret(&descriptor) {
        return Ok(calls.iter().zip(results).map(|(call, result)| result.tag_secret(ctx.secret_ids.handle(call.call_index))).collect());
    }

    Ok(results)
}

/// `true` when a decorator's declared return schema designates its primary
/// (or sole) return parameter as a [`ParamType::SecretHandle`] or
/// [`ParamType::AuthHandle`] — the registry tags such results with a
/// deterministic secret handle rather than leaving the raw value untagged.
fn return_type_is_secret(descriptor: &Descriptor) -> bool {
    let Some(schema) = &descriptor.return_schema else {
        return false;
    };
    let Some(name) = schema.primary.as_ref().or_else(|| schema.order.first()) else {
        return false;
    };
    schema
        .params
        .get(name)
        .is_some_and(|spec| matches!(spec.param_type, ParamType::SecretHandle | ParamType::AuthHandle))
}
