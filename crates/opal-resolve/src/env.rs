//! `@env` — resolves the `property` primary parameter against the current
//! session's environment snapshot (`spec.md` §8 scenario 1: local scope
//! resolves the process `HOME`, SSH scope resolves the remote `HOME`).

use async_trait::async_trait;
use opal_error::ErrorCode;
use opal_registry::{Decorator, EvalContext, Provider, ValueCall, ValueResult};

/// Value provider backing the `env` dotted path.
pub struct EnvProvider;

impl Decorator for EnvProvider {
    fn as_provider(&self) -> Option<&dyn Provider> {
        Some(self)
    }
}

#[async_trait]
impl Provider for EnvProvider {
    async fn resolve_batch(&self, ctx: &EvalContext, calls: &[ValueCall]) -> Vec<ValueResult> {
        let env = ctx.session.env();
        calls
            .iter()
            .map(|call| match call.args.get("property").and_then(|v| v.as_str()) {
                None => ValueResult::err("env", ErrorCode::ResolveCallFailed, "missing required parameter 'property'"),
                Some(name) => match env.get(name) {
                    Some(value) => ValueResult::ok(serde_json::Value::String(value.clone()), format!("env:{name}")),
                    None => ValueResult::err(format!("env:{name}"), ErrorCode::ResolveNotFound, format!("'{name}' is not defined")),
                },
            })
            .collect()
    }
}
