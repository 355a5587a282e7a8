//! `@var` — resolves the `name` primary parameter against the plan's
//! in-memory variable store, the declared "primary source of truth" for
//! variables (`spec.md` §4.E).

use async_trait::async_trait;
use opal_error::ErrorCode;
use opal_registry::{Decorator, EvalContext, Provider, ValueCall, ValueResult};

/// Value provider backing the `var` dotted path.
pub struct VarProvider;

impl Decorator for VarProvider {
    fn as_provider(&self) -> Option<&dyn Provider> {
        Some(self)
    }
}

#[async_trait]
impl Provider for VarProvider {
    async fn resolve_batch(&self, ctx: &EvalContext, calls: &[ValueCall]) -> Vec<ValueResult> {
        let variables = ctx.variables.read().expect("variable store lock poisoned");
        calls
            .iter()
            .map(|call| match call.args.get("name").and_then(|v| v.as_str()) {
                None => ValueResult::err("var", ErrorCode::ResolveCallFailed, "missing required parameter 'name'"),
                Some(name) => match variables.get(name) {
                    Some(value) => ValueResult::ok(value.clone(), format!("var:{name}")),
                    None => ValueResult::err(format!("var:{name}"), ErrorCode::ResolveNotFound, format!("variable '{name}' is not set")),
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_decode::ArgValue;
    use opal_registry::CanonicalArgs;
    use opal_schema::TransportScope;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct StubSession;

    #[async_trait]
    impl opal_registry::Session for StubSession {
        async fn run(&self, _argv: &[String], _options: opal_registry::RunOptions) -> Result<opal_registry::RunResult, opal_error::OpalError> {
            unimplemented!("not exercised in this test")
        }
        async fn put(&self, _path: &str, _bytes: &[u8]) -> Result<(), opal_error::OpalError> {
            Ok(())
        }
        async fn get(&self, _path: &str) -> Result<Vec<u8>, opal_error::OpalError> {
            Ok(Vec::new())
        }
        fn env(&self) -> BTreeMap<String, String> {
            BTreeMap::new()
        }
        fn with_env(self: Arc<Self>, _delta: BTreeMap<String, Option<String>>) -> Arc<dyn opal_registry::Session> {
            self
        }
        fn with_workdir(self: Arc<Self>, _dir: String) -> Arc<dyn opal_registry::Session> {
            self
        }
        fn id(&self) -> &str {
            "stub"
        }
        fn transport_scope(&self) -> TransportScope {
            TransportScope::Local
        }
        async fn close(&self) -> Result<(), opal_error::OpalError> {
            Ok(())
        }
    }

    fn ctx_with(name: &str, value: serde_json::Value) -> EvalContext {
        let ctx = EvalContext::new(Arc::new(StubSession), "hash", "steps.0");
        ctx.variables.write().unwrap().insert(name.to_string(), value);
        ctx
    }

    fn call(name: &str, index: usize) -> ValueCall {
        let mut args = CanonicalArgs::new();
        args.insert("name".to_string(), ArgValue::String(name.to_string()));
        ValueCall {
            path: "var".to_string(),
            args,
            call_index: index,
        }
    }

    #[tokio::test]
    async fn set_variable_resolves_from_the_shared_store() {
        let ctx = ctx_with("count", serde_json::json!(3));
        let results = VarProvider.resolve_batch(&ctx, &[call("count", 0)]).await;
        assert_eq!(results[0].raw, serde_json::json!(3));
    }

    #[tokio::test]
    async fn unset_variable_is_a_per_call_error() {
        let ctx = ctx_with("count", serde_json::json!(3));
        let results = VarProvider.resolve_batch(&ctx, &[call("missing", 0)]).await;
        assert!(results[0].error.is_some());
    }
}
