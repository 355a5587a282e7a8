//! End-to-end: decode a raw call against a built-in's descriptor, look the
//! decorator up by path, wrap an execution node, and run it.

use async_trait::async_trait;
use opal_decode::{decode, ArgKey, RawCall};
use opal_error::OpalError;
use opal_registry::{ExecNode, ExecResult, EvalContext, ExitOutcome, RunOptions, RunResult, Session};
use opal_runtime::{register_builtins, Registry};
use opal_schema::TransportScope;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

struct StubSession;

#[async_trait]
impl Session for StubSession {
    async fn run(&self, _argv: &[String], _options: RunOptions) -> Result<RunResult, OpalError> {
        unimplemented!("not exercised by this test")
    }
    async fn put(&self, _path: &str, _bytes: &[u8]) -> Result<(), OpalError> {
        Ok(())
    }
    async fn get(&self, _path: &str) -> Result<Vec<u8>, OpalError> {
        Ok(Vec::new())
    }
    fn env(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
    fn with_env(self: Arc<Self>, _delta: BTreeMap<String, Option<String>>) -> Arc<dyn Session> {
        self
    }
    fn with_workdir(self: Arc<Self>, _dir: String) -> Arc<dyn Session> {
        self
    }
    fn id(&self) -> &str {
        "stub"
    }
    fn transport_scope(&self) -> TransportScope {
        TransportScope::Local
    }
    async fn close(&self) -> Result<(), OpalError> {
        Ok(())
    }
}

struct CountingNode {
    calls: Arc<AtomicU32>,
    fail_until: u32,
}

#[async_trait]
impl ExecNode for CountingNode {
    async fn execute(&self, _ctx: &EvalContext) -> Result<ExecResult, OpalError> {
        let seen = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if seen < self.fail_until {
            return Err(OpalError::new(opal_error::ErrorCode::Internal, "not yet"));
        }
        Ok(ExecResult {
            exit: ExitOutcome::Success,
            stdout: None,
            stderr: None,
        })
    }
}

fn ctx() -> EvalContext {
    EvalContext::new(Arc::new(StubSession), "hash", "steps.0")
}

#[tokio::test]
async fn retry_built_in_is_decoded_and_wrapped_from_its_registered_descriptor() {
    let registry = Registry::new();
    register_builtins(&registry).unwrap();

    let descriptor = registry.descriptor("retry").unwrap();
    let mut args: BTreeMap<ArgKey, serde_json::Value> = BTreeMap::new();
    args.insert(ArgKey::Named("attempts".to_string()), serde_json::json!(5));
    args.insert(ArgKey::Named("delay".to_string()), serde_json::json!("1ms"));
    let (validated, _warnings) = decode(&descriptor.schema, RawCall { primary: None, args }).unwrap();

    let decorator = registry.lookup("retry").unwrap();
    let wrapper = decorator.as_wrapper().expect("retry registers as a wrapper");

    let calls = Arc::new(AtomicU32::new(0));
    let node: Arc<dyn ExecNode> = Arc::new(CountingNode {
        calls: calls.clone(),
        fail_until: 3,
    });
    let wrapped = wrapper.wrap(node, &validated);

    let result = wrapped.execute(&ctx()).await.unwrap();
    assert_eq!(result.exit, ExitOutcome::Success);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn env_built_in_is_decoded_and_resolved_through_its_registered_descriptor() {
    let registry = Registry::new();
    register_builtins(&registry).unwrap();

    let descriptor = registry.descriptor("env").unwrap();
    let (validated, _warnings) = decode(
        &descriptor.schema,
        RawCall {
            primary: Some("HOME".to_string()),
            args: BTreeMap::new(),
        },
    )
    .unwrap();

    let decorator = registry.lookup("env").unwrap();
    let provider = decorator.as_provider().expect("env registers as a provider");

    let call = opal_registry::ValueCall {
        path: "env".to_string(),
        args: validated,
        call_index: 0,
    };
    let results = provider.resolve_batch(&ctx(), &[call]).await;
    assert_eq!(results.len(), 1);
}
