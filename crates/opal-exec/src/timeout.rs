//! `@timeout(duration=30s)` — bounds a wrapped `ExecNode`'s run time,
//! canceling the inner node's context token on expiry so that a `Session`
//! implementation's process-group kill actually reaches the child tree
//! (`spec.md` §4.F).

use async_trait::async_trait;
use opal_decode::ArgValue;
use opal_error::{ErrorCode, OpalError};
use opal_registry::{CanonicalArgs, Decorator, ExecNode, ExecResult, EvalContext, Wrapper};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_DURATION: Duration = Duration::from_secs(30);

struct TimeoutNode {
    duration: Duration,
    next: Arc<dyn ExecNode>,
}

#[async_trait]
impl ExecNode for TimeoutNode {
    async fn execute(&self, ctx: &EvalContext) -> Result<ExecResult, OpalError> {
        let child_cancel = ctx.cancel.child_token();
        let guard = child_cancel.clone().drop_guard();
        let inner_ctx = EvalContext {
            cancel: child_cancel.clone(),
            ..ctx.clone()
        };
        let child = self.next.clone();
        let run = child.execute(&inner_ctx);
        tokio::pin!(run);

        tokio::select! {
            result = &mut run => {
                drop(guard);
                result
            }
            () = tokio::time::sleep(self.duration) => {
                child_cancel.cancel();
                drop(guard);
                // give the inner node a moment to observe cancellation and
                // unwind before reporting the timeout upward.
                let _ = run.await;
                Err(OpalError::new(
                    ErrorCode::ExecutionTimedOut,
                    format!("execution exceeded {:?}", self.duration),
                ))
            }
        }
    }
}

/// The `timeout` decorator's [`Wrapper`] implementation.
pub struct Timeout;

impl Decorator for Timeout {
    fn as_wrapper(&self) -> Option<&dyn Wrapper> {
        Some(self)
    }
}

impl Wrapper for Timeout {
    fn wrap(&self, next: Arc<dyn ExecNode>, params: &CanonicalArgs) -> Arc<dyn ExecNode> {
        let duration = match params.get("duration") {
            Some(ArgValue::Duration(d)) => *d,
            _ => DEFAULT_DURATION,
        };
        Arc::new(TimeoutNode { duration, next })
    }
}
