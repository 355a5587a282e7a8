//! `@parallel(max_workers=4, onFailure=fail_fast)` — runs several child
//! execution nodes concurrently, bounded by a worker semaphore.
//!
//! `onFailure` is a combination strategy over sibling outcomes, the same
//! shape as a policy-precedence enum (`abp-policy::compose::PolicyPrecedence`)
//! generalized from "combine allow/deny decisions" to "combine execution
//! outcomes" (`spec.md` §4.F).

use async_trait::async_trait;
use opal_decode::ArgValue;
use opal_error::{ErrorCode, OpalError};
use opal_registry::{CanonicalArgs, Decorator, ExecNode, ExecResult, EvalContext, ExitOutcome, Wrapper};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// How sibling failures are combined into the parallel node's own outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Cancel outstanding siblings as soon as one fails and return
    /// immediately. The default, most conservative strategy.
    #[default]
    FailFast,
    /// Let every sibling run to completion regardless of earlier failures,
    /// then report failure if any did.
    WaitAll,
}

impl FailurePolicy {
    fn parse(s: &str) -> Self {
        match s {
            "wait_all" | "waitAll" => Self::WaitAll,
            _ => Self::FailFast,
        }
    }
}

const DEFAULT_MAX_WORKERS: usize = 4;

struct ParallelNode {
    children: Vec<Arc<dyn ExecNode>>,
    max_workers: usize,
    policy: FailurePolicy,
}

#[async_trait]
impl ExecNode for ParallelNode {
    async fn execute(&self, ctx: &EvalContext) -> Result<ExecResult, OpalError> {
        let semaphore = Arc::new(Semaphore::new(self.max_workers.max(1)));
        let cancel = CancellationToken::new();

        let mut handles = Vec::with_capacity(self.children.len());
        for child in &self.children {
            let permit_holder = semaphore.clone();
            let child = child.clone();
            let child_ctx = ctx.clone();
            let cancel = cancel.clone();
            let fail_fast = self.policy == FailurePolicy::FailFast;
            handles.push(tokio::spawn(async move {
                let _permit = permit_holder.acquire_owned().await.expect("semaphore not closed");
                if fail_fast && cancel.is_cancelled() {
                    return Ok(ExecResult {
                        exit: ExitOutcome::Canceled,
                        stdout: None,
                        stderr: None,
                    });
                }
                let outcome = child.execute(&child_ctx).await;
                if fail_fast {
                    let failed = match &outcome {
                        Err(_) => true,
                        Ok(result) => result.exit.is_failure(),
                    };
                    if failed {
                        cancel.cancel();
                    }
                }
                outcome
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(join_err) => results.push(Err(OpalError::new(
                    ErrorCode::ExecutionParallelFailed,
                    format!("a parallel child task panicked: {join_err}"),
                ))),
            }
        }

        let failure = results.iter().find(|r| matches!(r, Err(_)) || matches!(r, Ok(res) if res.exit.is_failure()));
        if let Some(failure) = failure {
            return match failure {
                Err(err) => Err(OpalError::new(ErrorCode::ExecutionParallelFailed, err.message.clone())),
                Ok(_) => Err(OpalError::new(ErrorCode::ExecutionParallelFailed, "one or more parallel children failed")),
            };
        }

        Ok(ExecResult {
            exit: ExitOutcome::Success,
            stdout: None,
            stderr: None,
        })
    }
}

/// The `parallel` decorator's [`Wrapper`] implementation.
///
/// Unlike the other wrappers, `parallel`'s children come from the
/// decorator's child block rather than a single `next` node — callers
/// build the [`ParallelNode`] via [`Parallel::wrap_many`] once the block's
/// steps have been compiled, and [`Wrapper::wrap`] (which only has a
/// single `next`) treats that one node as the sole child.
pub struct Parallel;

impl Decorator for Parallel {
    fn as_wrapper(&self) -> Option<&dyn Wrapper> {
        Some(self)
    }
}

impl Wrapper for Parallel {
    fn wrap(&self, next: Arc<dyn ExecNode>, params: &CanonicalArgs) -> Arc<dyn ExecNode> {
        self.wrap_many(vec![next], params)
    }
}

impl Parallel {
    /// Build a parallel node over an explicit set of compiled children.
    #[must_use]
    pub fn wrap_many(&self, children: Vec<Arc<dyn ExecNode>>, params: &CanonicalArgs) -> Arc<dyn ExecNode> {
        let max_workers = match params.get("max_workers").or_else(|| params.get("maxConcurrency")) {
            Some(ArgValue::Integer(n)) if *n > 0 => *n as usize,
            _ => DEFAULT_MAX_WORKERS,
        };
        let policy = match params.get("onFailure") {
            Some(ArgValue::String(s)) => FailurePolicy::parse(s),
            _ => FailurePolicy::default(),
        };
        Arc::new(ParallelNode {
            children,
            max_workers,
            policy,
        })
    }
}
