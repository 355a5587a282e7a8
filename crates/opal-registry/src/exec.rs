//! The `ExecNode` contract (`spec.md` §4.F): a runnable unit produced by
//! composing wrapper decorators around a leaf command.

use crate::resolve::EvalContext;
use crate::types::ExitOutcome;
use async_trait::async_trait;
use opal_error::OpalError;

/// The result of executing an [`ExecNode`].
#[derive(Debug)]
pub struct ExecResult {
    /// Exit outcome.
    pub exit: ExitOutcome,
    /// Captured stdout, if applicable.
    pub stdout: Option<Vec<u8>>,
    /// Captured stderr, if applicable.
    pub stderr: Option<Vec<u8>>,
}

/// A runnable node in an execution tree. Wrapper nodes hold their inner
/// node as a strict child and delegate after applying their own effect.
#[async_trait]
pub trait ExecNode: Send + Sync {
    /// Run this node under `ctx`.
    async fn execute(&self, ctx: &EvalContext) -> Result<ExecResult, OpalError>;
}
