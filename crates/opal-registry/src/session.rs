//! The `Session` contract (`spec.md` §4.D.1): an abstract execution
//! environment implemented concretely by `opal-session`.

use crate::types::ExitOutcome;
use async_trait::async_trait;
use opal_error::OpalError;
use opal_schema::TransportScope;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

/// Options controlling a single [`Session::run`] invocation.
pub struct RunOptions {
    /// Streaming stdin source. `None` means no input is piped.
    pub stdin: Option<Box<dyn AsyncRead + Send + Unpin>>,
    /// Optional stdout sink; if absent, stdout is captured into the result.
    pub stdout_sink: Option<Box<dyn AsyncWrite + Send + Unpin>>,
    /// Optional stderr sink; if absent, stderr is captured into the result.
    pub stderr_sink: Option<Box<dyn AsyncWrite + Send + Unpin>>,
    /// Working directory override for this run only. A concrete session
    /// fills this in from its own derived workdir if the caller leaves it
    /// unset; an explicit caller value always wins.
    pub workdir: Option<String>,
    /// Environment to run the child with. `None` means "use the session's
    /// own `env()`" — set by a derived session (e.g. one produced by
    /// [`Session::with_env`]) before delegating down to the transport that
    /// actually spawns the process.
    pub env: Option<BTreeMap<String, String>>,
    /// Cooperative cancellation signal.
    pub cancel: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            stdin: None,
            stdout_sink: None,
            stderr_sink: None,
            workdir: None,
            env: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl RunOptions {
    /// Otherwise-default run options whose `cancel` is inherited from
    /// `ctx` instead of a fresh, disconnected token. Any `ExecNode` that
    /// bottoms out in a `Session::run` call should build its `RunOptions`
    /// this way so ambient cancellation (e.g. a `@timeout`'s derived child
    /// token) actually reaches the spawned process.
    #[must_use]
    pub fn from_context(ctx: &crate::resolve::EvalContext) -> Self {
        Self {
            cancel: ctx.cancel.clone(),
            ..Self::default()
        }
    }
}

/// The outcome of [`Session::run`].
#[derive(Debug)]
pub struct RunResult {
    /// Exit outcome of the run.
    pub exit: ExitOutcome,
    /// Captured stdout, if no sink was supplied.
    pub stdout: Option<Vec<u8>>,
    /// Captured stderr, if no sink was supplied.
    pub stderr: Option<Vec<u8>>,
}

/// An abstract execution environment: local process, SSH, or a future
/// transport. Immutable with respect to env/cwd — [`Session::with_env`]
/// and [`Session::with_workdir`] return derived sessions rather than
/// mutating `self`.
#[async_trait]
pub trait Session: Send + Sync {
    /// Run a command, returning its exit outcome and any captured output.
    async fn run(&self, argv: &[String], options: RunOptions) -> Result<RunResult, OpalError>;

    /// Write `bytes` to `path` within this session.
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), OpalError>;

    /// Read the bytes at `path` within this session.
    async fn get(&self, path: &str) -> Result<Vec<u8>, OpalError>;

    /// A defensive copy of the current environment snapshot.
    fn env(&self) -> BTreeMap<String, String>;

    /// Return a derived session whose environment is this session's
    /// environment overlaid with `delta` (`None` values unset a key).
    fn with_env(self: Arc<Self>, delta: BTreeMap<String, Option<String>>) -> Arc<dyn Session>;

    /// Return a derived session with a different working directory.
    fn with_workdir(self: Arc<Self>, dir: String) -> Arc<dyn Session>;

    /// Stable session identifier (`local`, `ssh:host`, ...).
    fn id(&self) -> &str;

    /// This session's transport locality class.
    fn transport_scope(&self) -> TransportScope;

    /// Close the session. Idempotent.
    async fn close(&self) -> Result<(), OpalError>;
}
