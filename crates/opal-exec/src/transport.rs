//! `@local` / `@ssh.connect(...)` — transport decorators that both open
//! (or reuse, via the pool) a session and wrap the child block so it runs
//! against that session instead of the ambient one (`spec.md` §4.D, §4.F).

use async_trait::async_trait;
use opal_decode::ArgValue;
use opal_error::OpalError;
use opal_registry::{Boundary, CanonicalArgs, Decorator, ExecNode, ExecResult, EvalContext, Session, Wrapper};
use opal_session::{LocalSession, PoolConfig, SessionPool, SshParams, SshSession};
use std::sync::Arc;

fn ssh_params_from(params: &CanonicalArgs) -> Result<SshParams, OpalError> {
    let host = match params.get("host") {
        Some(ArgValue::String(h)) => h.clone(),
        _ => {
            return Err(OpalError::new(
                opal_error::ErrorCode::ResolveCallFailed,
                "ssh.connect requires a 'host' parameter",
            ))
        }
    };
    let mut ssh_params = SshParams { host, ..SshParams::default() };
    if let Some(ArgValue::Integer(port)) = params.get("port") {
        ssh_params.port = *port as u16;
    }
    if let Some(ArgValue::String(user)) = params.get("user") {
        ssh_params.user = user.clone();
    }
    if let Some(ArgValue::String(key)) = params.get("key_path") {
        ssh_params.key_path = Some(key.clone());
    }
    if let Some(ArgValue::String(known_hosts)) = params.get("known_hosts_path") {
        ssh_params.known_hosts_path = Some(known_hosts.clone());
    }
    if let Some(ArgValue::Boolean(strict)) = params.get("strict_host_key") {
        ssh_params.strict_host_key = *strict;
    }
    Ok(ssh_params)
}

/// Opens (via the pool) the local-machine session. Trivial boundary: the
/// local transport has no connection parameters worth pooling beyond a
/// single shared session, but it still participates in the pool so `@local`
/// and `@ssh.connect` share one code path at the `Wrapper` layer.
pub struct LocalTransport {
    pool: Arc<SessionPool>,
}

impl LocalTransport {
    /// Construct a transport backed by a fresh pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: Arc::new(SessionPool::new(PoolConfig::default())),
        }
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Decorator for LocalTransport {
    fn as_boundary(&self) -> Option<&dyn Boundary> {
        Some(self)
    }
    fn as_wrapper(&self) -> Option<&dyn Wrapper> {
        Some(self)
    }
}

#[async_trait]
impl Boundary for LocalTransport {
    async fn open_session(&self, _ctx: &EvalContext, _params: &CanonicalArgs) -> Result<Arc<dyn Session>, OpalError> {
        self.pool
            .get_or_create("local".to_string(), || async { Ok(Arc::new(LocalSession::new()) as Arc<dyn Session>) })
            .await
    }
}

struct TransportNode {
    session: Arc<dyn Session>,
    next: Arc<dyn ExecNode>,
}

#[async_trait]
impl ExecNode for TransportNode {
    async fn execute(&self, ctx: &EvalContext) -> Result<ExecResult, OpalError> {
        let derived = EvalContext {
            session: self.session.clone(),
            ..ctx.clone()
        };
        self.next.execute(&derived).await
    }
}

impl Wrapper for LocalTransport {
    fn wrap(&self, next: Arc<dyn ExecNode>, _params: &CanonicalArgs) -> Arc<dyn ExecNode> {
        let pool = self.pool.clone();
        Arc::new(LazyTransportNode {
            open: Box::new(move || {
                let pool = pool.clone();
                Box::pin(async move {
                    pool.get_or_create("local".to_string(), || async { Ok(Arc::new(LocalSession::new()) as Arc<dyn Session>) })
                        .await
                })
            }),
            next,
        })
    }
}

/// Opens (or reuses, via the pool) an SSH session keyed by its canonical
/// connection parameters, then wraps the child block to run against it.
pub struct SshTransport {
    pool: Arc<SessionPool>,
}

impl SshTransport {
    /// Construct a transport backed by a fresh pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: Arc::new(SessionPool::new(PoolConfig::default())),
        }
    }
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Decorator for SshTransport {
    fn as_boundary(&self) -> Option<&dyn Boundary> {
        Some(self)
    }
    fn as_wrapper(&self) -> Option<&dyn Wrapper> {
        Some(self)
    }
}

#[async_trait]
impl Boundary for SshTransport {
    async fn open_session(&self, _ctx: &EvalContext, params: &CanonicalArgs) -> Result<Arc<dyn Session>, OpalError> {
        let ssh_params = ssh_params_from(params)?;
        let key = opal_session::pool_key(&format!("ssh:{}", ssh_params.host), params);
        self.pool
            .get_or_create(key, || async move { Ok(Arc::new(SshSession::connect(ssh_params).await?) as Arc<dyn Session>) })
            .await
    }
}

impl Wrapper for SshTransport {
    fn wrap(&self, next: Arc<dyn ExecNode>, params: &CanonicalArgs) -> Arc<dyn ExecNode> {
        let pool = self.pool.clone();
        let params = params.clone();
        Arc::new(LazyTransportNode {
            open: Box::new(move || {
                let pool = pool.clone();
                let params = params.clone();
                Box::pin(async move {
                    let ssh_params = ssh_params_from(&params)?;
                    let key = opal_session::pool_key(&format!("ssh:{}", ssh_params.host), &params);
                    pool.get_or_create(key, || async move { Ok(Arc::new(SshSession::connect(ssh_params).await?) as Arc<dyn Session>) })
                        .await
                })
            }),
            next,
        })
    }
}

type OpenFuture = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Arc<dyn Session>, OpalError>> + Send>>;

/// Execution node that opens its session lazily on each run rather than at
/// wrap time, so a single compiled plan can be re-entered (e.g. from a
/// retry wrapper above it) without re-resolving connection parameters.
struct LazyTransportNode {
    open: Box<dyn Fn() -> OpenFuture + Send + Sync>,
    next: Arc<dyn ExecNode>,
}

#[async_trait]
impl ExecNode for LazyTransportNode {
    async fn execute(&self, ctx: &EvalContext) -> Result<ExecResult, OpalError> {
        let session = (self.open)().await?;
        let node = TransportNode {
            session,
            next: self.next.clone(),
        };
        node.execute(ctx).await
    }
}
