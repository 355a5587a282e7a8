//! The session pool (`spec.md` §4.D.3): caches opened transports keyed by
//! `(transport path, canonical parameter digest)`. Lookup-or-create is
//! serialized by a single mutex so concurrent callers converge on one
//! connection instead of racing to open several.

use crate::lifecycle::{LifecycleManager, LifecycleState};
use opal_error::{ErrorCode, OpalError};
use opal_registry::Session;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Pool sizing and eviction policy.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Idle sessions older than this are evicted by [`SessionPool::evict_idle`].
    pub idle_timeout: Duration,
    /// Optional cap on the number of distinct cache keys held at once.
    /// `None` means unbounded.
    pub max_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            max_size: None,
        }
    }
}

struct PooledEntry {
    session: Arc<dyn Session>,
    lifecycle: LifecycleManager,
}

/// A cache of opened [`Session`]s keyed by pool key (see [`crate::digest`]).
pub struct SessionPool {
    config: PoolConfig,
    entries: Mutex<BTreeMap<String, PooledEntry>>,
}

impl SessionPool {
    /// Construct an empty pool with the given configuration.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Return the pooled session for `key`, opening one via `open` if
    /// absent. Holds the pool lock for the duration of `open` so that
    /// concurrent calls for the same key never open two transports.
    pub async fn get_or_create<F, Fut>(&self, key: String, open: F) -> Result<Arc<dyn Session>, OpalError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn Session>, OpalError>>,
    {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get(&key) {
            return Ok(entry.session.clone());
        }

        if let Some(max) = self.config.max_size {
            if entries.len() >= max {
                return Err(OpalError::new(
                    ErrorCode::SessionPoolExhausted,
                    format!("session pool is at its configured cap of {max}"),
                ));
            }
        }

        let session = open().await?;
        let mut lifecycle = LifecycleManager::new();
        lifecycle
            .transition(LifecycleState::Ready, None)
            .expect("Starting -> Ready is always permitted for a freshly opened session");
        tracing::debug!(target: "opal.session.pool", key = %key, "opened and cached session");
        entries.insert(
            key,
            PooledEntry {
                session: session.clone(),
                lifecycle,
            },
        );
        Ok(session)
    }

    /// Number of distinct sessions currently cached.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// `true` if no sessions are cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Evict and close every pooled session whose idle time exceeds the
    /// configured `idle_timeout`. Returns the number of sessions evicted.
    pub async fn evict_idle(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.lifecycle.idle_for().is_some_and(|idle| idle > self.config.idle_timeout))
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for key in &expired {
            if let Some(entry) = entries.remove(key) {
                removed.push(entry.session);
            }
        }
        drop(entries);

        for session in &removed {
            let _ = session.close().await;
        }
        if !removed.is_empty() {
            tracing::debug!(target: "opal.session.pool", count = removed.len(), "evicted idle sessions");
        }
        removed.len()
    }

    /// Close every pooled session best-effort and reset the pool to empty.
    pub async fn close_all(&self) {
        let mut entries = self.entries.lock().await;
        let drained: Vec<PooledEntry> = entries.drain().map(|(_, v)| v).collect();
        drop(entries);
        for entry in &drained {
            let _ = entry.session.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_error::OpalError;
    use opal_registry::{ExitOutcome, RunOptions, RunResult};
    use opal_schema::TransportScope;
    use std::collections::BTreeMap as Map;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSession {
        closed: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Session for CountingSession {
        async fn run(&self, _argv: &[String], _options: RunOptions) -> Result<RunResult, OpalError> {
            Ok(RunResult {
                exit: ExitOutcome::Success,
                stdout: None,
                stderr: None,
            })
        }
        async fn put(&self, _path: &str, _bytes: &[u8]) -> Result<(), OpalError> {
            Ok(())
        }
        async fn get(&self, _path: &str) -> Result<Vec<u8>, OpalError> {
            Ok(Vec::new())
        }
        fn env(&self) -> Map<String, String> {
            Map::new()
        }
        fn with_env(self: Arc<Self>, _delta: Map<String, Option<String>>) -> Arc<dyn Session> {
            self
        }
        fn with_workdir(self: Arc<Self>, _dir: String) -> Arc<dyn Session> {
            self
        }
        fn id(&self) -> &str {
            "counting"
        }
        fn transport_scope(&self) -> TransportScope {
            TransportScope::Local
        }
        async fn close(&self) -> Result<(), OpalError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn concurrent_get_or_create_for_the_same_key_opens_once() {
        let pool = SessionPool::new(PoolConfig::default());
        let opens = Arc::new(AtomicUsize::new(0));

        let a = {
            let opens = opens.clone();
            pool.get_or_create("k".to_string(), || async move {
                opens.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(CountingSession { closed: AtomicUsize::new(0) }) as Arc<dyn Session>)
            })
        };
        let session_a = a.await.unwrap();

        let b = {
            let opens = opens.clone();
            pool.get_or_create("k".to_string(), || async move {
                opens.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(CountingSession { closed: AtomicUsize::new(0) }) as Arc<dyn Session>)
            })
        };
        let session_b = b.await.unwrap();

        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(session_a.id(), session_b.id());
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn max_size_rejects_a_new_key_once_full() {
        let pool = SessionPool::new(PoolConfig {
            idle_timeout: Duration::from_secs(300),
            max_size: Some(1),
        });
        pool.get_or_create("a".to_string(), || async { Ok(Arc::new(CountingSession { closed: AtomicUsize::new(0) }) as Arc<dyn Session>) })
            .await
            .unwrap();
        let result = pool
            .get_or_create("b".to_string(), || async { Ok(Arc::new(CountingSession { closed: AtomicUsize::new(0) }) as Arc<dyn Session>) })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn close_all_closes_every_entry_and_empties_the_pool() {
        let pool = SessionPool::new(PoolConfig::default());
        pool.get_or_create("a".to_string(), || async { Ok(Arc::new(CountingSession { closed: AtomicUsize::new(0) }) as Arc<dyn Session>) })
            .await
            .unwrap();
        pool.close_all().await;
        assert!(pool.is_empty().await);
    }
}
