use async_trait::async_trait;
use opal_registry::{RunOptions, Session};
use opal_session::{LocalSession, PoolConfig, SessionPool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn echo_argv(text: &str) -> Vec<String> {
    vec!["/bin/echo".to_string(), text.to_string()]
}

#[tokio::test]
async fn local_session_reports_stdout_of_echo() {
    let session = LocalSession::new();
    let result = session.run(&echo_argv("hello"), RunOptions::default()).await.unwrap();
    let stdout = result.stdout.expect("stdout captured without a sink");
    assert_eq!(String::from_utf8_lossy(&stdout).trim(), "hello");
}

#[tokio::test]
async fn local_session_put_then_get_round_trips_bytes() {
    let session = LocalSession::new();
    let dir = std::env::temp_dir().join(format!("opal-session-test-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let path = dir.join("roundtrip.txt");
    let path_str = path.to_str().unwrap().to_string();

    session.put(&path_str, b"payload").await.unwrap();
    let bytes = session.get(&path_str).await.unwrap();
    assert_eq!(bytes, b"payload");

    tokio::fs::remove_dir_all(&dir).await.ok();
}

#[tokio::test]
async fn pool_opens_a_key_once_under_concurrent_requests() {
    let pool = Arc::new(SessionPool::new(PoolConfig::default()));
    let opens = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        let opens = opens.clone();
        handles.push(tokio::spawn(async move {
            pool.get_or_create("shared-key".to_string(), || {
                let opens = opens.clone();
                async move {
                    opens.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(Arc::new(LocalSession::new()) as Arc<dyn Session>)
                }
            })
            .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pool_evicts_entries_past_their_idle_timeout() {
    let pool = SessionPool::new(PoolConfig {
        idle_timeout: Duration::from_millis(10),
        max_size: None,
    });
    pool.get_or_create("will-expire".to_string(), || async { Ok(Arc::new(LocalSession::new()) as Arc<dyn Session>) })
        .await
        .unwrap();
    assert_eq!(pool.len(), 1);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let evicted = pool.evict_idle().await;
    assert_eq!(evicted, 1);
    assert!(pool.is_empty());
}

#[async_trait]
trait EnvAssert {
    async fn env_contains(&self, key: &str, value: &str) -> bool;
}

#[async_trait]
impl EnvAssert for Arc<dyn Session> {
    async fn env_contains(&self, key: &str, value: &str) -> bool {
        self.env().get(key).map(String::as_str) == Some(value)
    }
}

#[tokio::test]
async fn overlay_session_from_with_env_is_visible_to_a_real_run() {
    let base: Arc<dyn Session> = Arc::new(LocalSession::new());
    let mut delta = std::collections::BTreeMap::new();
    delta.insert("OPAL_TEST_VAR".to_string(), Some("set-by-overlay".to_string()));
    let overlaid = base.with_env(delta);

    assert!(overlaid.env_contains("OPAL_TEST_VAR", "set-by-overlay").await);

    let result = overlaid
        .run(&["/bin/sh".to_string(), "-c".to_string(), "printf %s \"$OPAL_TEST_VAR\"".to_string()], RunOptions::default())
        .await
        .unwrap();
    let stdout = result.stdout.unwrap();
    assert_eq!(String::from_utf8_lossy(&stdout), "set-by-overlay");
}
