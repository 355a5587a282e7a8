//! Copy-on-write environment and working-directory layering over a shared
//! parent transport.
//!
//! `@env` and `cwd`-style decorators never mutate the session they're
//! handed; they derive a new logical session that shares the parent's
//! actual transport (the process spawner, the SSH channel factory) while
//! recording only the delta. This keeps sibling branches of a plan tree
//! from observing each other's overrides.

use async_trait::async_trait;
use opal_error::OpalError;
use opal_registry::{RunOptions, RunResult, Session};
use opal_schema::TransportScope;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A derived session layering an environment delta and/or a working
/// directory override on top of a shared parent.
pub struct EnvOverlay {
    parent: Arc<dyn Session>,
    delta: BTreeMap<String, Option<String>>,
    workdir: Option<String>,
}

impl EnvOverlay {
    /// Wrap `parent` with an environment delta. `None` values in `delta`
    /// unset the corresponding key from the parent's environment.
    #[must_use]
    pub fn with_env(parent: Arc<dyn Session>, delta: BTreeMap<String, Option<String>>) -> Arc<dyn Session> {
        Arc::new(Self {
            parent,
            delta,
            workdir: None,
        })
    }

    /// Wrap `parent` with a working-directory override.
    #[must_use]
    pub fn with_workdir(parent: Arc<dyn Session>, workdir: String) -> Arc<dyn Session> {
        Arc::new(Self {
            parent,
            delta: BTreeMap::new(),
            workdir: Some(workdir),
        })
    }

    fn effective_env(&self) -> BTreeMap<String, String> {
        let mut env = self.parent.env();
        for (key, value) in &self.delta {
            match value {
                Some(v) => {
                    env.insert(key.clone(), v.clone());
                }
                None => {
                    env.remove(key);
                }
            }
        }
        env
    }
}

#[async_trait]
impl Session for EnvOverlay {
    async fn run(&self, argv: &[String], mut options: RunOptions) -> Result<RunResult, OpalError> {
        if options.env.is_none() {
            options.env = Some(self.effective_env());
        }
        if options.workdir.is_none() {
            options.workdir = self.workdir.clone();
        }
        self.parent.run(argv, options).await
    }

    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), OpalError> {
        self.parent.put(path, bytes).await
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, OpalError> {
        self.parent.get(path).await
    }

    fn env(&self) -> BTreeMap<String, String> {
        self.effective_env()
    }

    fn with_env(self: Arc<Self>, delta: BTreeMap<String, Option<String>>) -> Arc<dyn Session> {
        let mut merged = self.delta.clone();
        merged.extend(delta);
        Arc::new(EnvOverlay {
            parent: self.parent.clone(),
            delta: merged,
            workdir: self.workdir.clone(),
        })
    }

    fn with_workdir(self: Arc<Self>, dir: String) -> Arc<dyn Session> {
        Arc::new(EnvOverlay {
            parent: self.parent.clone(),
            delta: self.delta.clone(),
            workdir: Some(dir),
        })
    }

    fn id(&self) -> &str {
        self.parent.id()
    }

    fn transport_scope(&self) -> TransportScope {
        self.parent.transport_scope()
    }

    async fn close(&self) -> Result<(), OpalError> {
        self.parent.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_registry::RunResult;
    use std::sync::Mutex;

    struct FakeSession {
        base_env: BTreeMap<String, String>,
        seen: Mutex<Vec<(Option<BTreeMap<String, String>>, Option<String>)>>,
    }

    #[async_trait]
    impl Session for FakeSession {
        async fn run(&self, _argv: &[String], options: RunOptions) -> Result<RunResult, OpalError> {
            self.seen.lock().unwrap().push((options.env.clone(), options.workdir.clone()));
            Ok(RunResult {
                exit: opal_registry::ExitOutcome::Success,
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
        fn env(&self) -> BTreeMap<String, String> {
            self.base_env.clone()
        }
        fn with_env(self: Arc<Self>, delta: BTreeMap<String, Option<String>>) -> Arc<dyn Session> {
            EnvOverlay::with_env(self, delta)
        }
        fn with_workdir(self: Arc<Self>, dir: String) -> Arc<dyn Session> {
            EnvOverlay::with_workdir(self, dir)
        }
        fn id(&self) -> &str {
            "fake"
        }
        fn transport_scope(&self) -> TransportScope {
            TransportScope::Local
        }
        async fn close(&self) -> Result<(), OpalError> {
            Ok(())
        }
    }

    fn base() -> Arc<FakeSession> {
        Arc::new(FakeSession {
            base_env: BTreeMap::from([("HOME".to_string(), "/root".to_string())]),
            seen: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn overlay_adds_and_overrides_keys_without_touching_parent() {
        let parent = base();
        let overlay = EnvOverlay::with_env(parent.clone(), BTreeMap::from([("FOO".to_string(), Some("bar".to_string()))]));
        assert_eq!(overlay.env().get("FOO"), Some(&"bar".to_string()));
        assert_eq!(overlay.env().get("HOME"), Some(&"/root".to_string()));
        assert_eq!(parent.env().get("FOO"), None);
    }

    #[tokio::test]
    async fn overlay_can_unset_a_parent_key() {
        let parent = base();
        let overlay = EnvOverlay::with_env(parent, BTreeMap::from([("HOME".to_string(), None)]));
        assert!(overlay.env().get("HOME").is_none());
    }

    #[tokio::test]
    async fn nested_overlays_merge_deltas_in_application_order() {
        let parent = base();
        let first = EnvOverlay::with_env(parent, BTreeMap::from([("A".to_string(), Some("1".to_string()))]));
        let second = first.with_env(BTreeMap::from([("B".to_string(), Some("2".to_string()))]));
        let env = second.env();
        assert_eq!(env.get("A"), Some(&"1".to_string()));
        assert_eq!(env.get("B"), Some(&"2".to_string()));
    }

    #[tokio::test]
    async fn run_injects_effective_env_into_options_when_caller_leaves_it_unset() {
        let parent = base();
        let overlay = EnvOverlay::with_env(parent.clone(), BTreeMap::from([("FOO".to_string(), Some("bar".to_string()))]));
        overlay.run(&["true".to_string()], RunOptions::default()).await.unwrap();
        let seen = parent.seen.lock().unwrap();
        let (env, _) = &seen[0];
        assert_eq!(env.as_ref().unwrap().get("FOO"), Some(&"bar".to_string()));
    }

    #[tokio::test]
    async fn explicit_workdir_override_is_respected() {
        let parent = base();
        let overlay = EnvOverlay::with_workdir(parent.clone(), "/tmp/work".to_string());
        overlay.run(&["true".to_string()], RunOptions::default()).await.unwrap();
        let seen = parent.seen.lock().unwrap();
        assert_eq!(seen[0].1, Some("/tmp/work".to_string()));
    }

    #[tokio::test]
    async fn with_env_preserves_a_workdir_set_earlier_in_the_overlay_chain() {
        let parent = base();
        let with_workdir = EnvOverlay::with_workdir(parent.clone(), "/tmp/work".to_string());
        let with_both = with_workdir.with_env(BTreeMap::from([("FOO".to_string(), Some("bar".to_string()))]));
        with_both.run(&["true".to_string()], RunOptions::default()).await.unwrap();
        let seen = parent.seen.lock().unwrap();
        let (env, workdir) = &seen[0];
        assert_eq!(workdir.as_deref(), Some("/tmp/work"));
        assert_eq!(env.as_ref().unwrap().get("FOO"), Some(&"bar".to_string()));
    }
}
