//! The local execution transport: runs commands as child processes of this
//! host, in their own process group so that cancellation can reach the
//! whole descendant tree rather than just the direct child.

use async_trait::async_trait;
use opal_error::{ErrorCode, OpalError};
use opal_registry::{ExitOutcome, RunOptions, RunResult, Session};
use opal_schema::TransportScope;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// A session that executes commands as local child processes.
pub struct LocalSession {
    env: RwLock<BTreeMap<String, String>>,
    workdir: RwLock<Option<String>>,
}

impl Default for LocalSession {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSession {
    /// Construct a session inheriting the current process's environment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            env: RwLock::new(std::env::vars().collect()),
            workdir: RwLock::new(None),
        }
    }
}

#[cfg(unix)]
fn spawn_in_new_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn spawn_in_new_group(_command: &mut Command) {}

/// Send `SIGTERM` to the process group rooted at `pid`, escalating to
/// `SIGKILL` if it hasn't exited within the grace period.
#[cfg(unix)]
async fn kill_group(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pgid = Pid::from_raw(-(pid as i32));
    let _ = kill(pgid, Signal::SIGTERM);
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    let _ = kill(pgid, Signal::SIGKILL);
}

#[cfg(not(unix))]
async fn kill_group(_pid: u32) {}

#[async_trait]
impl Session for LocalSession {
    async fn run(&self, argv: &[String], options: RunOptions) -> Result<RunResult, OpalError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(OpalError::new(ErrorCode::SessionSpawnFailed, "argv must contain at least a program name"));
        };

        let mut command = Command::new(program);
        command.args(args);
        command.kill_on_drop(true);
        command.stdin(std::process::Stdio::piped());
        command.stdout(std::process::Stdio::piped());
        command.stderr(std::process::Stdio::piped());

        let env = options.env.clone().unwrap_or_else(|| self.env.read().expect("env lock poisoned").clone());
        command.env_clear();
        command.envs(&env);

        let workdir = options.workdir.clone().or_else(|| self.workdir.read().expect("workdir lock poisoned").clone());
        if let Some(dir) = &workdir {
            command.current_dir(dir);
        }

        spawn_in_new_group(&mut command);

        let mut child = command
            .spawn()
            .map_err(|e| OpalError::new(ErrorCode::SessionSpawnFailed, format!("failed to spawn '{program}': {e}")).with_source(e))?;
        let pid = child.id();

        if let Some(mut stdin_source) = options.stdin {
            if let Some(mut child_stdin) = child.stdin.take() {
                tokio::io::copy(&mut stdin_source, &mut child_stdin).await.ok();
            }
        } else {
            drop(child.stdin.take());
        }

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let mut child_stdout = child.stdout.take();
        let mut child_stderr = child.stderr.take();

        let wait = async {
            if let Some(out) = child_stdout.as_mut() {
                out.read_to_end(&mut stdout_buf).await.ok();
            }
            if let Some(err) = child_stderr.as_mut() {
                err.read_to_end(&mut stderr_buf).await.ok();
            }
            child.wait().await
        };

        let status = tokio::select! {
            result = wait => result.map_err(|e| OpalError::new(ErrorCode::SessionRemoteFailed, format!("failed to wait on child: {e}")).with_source(e))?,
            () = options.cancel.cancelled() => {
                if let Some(pid) = pid {
                    tokio::spawn(kill_group(pid));
                }
                let _ = child.wait().await;
                return Ok(RunResult {
                    exit: ExitOutcome::Canceled,
                    stdout: Some(stdout_buf),
                    stderr: Some(stderr_buf),
                });
            }
        };

        let stdout_result = if let Some(mut sink) = options.stdout_sink {
            sink.write_all(&stdout_buf).await.ok();
            None
        } else {
            Some(stdout_buf)
        };
        let stderr_result = if let Some(mut sink) = options.stderr_sink {
            sink.write_all(&stderr_buf).await.ok();
            None
        } else {
            Some(stderr_buf)
        };

        let exit = match status.code() {
            Some(0) => ExitOutcome::Success,
            Some(code) => ExitOutcome::ChildExit(code),
            None => ExitOutcome::GenericFailure,
        };

        Ok(RunResult {
            exit,
            stdout: stdout_result,
            stderr: stderr_result,
        })
    }

    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), OpalError> {
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| OpalError::new(ErrorCode::SessionIoFailed, format!("failed to write '{path}': {e}")).with_source(e))
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, OpalError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| OpalError::new(ErrorCode::SessionIoFailed, format!("failed to read '{path}': {e}")).with_source(e))
    }

    fn env(&self) -> BTreeMap<String, String> {
        self.env.read().expect("env lock poisoned").clone()
    }

    fn with_env(self: Arc<Self>, delta: BTreeMap<String, Option<String>>) -> Arc<dyn Session> {
        crate::env_overlay::EnvOverlay::with_env(self, delta)
    }

    fn with_workdir(self: Arc<Self>, dir: String) -> Arc<dyn Session> {
        crate::env_overlay::EnvOverlay::with_workdir(self, dir)
    }

    fn id(&self) -> &str {
        "local"
    }

    fn transport_scope(&self) -> TransportScope {
        TransportScope::Local
    }

    async fn close(&self) -> Result<(), OpalError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_captures_stdout_of_a_successful_command() {
        let session = LocalSession::new();
        let result = session
            .run(&["echo".to_string(), "hello".to_string()], RunOptions::default())
            .await
            .unwrap();
        assert_eq!(result.exit, ExitOutcome::Success);
        assert_eq!(String::from_utf8_lossy(&result.stdout.unwrap()).trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_as_child_exit() {
        let session = LocalSession::new();
        let result = session
            .run(&["sh".to_string(), "-c".to_string(), "exit 7".to_string()], RunOptions::default())
            .await
            .unwrap();
        assert_eq!(result.exit, ExitOutcome::ChildExit(7));
    }

    #[tokio::test]
    async fn cancellation_before_exit_reports_canceled() {
        let session = LocalSession::new();
        let mut options = RunOptions::default();
        options.cancel.cancel();
        let result = session
            .run(&["sleep".to_string(), "30".to_string()], options)
            .await
            .unwrap();
        assert_eq!(result.exit, ExitOutcome::Canceled);
    }

    #[tokio::test]
    async fn empty_argv_is_rejected() {
        let session = LocalSession::new();
        assert!(session.run(&[], RunOptions::default()).await.is_err());
    }
}
