//! The SSH remote-execution transport (`spec.md` §4.D.4).
//!
//! Each command opens a fresh channel on one shared `russh` client
//! connection. Env deltas are applied through the SSH env-setting protocol
//! on a best-effort basis (servers may reject `env` requests); the working
//! directory is prepended as a `cd … && …` wrapper since SFTP-style chdir
//! has no equivalent in the exec channel model. `put`/`get` redirect
//! through `cat >` / `cat` with shell-quoted paths.

use async_trait::async_trait;
use opal_error::{ErrorCode, OpalError};
use opal_registry::{ExitOutcome, RunOptions, RunResult, Session};
use opal_schema::TransportScope;
use russh::client::{self, Handle};
use russh_keys::key::PublicKey;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;

/// Parameters accepted by the `@ssh.connect` boundary decorator.
#[derive(Clone, Debug)]
pub struct SshParams {
    /// Remote host to connect to.
    pub host: String,
    /// Remote port. Defaults to 22.
    pub port: u16,
    /// Remote user. Defaults to the local `USER` environment variable.
    pub user: String,
    /// Path to a private key file, tried before the SSH agent.
    pub key_path: Option<String>,
    /// Path to the `known_hosts` file used for host key verification.
    pub known_hosts_path: Option<String>,
    /// When `false`, host key verification is bypassed (test-only use).
    pub strict_host_key: bool,
}

impl Default for SshParams {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            user: std::env::var("USER").unwrap_or_else(|_| "root".to_string()),
            key_path: None,
            known_hosts_path: None,
            strict_host_key: true,
        }
    }
}

struct HostKeyVerifier {
    known_hosts_path: Option<String>,
    strict: bool,
}

#[async_trait]
impl client::Handler for HostKeyVerifier {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        if !self.strict {
            return Ok(true);
        }
        let Some(path) = &self.known_hosts_path else {
            return Ok(false);
        };
        let known = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(_) => return Ok(false),
        };
        let marshaled = server_public_key.public_key_bytes();
        Ok(known
            .lines()
            .filter_map(|line| russh_keys::parse_public_key_base64(line.split_whitespace().nth(2)?).ok())
            .any(|known_key| known_key.public_key_bytes() == marshaled))
    }
}

/// A session backed by a live SSH connection.
pub struct SshSession {
    id: String,
    params: SshParams,
    handle: Mutex<Handle<HostKeyVerifier>>,
    env: BTreeMap<String, String>,
    workdir: Option<String>,
}

impl SshSession {
    /// Connect to `params.host:params.port` and authenticate, trying an
    /// explicit private key first and falling back to the SSH agent.
    pub async fn connect(params: SshParams) -> Result<Self, OpalError> {
        let config = Arc::new(client::Config::default());
        let verifier = HostKeyVerifier {
            known_hosts_path: params.known_hosts_path.clone(),
            strict: params.strict_host_key,
        };

        let mut handle = client::connect(config, (params.host.as_str(), params.port), verifier)
            .await
            .map_err(|e| OpalError::new(ErrorCode::SessionTransportOpenFailed, format!("ssh connect to {}:{} failed: {e}", params.host, params.port)))?;

        let authenticated = if let Some(key_path) = &params.key_path {
            let key_pair = russh_keys::load_secret_key(key_path, None)
                .map_err(|e| OpalError::new(ErrorCode::SessionHostKeyRejected, format!("failed to load private key '{key_path}': {e}")))?;
            handle
                .authenticate_publickey(&params.user, Arc::new(key_pair))
                .await
                .map_err(|e| OpalError::new(ErrorCode::SessionTransportOpenFailed, format!("publickey auth failed: {e}")))?
        } else {
            let mut agent = russh_keys::agent::client::AgentClient::connect_env()
                .await
                .map_err(|e| OpalError::new(ErrorCode::SessionTransportOpenFailed, format!("no explicit key and no agent available: {e}")))?;
            let identities = agent
                .request_identities()
                .await
                .map_err(|e| OpalError::new(ErrorCode::SessionTransportOpenFailed, format!("agent identity listing failed: {e}")))?;
            let mut ok = false;
            for identity in identities {
                if handle.authenticate_publickey(&params.user, Arc::new(identity)).await.unwrap_or(false) {
                    ok = true;
                    break;
                }
            }
            ok
        };

        if !authenticated {
            return Err(OpalError::new(ErrorCode::SessionTransportOpenFailed, format!("authentication to {} failed", params.host)));
        }

        Ok(Self {
            id: format!("ssh:{}", params.host),
            params,
            handle: Mutex::new(handle),
            env: BTreeMap::new(),
            workdir: None,
        })
    }

    fn build_command(&self, argv: &[String], workdir: &Option<String>) -> String {
        build_remote_command(argv, workdir.as_ref().or(self.workdir.as_ref()))
    }
}

/// Build the shell-quoted remote command string: an optional `cd … &&`
/// prefix followed by `argv` joined with shell-safe quoting.
fn build_remote_command(argv: &[String], workdir: Option<&String>) -> String {
    let mut parts = Vec::new();
    if let Some(dir) = workdir {
        parts.push(format!("cd {} &&", shell_escape::unix::escape(dir.clone().into())));
    }
    let command = argv
        .iter()
        .map(|arg| shell_escape::unix::escape(arg.clone().into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    parts.push(command);
    parts.join(" ")
}

#[async_trait]
impl Session for SshSession {
    async fn run(&self, argv: &[String], options: RunOptions) -> Result<RunResult, OpalError> {
        let handle = self.handle.lock().await;
        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| OpalError::new(ErrorCode::SessionRemoteFailed, format!("failed to open channel: {e}")))?;

        let env = options.env.clone().unwrap_or_else(|| self.env.clone());
        for (key, value) in &env {
            let _ = channel.set_env(false, key, value).await;
        }

        let command = self.build_command(argv, &options.workdir);
        channel
            .exec(true, command)
            .await
            .map_err(|e| OpalError::new(ErrorCode::SessionRemoteFailed, format!("exec failed: {e}")))?;

        if let Some(mut stdin_source) = options.stdin {
            let mut buf = Vec::new();
            if stdin_source.read_to_end(&mut buf).await.is_ok() {
                let _ = channel.data(buf.as_slice()).await;
            }
            let _ = channel.eof().await;
        }

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let mut exit_code: Option<u32> = None;

        loop {
            tokio::select! {
                msg = channel.wait() => {
                    match msg {
                        Some(russh::ChannelMsg::Data { data }) => stdout_buf.extend_from_slice(&data),
                        Some(russh::ChannelMsg::ExtendedData { data, ext: 1 }) => stderr_buf.extend_from_slice(&data),
                        Some(russh::ChannelMsg::ExitStatus { exit_status }) => exit_code = Some(exit_status),
                        Some(russh::ChannelMsg::Eof) | Some(russh::ChannelMsg::Close) | None => break,
                        _ => {}
                    }
                }
                () = options.cancel.cancelled() => {
                    let _ = channel.signal(russh::Sig::TERM).await;
                    let _ = channel.close().await;
                    return Ok(RunResult {
                        exit: ExitOutcome::Canceled,
                        stdout: Some(stdout_buf),
                        stderr: Some(stderr_buf),
                    });
                }
            }
        }

        let exit = match exit_code {
            Some(0) => ExitOutcome::Success,
            Some(code) => ExitOutcome::ChildExit(code as i32),
            None => ExitOutcome::GenericFailure,
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

        Ok(RunResult {
            exit,
            stdout: stdout_result,
            stderr: stderr_result,
        })
    }

    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), OpalError> {
        let handle = self.handle.lock().await;
        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| OpalError::new(ErrorCode::SessionIoFailed, format!("failed to open channel for put: {e}")))?;
        let command = format!("cat > {}", shell_escape::unix::escape(path.into()));
        channel
            .exec(true, command)
            .await
            .map_err(|e| OpalError::new(ErrorCode::SessionIoFailed, format!("put exec failed: {e}")))?;
        channel
            .data(bytes)
            .await
            .map_err(|e| OpalError::new(ErrorCode::SessionIoFailed, format!("put write failed: {e}")))?;
        let _ = channel.eof().await;
        loop {
            match channel.wait().await {
                Some(russh::ChannelMsg::ExitStatus { exit_status: 0 }) => return Ok(()),
                Some(russh::ChannelMsg::ExitStatus { exit_status }) => {
                    return Err(OpalError::new(ErrorCode::SessionIoFailed, format!("remote cat exited with code {exit_status}")))
                }
                Some(russh::ChannelMsg::Eof) | Some(russh::ChannelMsg::Close) | None => return Ok(()),
                _ => {}
            }
        }
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, OpalError> {
        let handle = self.handle.lock().await;
        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| OpalError::new(ErrorCode::SessionIoFailed, format!("failed to open channel for get: {e}")))?;
        let command = format!("cat {}", shell_escape::unix::escape(path.into()));
        channel
            .exec(true, command)
            .await
            .map_err(|e| OpalError::new(ErrorCode::SessionIoFailed, format!("get exec failed: {e}")))?;
        let mut buf = Vec::new();
        loop {
            match channel.wait().await {
                Some(russh::ChannelMsg::Data { data }) => buf.extend_from_slice(&data),
                Some(russh::ChannelMsg::ExitStatus { exit_status: 0 }) => return Ok(buf),
                Some(russh::ChannelMsg::ExitStatus { exit_status }) => {
                    return Err(OpalError::new(ErrorCode::SessionIoFailed, format!("remote cat exited with code {exit_status}")))
                }
                Some(russh::ChannelMsg::Eof) | Some(russh::ChannelMsg::Close) | None => return Ok(buf),
                _ => {}
            }
        }
    }

    fn env(&self) -> BTreeMap<String, String> {
        self.env.clone()
    }

    fn with_env(self: Arc<Self>, delta: BTreeMap<String, Option<String>>) -> Arc<dyn Session> {
        crate::env_overlay::EnvOverlay::with_env(self, delta)
    }

    fn with_workdir(self: Arc<Self>, dir: String) -> Arc<dyn Session> {
        crate::env_overlay::EnvOverlay::with_workdir(self, dir)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn transport_scope(&self) -> TransportScope {
        TransportScope::Ssh
    }

    async fn close(&self) -> Result<(), OpalError> {
        let handle = self.handle.lock().await;
        handle
            .disconnect(russh::Disconnect::ByApplication, "", "")
            .await
            .map_err(|e| OpalError::new(ErrorCode::SessionRemoteFailed, format!("disconnect failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_remote_command_prepends_workdir_and_quotes_arguments() {
        let workdir = "/tmp/has space".to_string();
        let cmd = build_remote_command(&["echo".to_string(), "a b".to_string()], Some(&workdir));
        assert!(cmd.starts_with("cd "));
        assert!(cmd.contains("echo"));
        assert!(cmd.contains("'a b'"));
    }

    #[test]
    fn build_remote_command_without_workdir_has_no_cd_prefix() {
        let cmd = build_remote_command(&["true".to_string()], None);
        assert_eq!(cmd, "true");
    }

    #[test]
    fn default_params_use_port_22_and_strict_host_key() {
        let params = SshParams::default();
        assert_eq!(params.port, 22);
        assert!(params.strict_host_key);
    }
}
