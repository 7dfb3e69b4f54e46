//! Subprocess invocation.
//!
//! The `call` variant of remote invocation: runs a local command with the
//! deployment environment and maps its exit status to an [`InvocationResult`].

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::outcome::InvocationResult;

/// Runs commands as child processes.
#[derive(Debug, Clone, Default)]
pub struct SubprocessInvoker {
    env: HashMap<String, String>,
    isolated: bool,
    timeout: Option<Duration>,
}

impl SubprocessInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Variables added to the child's environment.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Start the child with only the configured variables.
    pub fn isolated(mut self, isolated: bool) -> Self {
        self.isolated = isolated;
        self
    }

    /// Kill the child if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `command` with `args` and wait for it to exit.
    ///
    /// A non-zero exit is a failed [`InvocationResult`] carrying the child's
    /// exit code. A child killed by a signal reports code 1.
    pub async fn call(
        &self,
        command: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<InvocationResult> {
        if command.is_empty() {
            return Err(Error::Launch("no command given".to_string()));
        }

        let start = std::time::Instant::now();

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if self.isolated {
            cmd.env_clear();
        }
        cmd.envs(&self.env);

        tracing::debug!(
            command,
            args = ?args,
            isolated = self.isolated,
            timeout = ?self.timeout,
            "Spawning subprocess"
        );

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Launch(format!("failed to spawn {}: {}", command, e)))?;

        // Drain both pipes while waiting so a chatty child cannot block.
        let stdout_handle = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr_handle = tokio::spawn(read_pipe(child.stderr.take()));

        let wait = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
                None => Some(child.wait().await),
            }
        };

        let waited = tokio::select! {
            _ = cancel.cancelled() => None,
            waited = wait => Some(waited),
        };

        let status = match waited {
            Some(Some(status)) => status?,
            Some(None) => {
                let _ = child.kill().await;
                tracing::warn!(command, "Subprocess timed out, killed");
                return Err(Error::Timeout {
                    target: command.to_string(),
                    handle: None,
                    waited: start.elapsed(),
                });
            }
            None => {
                let _ = child.kill().await;
                tracing::info!(command, "Subprocess cancelled, killed");
                return Err(Error::Cancelled {
                    target: command.to_string(),
                    handle: None,
                });
            }
        };

        let exit_code = status.code().unwrap_or(1);
        let stdout = stdout_handle.await.unwrap_or_default();
        let stderr = stderr_handle.await.unwrap_or_default();

        tracing::info!(
            command,
            exit_code,
            duration_ms = start.elapsed().as_millis() as u64,
            "Subprocess exited"
        );

        Ok(InvocationResult::from_exit(exit_code, &stdout, &stderr))
    }
}

/// Read a pipe to the end. Bytes that are not UTF-8 are replaced, never
/// dropped, so the child is not cut off mid-write.
async fn read_pipe<R>(pipe: Option<R>) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut bytes = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut bytes).await {
            tracing::warn!(error = %e, "Failed to read subprocess output");
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
