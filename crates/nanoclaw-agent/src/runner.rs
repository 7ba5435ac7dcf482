//! Spawns, feeds, and streams output from one agent subprocess.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::output::{AgentOutput, FrameScanner};

/// Default grace period between a graceful close request and a hard kill.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(10);

/// A spawned agent process and the channel its streamed frames arrive on.
///
/// The receiver closes when the child's stdout reader task observes EOF,
/// which happens when the process exits.
pub struct RunningAgent {
    child: Child,
    frames: mpsc::Receiver<Result<AgentOutput>>,
}

impl RunningAgent {
    /// Receive the next streamed frame, or `None` once the process has
    /// exited and no more frames will arrive.
    pub async fn next_frame(&mut self) -> Option<Result<AgentOutput>> {
        self.frames.recv().await
    }

    /// The OS process id, if still known to the runtime.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit on its own.
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        self.child.wait().await.map_err(AgentError::Io)
    }

    /// Send `SIGKILL`-equivalent termination immediately.
    pub async fn kill(&mut self) -> Result<()> {
        self.child.kill().await.map_err(AgentError::Io)
    }

    /// Wait up to `grace` for the process to exit on its own (having
    /// already been asked to close gracefully via the IPC `_close`
    /// sentinel); kill it if the grace period elapses first.
    pub async fn wait_or_kill(&mut self, grace: Duration) -> Result<std::process::ExitStatus> {
        tokio::select! {
            status = self.child.wait() => status.map_err(AgentError::Io),
            _ = tokio::time::sleep(grace) => {
                warn!(pid = ?self.pid(), "agent did not exit within grace period, killing");
                self.child.kill().await.map_err(AgentError::Io)?;
                self.child.wait().await.map_err(AgentError::Io)
            }
        }
    }
}

/// Spawns agent processes with a fixed command and working directory.
pub struct AgentRunner {
    command: String,
    args: Vec<String>,
}

impl AgentRunner {
    /// A runner that spawns `command` with `args` for every agent.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Spawn one agent process in `working_dir`, write `config` to its
    /// stdin, and begin streaming its framed stdout in the background.
    pub async fn spawn(&self, working_dir: &Path, config: &AgentConfig) -> Result<RunningAgent> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .current_dir(working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| AgentError::SpawnFailed(e.to_string()))?;

        let config_json = serde_json::to_string(config).map_err(|e| {
            AgentError::SpawnFailed(format!("failed to serialize agent config: {e}"))
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(config_json.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::SpawnFailed("child has no stdout handle".into()))?;
        let stderr = child.stderr.take();

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(pump_stdout(stdout, tx));
        if let Some(stderr) = stderr {
            tokio::spawn(pump_stderr(stderr));
        }

        Ok(RunningAgent {
            child,
            frames: rx,
        })
    }
}

async fn pump_stdout(
    stdout: tokio::process::ChildStdout,
    tx: mpsc::Sender<Result<AgentOutput>>,
) {
    let mut lines = BufReader::new(stdout).lines();
    let mut scanner = FrameScanner::new();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(frame) = scanner.feed_line(&line) {
                    if tx.send(frame).await.is_err() {
                        return;
                    }
                }
            }
            Ok(None) => return,
            Err(e) => {
                let _ = tx.send(Err(AgentError::Io(e))).await;
                return;
            }
        }
    }
}

async fn pump_stderr(stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(agent_stderr = %line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell_script(body: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("agent.sh");
        std::fs::write(&script_path, body).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755))
                .unwrap();
        }
        (dir, script_path)
    }

    #[tokio::test]
    async fn spawn_streams_single_frame_then_closes() {
        let (dir, script) = shell_script(
            "#!/bin/sh\ncat >/dev/null\necho '---NANOCLAW_OUTPUT_START---'\necho '{\"status\":\"success\",\"result\":\"hi\"}'\necho '---NANOCLAW_OUTPUT_END---'\n",
        );
        let runner = AgentRunner::new("/bin/sh", vec![script.to_string_lossy().to_string()]);
        let config = AgentConfig::interactive("hello", "owner-dm", "discord:1", true);
        let mut agent = runner.spawn(dir.path(), &config).await.unwrap();

        let frame = agent.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.outbound_text(), Some("hi"));
        assert!(agent.next_frame().await.is_none());

        let status = agent.wait().await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn wait_or_kill_kills_after_grace_period() {
        let (dir, script) = shell_script("#!/bin/sh\ncat >/dev/null\nsleep 30\n");
        let runner = AgentRunner::new("/bin/sh", vec![script.to_string_lossy().to_string()]);
        let config = AgentConfig::interactive("hello", "owner-dm", "discord:1", true);
        let mut agent = runner.spawn(dir.path(), &config).await.unwrap();

        let status = agent
            .wait_or_kill(Duration::from_millis(200))
            .await
            .unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn spawn_propagates_config_via_stdin() {
        let (dir, script) = shell_script(
            "#!/bin/sh\nbody=$(cat)\necho '---NANOCLAW_OUTPUT_START---'\necho \"{\\\"status\\\":\\\"success\\\",\\\"result\\\":\\\"$body\\\"}\"\necho '---NANOCLAW_OUTPUT_END---'\n",
        );
        let runner = AgentRunner::new("/bin/sh", vec![script.to_string_lossy().to_string()]);
        let config = AgentConfig::interactive("echo-me", "owner-dm", "discord:1", false);
        let mut agent = runner.spawn(dir.path(), &config).await.unwrap();

        let frame = agent.next_frame().await.unwrap().unwrap();
        assert!(frame.outbound_text().unwrap().contains("echo-me"));
    }
}
