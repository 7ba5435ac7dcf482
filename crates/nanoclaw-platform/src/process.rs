//! Run-to-completion process spawning abstraction.
//!
//! Used by the `shell` capability exposed to plugins: a single external
//! command run with captured output and an optional timeout. The
//! long-lived, streaming-stdin/stdout subprocess used by the agent runner
//! (C4) is a different shape entirely and lives in `nanoclaw-agent`,
//! built directly on `tokio::process` rather than this trait.

use async_trait::async_trait;
use std::path::Path;

/// Result of running an external process to completion.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Process exit code. 0 typically indicates success.
    pub exit_code: i32,
    /// Captured standard output as a UTF-8 string.
    pub stdout: String,
    /// Captured standard error as a UTF-8 string.
    pub stderr: String,
}

/// Spawns an external command and waits for it to finish.
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    /// Run a command with arguments and capture its output.
    async fn run(
        &self,
        command: &str,
        args: &[&str],
        working_dir: Option<&Path>,
        timeout_secs: Option<u64>,
    ) -> Result<ProcessOutput, Box<dyn std::error::Error + Send + Sync>>;
}

/// Native process spawner using [`tokio::process`].
pub struct NativeProcessSpawner;

#[async_trait]
impl ProcessSpawner for NativeProcessSpawner {
    async fn run(
        &self,
        command: &str,
        args: &[&str],
        working_dir: Option<&Path>,
        timeout_secs: Option<u64>,
    ) -> Result<ProcessOutput, Box<dyn std::error::Error + Send + Sync>> {
        let mut cmd = tokio::process::Command::new(command);
        cmd.args(args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn()?;

        let output = if let Some(secs) = timeout_secs {
            let timeout = std::time::Duration::from_secs(secs);
            match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(format!("process '{command}' timed out after {secs}s").into());
                }
            }
        } else {
            child.wait_with_output().await?
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        Ok(ProcessOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_echo() {
        let spawner = NativeProcessSpawner;
        let output = spawner
            .run("echo", &["hello", "world"], None, Some(10))
            .await
            .unwrap();

        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout.trim(), "hello world");
    }

    #[tokio::test]
    async fn run_nonzero_exit_code() {
        let spawner = NativeProcessSpawner;
        let output = spawner
            .run("sh", &["-c", "exit 7"], None, Some(10))
            .await
            .unwrap();

        assert_eq!(output.exit_code, 7);
    }

    #[tokio::test]
    async fn run_timeout() {
        let spawner = NativeProcessSpawner;
        let result = spawner.run("sleep", &["60"], None, Some(1)).await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timed out"));
    }
}
