use super::Generator;
use crate::error::BackendError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout as tokio_timeout;
use tracing::debug;

/// Generator backed by a local LLM command-line tool. The prompt is piped
/// to stdin and the completion read from stdout, so arbitrary prompt
/// content never hits the argument list.
pub struct CliGenerator {
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
}

#[async_trait]
impl Generator for CliGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        // Plain command names go through PATH lookup.
        let binary_str = self.binary.to_string_lossy();
        let mut cmd = if binary_str.contains('/') || binary_str.contains('\\') {
            Command::new(&self.binary)
        } else {
            Command::new(binary_str.as_ref())
        };

        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = std::time::Instant::now();

        let run = async {
            let mut child = cmd.spawn()?;
            if let Some(mut stdin) = child.stdin.take() {
                // A child that exits before reading closes the pipe; the
                // exit status below is the authoritative failure signal.
                let _ = stdin.write_all(prompt.as_bytes()).await;
                let _ = stdin.shutdown().await;
            }
            child.wait_with_output().await
        };

        let output = tokio_timeout(self.timeout, run)
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))?
            .map_err(BackendError::Io)?;

        debug!(
            elapsed = ?start.elapsed(),
            exit = output.status.code().unwrap_or(-1),
            "generator subprocess finished"
        );

        if !output.status.success() {
            return Err(BackendError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(BackendError::Malformed("empty completion".into()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pipes_prompt_through_cat() {
        let generator = CliGenerator {
            binary: PathBuf::from("cat"),
            args: Vec::new(),
            timeout: Duration::from_secs(5),
        };

        let out = generator.complete("hello pipeline").await.unwrap();
        assert_eq!(out, "hello pipeline");
    }

    #[tokio::test]
    async fn nonzero_exit_is_surfaced() {
        let generator = CliGenerator {
            binary: PathBuf::from("false"),
            args: Vec::new(),
            timeout: Duration::from_secs(5),
        };

        let err = generator.complete("x").await.unwrap_err();
        assert!(matches!(err, BackendError::NonZeroExit { .. }));
    }

    #[tokio::test]
    async fn slow_process_times_out() {
        let generator = CliGenerator {
            binary: PathBuf::from("sleep"),
            args: vec!["5".to_string()],
            timeout: Duration::from_millis(100),
        };

        let err = generator.complete("x").await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout(_)));
        assert!(err.is_transient());
    }
}
