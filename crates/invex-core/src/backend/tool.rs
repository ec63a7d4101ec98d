//! Runner for external executables with a timeout boundary.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::runtime::Runtime;
use tracing::{debug, trace};

use crate::error::ToolError;

/// Runs external tools, killing any that exceed the configured timeout.
///
/// Calls block the current thread; the runner must not be used from inside
/// another tokio runtime.
pub struct ToolRunner {
    timeout: Duration,
    runtime: Runtime,
}

impl ToolRunner {
    /// Create a runner with the given per-invocation timeout.
    pub fn new(timeout: Duration) -> Result<Self, ToolError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { timeout, runtime })
    }

    /// Resolve `tool` on PATH.
    pub fn require(&self, tool: &str, hint: &str) -> Result<PathBuf, ToolError> {
        which::which(tool).map_err(|_| ToolError::NotFound {
            tool: tool.to_string(),
            hint: hint.to_string(),
        })
    }

    /// Run `tool` with `args`, feeding `stdin` if given, and collect its output.
    ///
    /// The exit status is not checked; see [`ToolRunner::stdout`].
    pub fn output<I, S>(
        &self,
        tool: &str,
        hint: &str,
        args: I,
        stdin: Option<&[u8]>,
    ) -> Result<Output, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = self.require(tool, hint)?;

        let mut cmd = Command::new(&program);
        cmd.args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        trace!("Running {:?}", cmd.as_std());

        let timeout = self.timeout;
        self.runtime.block_on(async {
            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(ToolError::NotFound {
                        tool: tool.to_string(),
                        hint: hint.to_string(),
                    });
                }
                Err(e) => return Err(ToolError::Io(e)),
            };

            let pipe = child.stdin.take();
            let feed = async move {
                if let (Some(mut pipe), Some(input)) = (pipe, stdin) {
                    pipe.write_all(input).await?;
                    pipe.shutdown().await?;
                }
                Ok::<_, std::io::Error>(())
            };

            let run = async {
                let (fed, output) = tokio::join!(feed, child.wait_with_output());
                match fed {
                    // The tool may exit before reading all of its input.
                    Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
                output
            };

            match tokio::time::timeout(timeout, run).await {
                Ok(output) => Ok(output?),
                Err(_) => {
                    debug!("{} exceeded {:?}, killed", tool, timeout);
                    Err(ToolError::TimedOut {
                        tool: tool.to_string(),
                        timeout,
                    })
                }
            }
        })
    }

    /// Like [`ToolRunner::output`], but fail unless the exit code is one of `accepted`.
    pub fn stdout<I, S>(
        &self,
        tool: &str,
        hint: &str,
        args: I,
        stdin: Option<&[u8]>,
        accepted: &[i32],
    ) -> Result<Vec<u8>, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.output(tool, hint, args, stdin)?;
        match output.status.code() {
            Some(code) if accepted.contains(&code) => Ok(output.stdout),
            _ => Err(ToolError::Failed {
                tool: tool.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> ToolRunner {
        ToolRunner::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_missing_tool_is_not_found() {
        let err = runner()
            .output("invex-no-such-tool", "install nothing", ["--version"], None)
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_stdin_is_piped_through() {
        let out = runner()
            .stdout("cat", "coreutils", Vec::<&str>::new(), Some(&b"Rechnung"[..]), &[0])
            .unwrap();
        assert_eq!(out, b"Rechnung");
    }

    #[cfg(unix)]
    #[test]
    fn test_unaccepted_exit_code_fails() {
        let err = runner()
            .stdout("false", "coreutils", Vec::<&str>::new(), None, &[0])
            .unwrap_err();
        assert!(matches!(err, ToolError::Failed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_tool_times_out() {
        let runner = ToolRunner::new(Duration::from_millis(200)).unwrap();
        let err = runner
            .output("sleep", "coreutils", ["5"], None)
            .unwrap_err();
        assert!(matches!(err, ToolError::TimedOut { .. }));
    }
}
