//! Bounded invocation of external binaries.
//!
//! Ghostscript and `pdftoppm` are driven through [`ExternalTool`]. Every call
//! has a time budget; when it expires the child is killed and the call fails
//! with [`PdfToolError::ToolTimedOut`]. A binary that cannot be found fails
//! with [`PdfToolError::MissingExternalTool`].
//!
//! # Examples
//!
//! ```no_run
//! use iatepdfs::tools::ExternalTool;
//! use std::time::Duration;
//!
//! # async fn example() -> iatepdfs::Result<()> {
//! let gs = ExternalTool::ghostscript("gs");
//! let version = gs.probe(Duration::from_secs(5)).await?;
//! println!("Ghostscript {version}");
//! # Ok(())
//! # }
//! ```

use serde::Serialize;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

use crate::error::{PdfToolError, Result};

/// Captured output of a successful tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Standard output.
    pub stdout: Vec<u8>,
    /// Standard error, lossily decoded.
    pub stderr: String,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

/// An external program with a human-readable name.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    name: &'static str,
    program: PathBuf,
    version_arg: &'static str,
}

impl ExternalTool {
    /// Ghostscript, used for compression.
    pub fn ghostscript(program: impl Into<PathBuf>) -> Self {
        Self {
            name: "Ghostscript",
            program: program.into(),
            version_arg: "--version",
        }
    }

    /// Poppler's page rasterizer.
    pub fn pdftoppm(program: impl Into<PathBuf>) -> Self {
        Self {
            name: "pdftoppm",
            program: program.into(),
            version_arg: "-v",
        }
    }

    /// Human-readable tool name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Program that gets executed.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the tool with `args`, failing if it does not exit successfully
    /// within `timeout`.
    ///
    /// # Errors
    ///
    /// - `MissingExternalTool` if the program does not exist
    /// - `ToolTimedOut` if the budget expires; the child is killed
    /// - `ToolExecutionFailed` on a non-zero exit status
    pub async fn run<I, S>(&self, args: I, timeout: Duration) -> Result<ToolOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args
            .into_iter()
            .map(|arg| arg.as_ref().to_os_string())
            .collect();
        debug!(tool = self.name, program = %self.program.display(), ?args, "running external tool");

        let output = self.execute(&args, timeout).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(tool = self.name, code = ?output.status.code(), %stderr, "external tool failed");
            return Err(PdfToolError::ToolExecutionFailed {
                tool: self.name,
                exit_code: output.status.code(),
                stderr,
            });
        }

        Ok(ToolOutput {
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed: output.elapsed,
        })
    }

    /// Ask the tool for its version.
    ///
    /// The exit status is ignored because some builds of `pdftoppm` exit
    /// non-zero after printing their version.
    ///
    /// # Errors
    ///
    /// Fails only when the tool is missing or hangs.
    pub async fn probe(&self, timeout: Duration) -> Result<String> {
        let output = self.execute(&[self.version_arg.into()], timeout).await?;

        let text = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };

        Ok(text.lines().next().unwrap_or_default().trim().to_string())
    }

    /// Probe the tool and fold the outcome into a status record.
    pub async fn status(&self, timeout: Duration) -> ToolStatus {
        match self.probe(timeout).await {
            Ok(version) => ToolStatus {
                name: self.name,
                program: self.program.clone(),
                available: true,
                version: Some(version),
                error: None,
            },
            Err(err) => ToolStatus {
                name: self.name,
                program: self.program.clone(),
                available: false,
                version: None,
                error: Some(err.to_string()),
            },
        }
    }

    async fn execute(
        &self,
        args: &[std::ffi::OsString],
        timeout: Duration,
    ) -> Result<RawOutput> {
        let start = Instant::now();

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| self.spawn_error(err))?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| PdfToolError::ToolTimedOut {
                tool: self.name,
                timeout,
            })??;

        Ok(RawOutput {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
            elapsed: start.elapsed(),
        })
    }

    fn spawn_error(&self, err: io::Error) -> PdfToolError {
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                PdfToolError::missing_tool(self.name, self.program.clone())
            }
            _ => PdfToolError::from(err),
        }
    }
}

struct RawOutput {
    status: std::process::ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    elapsed: Duration,
}

/// Availability of one external tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    /// Human-readable tool name.
    pub name: &'static str,
    /// Program that was probed.
    pub program: PathBuf,
    /// Whether the tool could be run.
    pub available: bool,
    /// First line of the version output.
    pub version: Option<String>,
    /// Why the tool is unavailable.
    pub error: Option<String>,
}
