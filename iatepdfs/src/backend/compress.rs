//! Compression through Ghostscript's `pdfwrite` device.

use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

use crate::config::QualityPreset;
use crate::error::{PdfToolError, Result};
use crate::io::StagedOutput;
use crate::tools::ExternalTool;
use crate::utils::format_file_size;

/// Outcome of a compression run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionReport {
    /// Source document.
    pub input: PathBuf,
    /// Written document.
    pub output: PathBuf,
    /// Preset that was applied.
    pub preset: QualityPreset,
    /// Source size in bytes.
    pub original_size: u64,
    /// Output size in bytes.
    pub compressed_size: u64,
}

impl CompressionReport {
    /// Fraction of the original size saved, negative when the output grew.
    pub fn reduction_ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        1.0 - self.compressed_size as f64 / self.original_size as f64
    }

    /// One-line summary for the user.
    pub fn summary(&self) -> String {
        let ratio = self.reduction_ratio();
        let change = if ratio >= 0.0 {
            format!("{:.1}% smaller", ratio * 100.0)
        } else {
            format!("{:.1}% larger", -ratio * 100.0)
        };
        format!(
            "{} -> {} ({change})",
            format_file_size(self.original_size),
            format_file_size(self.compressed_size)
        )
    }
}

/// Runs Ghostscript with a quality preset.
#[derive(Debug, Clone)]
pub struct Compressor {
    tool: ExternalTool,
    timeout: Duration,
}

impl Compressor {
    /// Create a compressor for the given Ghostscript binary.
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            tool: ExternalTool::ghostscript(program),
            timeout,
        }
    }

    /// The Ghostscript tool in use.
    pub fn tool(&self) -> &ExternalTool {
        &self.tool
    }

    /// Arguments for one run, output first as Ghostscript expects.
    pub fn arguments(preset: QualityPreset, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-sDEVICE=pdfwrite".into(),
            "-dCompatibilityLevel=1.4".into(),
        ];
        args.extend(preset.ghostscript_args().into_iter().map(OsString::from));
        args.extend(["-dNOPAUSE", "-dQUIET", "-dBATCH"].map(OsString::from));

        let mut output_arg = OsString::from("-sOutputFile=");
        output_arg.push(output);
        args.push(output_arg);
        args.push(input.as_os_str().to_os_string());
        args
    }

    /// Compress `input` into `destination`.
    ///
    /// Ghostscript writes into a staged sibling of `destination`, which is
    /// renamed into place only after a successful run.
    ///
    /// # Errors
    ///
    /// - `UnreadableDocument` if `input` does not exist
    /// - `InvalidConfig` if `destination` is `input`
    /// - `MissingExternalTool`, `ToolTimedOut` or `ToolExecutionFailed` from
    ///   the Ghostscript run
    /// - `WriteError` if the output cannot be placed
    #[instrument(skip(self), fields(tool = %self.tool.program().display()))]
    pub async fn compress(
        &self,
        input: &Path,
        preset: QualityPreset,
        destination: &Path,
    ) -> Result<CompressionReport> {
        let original_size = tokio::fs::metadata(input)
            .await
            .map_err(|e| PdfToolError::unreadable(input, e.to_string()))?
            .len();

        if same_file(input, destination) {
            return Err(PdfToolError::invalid_config(format!(
                "Refusing to overwrite the source document: {}",
                input.display()
            )));
        }

        let staged = StagedOutput::new(destination)?;
        let args = Self::arguments(preset, input, staged.path());
        self.tool.run(&args, self.timeout).await?;

        if staged.is_empty()? {
            return Err(PdfToolError::ToolExecutionFailed {
                tool: self.tool.name(),
                exit_code: Some(0),
                stderr: "no output was produced".to_string(),
            });
        }

        let compressed_size = staged.len()?;
        let output = staged.commit()?;

        let report = CompressionReport {
            input: input.to_path_buf(),
            output,
            preset,
            original_size,
            compressed_size,
        };
        info!(summary = %report.summary(), "compression finished");
        Ok(report)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
