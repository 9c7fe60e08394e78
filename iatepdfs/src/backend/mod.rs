//! PDF backend adapter.
//!
//! [`PdfBackend`] executes the document transforms: merge, compress, split
//! and the page-order commit. All operations are async; lopdf work runs on
//! the blocking pool and Ghostscript runs as a bounded child process.
//!
//! # Examples
//!
//! ```no_run
//! use iatepdfs::backend::PdfBackend;
//! use iatepdfs::config::Settings;
//! use std::path::{Path, PathBuf};
//!
//! # async fn example() -> iatepdfs::Result<()> {
//! let backend = PdfBackend::new(&Settings::default());
//! let inputs = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
//! let report = backend.merge(&inputs, Path::new("merged.pdf")).await?;
//! println!("{} pages", report.total_pages);
//! # Ok(())
//! # }
//! ```

pub mod compress;
pub mod merger;
pub mod pages;

pub use compress::{CompressionReport, Compressor};

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task;
use tracing::{info, instrument};

use crate::config::{QualityPreset, Settings};
use crate::error::{PdfToolError, Result};
use crate::io::{DocumentInfo, PdfReader, PdfWriter};
use crate::tools::{ExternalTool, ToolStatus};
use crate::utils::{file_stem, sibling_with_suffix};

/// Default file name for merged output.
pub const DEFAULT_MERGE_NAME: &str = "merged.pdf";

/// Budget for a tool version probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Written document.
    pub output: PathBuf,
    /// Number of input documents.
    pub files_merged: usize,
    /// Pages in the output.
    pub total_pages: usize,
    /// Output size in bytes.
    pub file_size: u64,
}

/// Outcome of a split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitReport {
    /// Source document.
    pub input: PathBuf,
    /// One file per page, in page order.
    pub outputs: Vec<PathBuf>,
}

/// Outcome of writing a selection of pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    /// Source document.
    pub input: PathBuf,
    /// Written document.
    pub output: PathBuf,
    /// Pages in the output.
    pub page_count: usize,
    /// Output size in bytes.
    pub file_size: u64,
}

/// Default output of `compress` for `input`: `<stem>_compressed.pdf`.
pub fn default_compressed_path(input: &Path) -> PathBuf {
    sibling_with_suffix(input, "_compressed")
}

/// Default output of a page-order commit for `input`: `<stem>_reordered.pdf`.
pub fn default_reordered_path(input: &Path) -> PathBuf {
    sibling_with_suffix(input, "_reordered")
}

/// Name of the single-page file for 1-based page `number` of `input`.
pub fn split_page_name(input: &Path, number: usize) -> String {
    format!("{}_page_{number}.pdf", file_stem(input))
}

/// Executes document transforms.
#[derive(Debug, Clone)]
pub struct PdfBackend {
    reader: PdfReader,
    writer: PdfWriter,
    compressor: Compressor,
    rasterizer: ExternalTool,
    workers: usize,
}

impl PdfBackend {
    /// Create a backend from settings.
    pub fn new(settings: &Settings) -> Self {
        Self {
            reader: PdfReader::new(),
            writer: PdfWriter::new(),
            compressor: Compressor::new(
                settings.tools.ghostscript.clone(),
                settings.timeouts.compression,
            ),
            rasterizer: ExternalTool::pdftoppm(settings.tools.rasterizer.clone()),
            workers: settings.effective_jobs(),
        }
    }

    /// Concatenate whole documents in order.
    ///
    /// # Errors
    ///
    /// - `NotEnoughFiles` for an empty input
    /// - `UnreadableDocument` / `EncryptedDocument` naming the failing input
    /// - `WriteError` if the destination cannot be written
    #[instrument(skip(self, inputs), fields(files = inputs.len()))]
    pub async fn merge(&self, inputs: &[PathBuf], destination: &Path) -> Result<MergeReport> {
        if inputs.is_empty() {
            return Err(PdfToolError::NotEnoughFiles {
                needed: 1,
                found: 0,
            });
        }

        let loaded = self.reader.load_all(inputs, self.workers).await?;
        let files_merged = loaded.len();
        let total_pages = loaded.iter().map(|l| l.page_count).sum();

        let merged = blocking("Merge", move || merger::merge_documents(loaded)).await?;
        let stats = self.writer.save(merged, destination).await?;

        info!(output = %stats.output_path.display(), total_pages, "merge finished");
        Ok(MergeReport {
            output: stats.output_path,
            files_merged,
            total_pages,
            file_size: stats.file_size,
        })
    }

    /// Compress a document with a Ghostscript preset.
    ///
    /// # Errors
    ///
    /// See [`Compressor::compress`].
    pub async fn compress(
        &self,
        input: &Path,
        preset: QualityPreset,
        destination: &Path,
    ) -> Result<CompressionReport> {
        self.compressor.compress(input, preset, destination).await
    }

    /// Write every page of `input` to its own file in `output_dir`.
    ///
    /// Files are named `<stem>_page_<n>.pdf`, `n` counting from 1. They are
    /// all staged first and only renamed into place once every page has
    /// been written.
    ///
    /// # Errors
    ///
    /// - `UnreadableDocument` / `EncryptedDocument` for the source
    /// - `WriteError` if `output_dir` cannot be created or written
    #[instrument(skip(self))]
    pub async fn split(&self, input: &Path, output_dir: &Path) -> Result<SplitReport> {
        let loaded = self.reader.load(input).await?;

        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| PdfToolError::write_error(output_dir, e))?;

        let writer = self.writer.clone();
        let input_path = input.to_path_buf();
        let output_dir = output_dir.to_path_buf();

        let outputs = blocking("Split", move || {
            let mut staged = Vec::with_capacity(loaded.page_count);
            for number in 1..=loaded.page_count {
                let mut page = pages::extract_pages(&loaded.document, &[number as u32])?;
                let destination = output_dir.join(split_page_name(&input_path, number));
                staged.push(writer.stage(&mut page, &destination)?);
            }
            staged
                .into_iter()
                .map(|stage| stage.commit())
                .collect::<Result<Vec<_>>>()
        })
        .await?;

        info!(pages = outputs.len(), "split finished");
        Ok(SplitReport {
            input: input.to_path_buf(),
            outputs,
        })
    }

    /// Write the pages of `input` at `page_order` (0-based source indices) to
    /// `destination`, in that order.
    ///
    /// # Errors
    ///
    /// - `NoPagesSelected` for an empty order
    /// - `UnreadableDocument` if the source cannot be read any more
    /// - `OutOfRange` / `InvalidPermutation` for a bad order
    /// - `WriteError` if the destination cannot be written
    #[instrument(skip(self, page_order), fields(pages = page_order.len()))]
    pub async fn write_pages(
        &self,
        input: &Path,
        page_order: &[usize],
        destination: &Path,
    ) -> Result<WriteReport> {
        if page_order.is_empty() {
            return Err(PdfToolError::NoPagesSelected);
        }

        let loaded = self.reader.load(input).await?;
        let numbers = page_order
            .iter()
            .map(|&index| {
                u32::try_from(index)
                    .ok()
                    .and_then(|n| n.checked_add(1))
                    .ok_or_else(|| PdfToolError::out_of_range(index, loaded.page_count))
            })
            .collect::<Result<Vec<u32>>>()?;
        let selected = blocking("Page extraction", move || {
            pages::extract_pages(&loaded.document, &numbers)
        })
        .await?;

        let stats = self.writer.save(selected, destination).await?;

        Ok(WriteReport {
            input: input.to_path_buf(),
            output: stats.output_path,
            page_count: page_order.len(),
            file_size: stats.file_size,
        })
    }

    /// Page count, version and size of a document.
    ///
    /// # Errors
    ///
    /// `UnreadableDocument` or `EncryptedDocument`.
    pub async fn probe(&self, input: &Path) -> Result<DocumentInfo> {
        self.reader.probe(input).await
    }

    /// Check that Ghostscript and the rasterizer can be run.
    pub async fn check_tools(&self) -> Vec<ToolStatus> {
        let (gs, rasterizer) = futures::join!(
            self.compressor.tool().status(PROBE_TIMEOUT),
            self.rasterizer.status(PROBE_TIMEOUT)
        );
        vec![gs, rasterizer]
    }
}

/// Run CPU-bound document work on the blocking pool.
async fn blocking<T, F>(what: &'static str, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(work)
        .await
        .map_err(|e| PdfToolError::other(format!("{what} task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/docs/report.pdf", 1, "report_page_1.pdf")]
    #[case("/docs/report.pdf", 12, "report_page_12.pdf")]
    #[case("scan.PDF", 3, "scan_page_3.pdf")]
    fn test_split_page_name(#[case] input: &str, #[case] number: usize, #[case] expected: &str) {
        assert_eq!(split_page_name(Path::new(input), number), expected);
    }

    #[test]
    fn test_default_paths() {
        assert_eq!(
            default_compressed_path(Path::new("/docs/report.pdf")),
            PathBuf::from("/docs/report_compressed.pdf")
        );
        assert_eq!(
            default_reordered_path(Path::new("/docs/report.pdf")),
            PathBuf::from("/docs/report_reordered.pdf")
        );
    }
}
