//! PDF writing and saving operations.
//!
//! Every output goes through a [`StagedOutput`]: a hidden temporary file next
//! to the destination that is renamed into place only once it is complete.
//! Dropping a stage without committing it removes the temporary file, so a
//! failed write never leaves partial output behind.
//!
//! # Examples
//!
//! ```no_run
//! use iatepdfs::io::writer::PdfWriter;
//! use lopdf::Document;
//! use std::path::Path;
//!
//! # async fn example(doc: Document) -> iatepdfs::Result<()> {
//! let writer = PdfWriter::new();
//! let stats = writer.save(doc, Path::new("output.pdf")).await?;
//! println!("Wrote {}", stats.format_file_size());
//! # Ok(())
//! # }
//! ```

use lopdf::Document;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempPath;
use tokio::task;

use crate::error::{PdfToolError, Result};
use crate::utils::format_file_size;

/// Options for writing PDF files.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Compress content streams before writing.
    pub compress: bool,

    /// Drop unreachable objects and renumber the rest.
    pub optimize: bool,

    /// Buffer size for writing (in bytes).
    pub buffer_size: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compress: true,
            optimize: true,
            buffer_size: 8192,
        }
    }
}

/// Statistics about a write operation.
#[derive(Debug, Clone)]
pub struct WriteStatistics {
    /// Time taken to write the file.
    pub write_time: Duration,

    /// Size of the written file in bytes.
    pub file_size: u64,

    /// Path where the file was written.
    pub output_path: PathBuf,
}

impl WriteStatistics {
    /// Format file size as human-readable string.
    pub fn format_file_size(&self) -> String {
        format_file_size(self.file_size)
    }
}

/// A temporary sibling of an output file, renamed into place on commit.
#[derive(Debug)]
pub struct StagedOutput {
    staged: TempPath,
    destination: PathBuf,
}

impl StagedOutput {
    /// Reserve a temporary file in the destination's directory.
    ///
    /// # Errors
    ///
    /// Returns `WriteError` if the directory does not exist or is not
    /// writable.
    pub fn new(destination: &Path) -> Result<Self> {
        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        let staged = tempfile::Builder::new()
            .prefix(".iatepdfs-")
            .suffix(".pdf.part")
            .tempfile_in(parent)
            .map_err(|e| PdfToolError::write_error(destination, e))?
            .into_temp_path();

        Ok(Self {
            staged,
            destination: destination.to_path_buf(),
        })
    }

    /// Path of the temporary file to write into.
    pub fn path(&self) -> &Path {
        &self.staged
    }

    /// Final destination.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Size of what has been written so far.
    pub fn len(&self) -> Result<u64> {
        std::fs::metadata(self.path())
            .map(|m| m.len())
            .map_err(|e| PdfToolError::write_error(&self.destination, e))
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Move the staged file onto its destination, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns `WriteError` if the rename fails; the staged file is removed.
    pub fn commit(self) -> Result<PathBuf> {
        let Self {
            staged,
            destination,
        } = self;

        staged
            .persist(&destination)
            .map_err(|e| PdfToolError::write_error(&destination, e.error))?;

        Ok(destination)
    }
}

/// PDF writer with configurable behavior.
#[derive(Debug, Clone, Default)]
pub struct PdfWriter {
    options: WriteOptions,
}

impl PdfWriter {
    /// Create a new PDF writer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `doc` into a staged sibling of `destination`.
    ///
    /// Nothing is visible at `destination` until the returned stage is
    /// committed.
    ///
    /// # Errors
    ///
    /// Returns `WriteError` if the stage cannot be created or written.
    pub fn stage(&self, doc: &mut Document, destination: &Path) -> Result<StagedOutput> {
        if self.options.optimize {
            doc.prune_objects();
            doc.renumber_objects();
        }
        if self.options.compress {
            doc.compress();
        }

        let staged = StagedOutput::new(destination)?;
        let file = std::fs::File::create(staged.path())
            .map_err(|e| PdfToolError::write_error(destination, e))?;
        let mut writer = std::io::BufWriter::with_capacity(self.options.buffer_size, file);

        doc.save_to(&mut writer)
            .map_err(|e| PdfToolError::write_error(destination, std::io::Error::other(e)))?;
        writer
            .flush()
            .map_err(|e| PdfToolError::write_error(destination, e))?;

        Ok(staged)
    }

    /// Write `doc` to `destination` on the current thread.
    ///
    /// # Errors
    ///
    /// Returns `WriteError` if:
    /// - Output directory doesn't exist
    /// - Insufficient permissions
    /// - Disk full
    pub fn save_blocking(&self, mut doc: Document, destination: &Path) -> Result<WriteStatistics> {
        let start = Instant::now();

        let staged = self.stage(&mut doc, destination)?;
        let file_size = staged.len()?;
        let output_path = staged.commit()?;

        Ok(WriteStatistics {
            write_time: start.elapsed(),
            file_size,
            output_path,
        })
    }

    /// Write `doc` to `destination` on the blocking pool.
    ///
    /// # Errors
    ///
    /// Same as [`PdfWriter::save_blocking`].
    pub async fn save(&self, doc: Document, destination: &Path) -> Result<WriteStatistics> {
        let writer = self.clone();
        let destination = destination.to_path_buf();

        task::spawn_blocking(move || writer.save_blocking(doc, &destination))
            .await
            .map_err(|e| PdfToolError::other(format!("Write task failed: {e}")))?
    }
}
