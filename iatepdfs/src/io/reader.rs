//! PDF reading and loading operations.
//!
//! This module provides PDF loading with support for:
//! - Header sniffing before a file is accepted
//! - Encrypted document detection
//! - Ordered concurrent loading of many files
//! - Lightweight document probing for the `info` command
//!
//! Parsing is CPU-bound, so async entry points run the parser on the
//! blocking pool.
//!
//! # Examples
//!
//! ```no_run
//! use iatepdfs::io::reader::PdfReader;
//! use std::path::PathBuf;
//!
//! # async fn example() -> iatepdfs::Result<()> {
//! let reader = PdfReader::new();
//! let paths = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
//! let loaded = reader.load_all(&paths, 4).await?;
//! # Ok(())
//! # }
//! ```

use lopdf::Document;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task;
use tracing::debug;

use crate::error::{PdfToolError, Result};

/// Magic bytes every PDF starts with.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// A loaded PDF document with metadata.
#[derive(Debug)]
pub struct LoadedPdf {
    /// The PDF document.
    pub document: Document,

    /// Path to the source file.
    pub path: PathBuf,

    /// Number of pages in the document.
    pub page_count: usize,

    /// Time taken to load the document.
    pub load_time: Duration,

    /// File size in bytes.
    pub file_size: u64,
}

/// Summary of a document, without keeping it in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    /// Path to the document.
    pub path: PathBuf,
    /// Number of pages.
    pub page_count: usize,
    /// PDF version from the header, e.g. "1.7".
    pub version: String,
    /// File size in bytes.
    pub file_size: u64,
}

/// PDF reader with configurable loading behavior.
#[derive(Debug, Clone)]
pub struct PdfReader {
    /// Whether a document without pages counts as unreadable.
    require_pages: bool,
}

impl PdfReader {
    /// Create a new PDF reader with default settings.
    pub fn new() -> Self {
        Self {
            require_pages: true,
        }
    }

    /// Load a single PDF document on the current thread.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the PDF file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File cannot be read (`UnreadableDocument`)
    /// - PDF is encrypted (`EncryptedDocument`)
    /// - PDF has no pages (`UnreadableDocument`)
    pub fn load_blocking(&self, path: &Path) -> Result<LoadedPdf> {
        let start = Instant::now();

        let document = Document::load(path).map_err(|e| {
            let err_msg = e.to_string();
            let lowered = err_msg.to_lowercase();
            if lowered.contains("encrypt") || lowered.contains("password") || lowered.contains("decrypt") {
                PdfToolError::encrypted(path)
            } else {
                PdfToolError::unreadable(path, err_msg)
            }
        })?;

        if document.is_encrypted() || document.trailer.has(b"Encrypt") {
            return Err(PdfToolError::encrypted(path));
        }

        let page_count = document.get_pages().len();
        if self.require_pages && page_count == 0 {
            return Err(PdfToolError::unreadable(path, "PDF has no pages"));
        }

        let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let load_time = start.elapsed();
        debug!(path = %path.display(), page_count, ?load_time, "loaded document");

        Ok(LoadedPdf {
            document,
            path: path.to_path_buf(),
            page_count,
            load_time,
            file_size,
        })
    }

    /// Load a single PDF document on the blocking pool.
    ///
    /// # Errors
    ///
    /// Same as [`PdfReader::load_blocking`].
    pub async fn load(&self, path: &Path) -> Result<LoadedPdf> {
        let reader = self.clone();
        let path = path.to_path_buf();
        task::spawn_blocking(move || reader.load_blocking(&path))
            .await
            .map_err(|e| PdfToolError::other(format!("Load task failed: {e}")))?
    }

    /// Load multiple PDF documents concurrently, keeping input order.
    ///
    /// # Arguments
    ///
    /// * `paths` - Paths to PDF files
    /// * `workers` - Number of documents parsed at once
    ///
    /// # Errors
    ///
    /// Fails with the first failing document's error, in input order.
    pub async fn load_all(&self, paths: &[PathBuf], workers: usize) -> Result<Vec<LoadedPdf>> {
        use futures::stream::{self, StreamExt};

        let workers = workers.max(1);

        let tasks = paths.to_vec().into_iter().map(|path| {
            let reader = self.clone();
            async move { reader.load(&path).await }
        });

        // `buffered` keeps results in input order.
        stream::iter(tasks)
            .buffered(workers)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect()
    }

    /// Read page count, version and size of a document.
    ///
    /// # Errors
    ///
    /// Same as [`PdfReader::load_blocking`].
    pub async fn probe(&self, path: &Path) -> Result<DocumentInfo> {
        let loaded = self.load(path).await?;
        Ok(DocumentInfo {
            version: loaded.document.version.clone(),
            path: loaded.path,
            page_count: loaded.page_count,
            file_size: loaded.file_size,
        })
    }
}

impl Default for PdfReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Check whether a file starts with the `%PDF-` header.
///
/// # Errors
///
/// Returns `UnreadableDocument` if the file cannot be opened.
pub fn has_pdf_header(path: &Path) -> Result<bool> {
    let mut file =
        std::fs::File::open(path).map_err(|e| PdfToolError::unreadable(path, e.to_string()))?;

    let mut magic = [0u8; 5];
    let mut filled = 0;
    while filled < magic.len() {
        let read = file
            .read(&mut magic[filled..])
            .map_err(|e| PdfToolError::unreadable(path, e.to_string()))?;
        if read == 0 {
            break;
        }
        filled += read;
    }

    Ok(&magic[..filled] == PDF_MAGIC)
}
