//! Error types for iatepdfs.
//!
//! Every fallible operation in the crate returns [`PdfToolError`]. Errors are
//! surfaced to the user as notices by the application state and mapped to
//! process exit codes by the command-line front-end.
//!
//! # Error Categories
//!
//! - **External tools**: the compressor or rasterizer is missing, timed out
//!   or exited with a failure status
//! - **Documents**: unreadable, encrypted or not a PDF at all
//! - **Models**: invalid orderings, out-of-range pages, operations attempted
//!   in the wrong state
//! - **Output**: the destination could not be written

use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for iatepdfs operations.
pub type Result<T> = std::result::Result<T, PdfToolError>;

/// Main error type for iatepdfs operations.
#[derive(Debug, thiserror::Error)]
pub enum PdfToolError {
    /// An external binary could not be started because it does not exist.
    #[error(
        "{tool} is not installed or not in your PATH ({})\n  Hint: install it or point to it explicitly",
        .program.display()
    )]
    MissingExternalTool {
        /// Human name of the tool ("Ghostscript", "pdftoppm").
        tool: &'static str,
        /// Program that was invoked.
        program: PathBuf,
    },

    /// An external binary did not finish within its time budget and was killed.
    #[error("{tool} did not finish within {}s and was stopped", .timeout.as_secs_f64())]
    ToolTimedOut {
        /// Human name of the tool.
        tool: &'static str,
        /// The budget that expired.
        timeout: Duration,
    },

    /// An external binary ran but reported failure.
    #[error("{tool} failed ({})\n  {stderr}", describe_exit(.exit_code))]
    ToolExecutionFailed {
        /// Human name of the tool.
        tool: &'static str,
        /// Exit status, `None` when the process was terminated by a signal.
        exit_code: Option<i32>,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// The document could not be opened or parsed.
    #[error("Failed to read PDF: {}\n  Reason: {reason}", .path.display())]
    UnreadableDocument {
        /// Path to the document.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// The document is encrypted; such documents are not supported.
    #[error("unsupported: encrypted document: {}", .path.display())]
    EncryptedDocument {
        /// Path to the encrypted document.
        path: PathBuf,
    },

    /// The file does not look like a PDF.
    #[error("Not a PDF file: {}", .path.display())]
    NotAPdf {
        /// Path to the rejected file.
        path: PathBuf,
    },

    /// The file is already part of the list.
    #[error("File is already in the list: {}", .path.display())]
    DuplicateFile {
        /// Path to the duplicate file.
        path: PathBuf,
    },

    /// Too few files for a merge.
    #[error("Need at least {needed} PDF file(s) to merge, found {found}")]
    NotEnoughFiles {
        /// Minimum number of files.
        needed: usize,
        /// Number of files available.
        found: usize,
    },

    /// A supplied ordering is not a permutation of the expected items.
    #[error("Invalid order: {reason}")]
    InvalidPermutation {
        /// What is wrong with the ordering.
        reason: String,
    },

    /// A list position or page index does not exist.
    #[error("Position {index} is out of range ({len} item(s))")]
    OutOfRange {
        /// Requested position or index.
        index: usize,
        /// Number of items available.
        len: usize,
    },

    /// Every page is marked deleted, nothing would be written.
    #[error("No pages left to write: every page is marked for deletion")]
    NoPagesSelected,

    /// The destination could not be created or written.
    #[error("Failed to write output file: {}\n  Reason: {source}", .path.display())]
    WriteError {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The operation is not valid in the current state.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// What was attempted.
        operation: &'static str,
        /// Description of the current state.
        state: String,
    },

    /// Another long-running task is in progress.
    #[error("A task is already in progress")]
    Busy,

    /// Invalid settings.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// What is wrong with the settings.
        message: String,
    },

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// Generic error with a custom message.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by a signal".to_string(),
    }
}

impl From<lopdf::Error> for PdfToolError {
    fn from(err: lopdf::Error) -> Self {
        Self::other(err.to_string())
    }
}

impl PdfToolError {
    /// Create a MissingExternalTool error.
    pub fn missing_tool(tool: &'static str, program: impl Into<PathBuf>) -> Self {
        Self::MissingExternalTool {
            tool,
            program: program.into(),
        }
    }

    /// Create an UnreadableDocument error.
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnreadableDocument {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an EncryptedDocument error.
    pub fn encrypted(path: impl Into<PathBuf>) -> Self {
        Self::EncryptedDocument { path: path.into() }
    }

    /// Create an InvalidPermutation error.
    pub fn invalid_permutation(reason: impl Into<String>) -> Self {
        Self::InvalidPermutation {
            reason: reason.into(),
        }
    }

    /// Create a WriteError.
    pub fn write_error(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::WriteError {
            path: path.into(),
            source,
        }
    }

    /// Create an OutOfRange error.
    pub fn out_of_range(index: usize, len: usize) -> Self {
        Self::OutOfRange { index, len }
    }

    /// Create an InvalidState error.
    pub fn invalid_state(operation: &'static str, state: impl Into<String>) -> Self {
        Self::InvalidState {
            operation,
            state: state.into(),
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an Other error with a custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// True when the tool could not be used at all: missing, or hung until
    /// its timeout expired.
    pub fn is_tool_unavailable(&self) -> bool {
        matches!(
            self,
            Self::MissingExternalTool { .. } | Self::ToolTimedOut { .. }
        )
    }

    /// Check if this error only concerns one input among several.
    ///
    /// Adding a batch of dropped files skips entries failing with these and
    /// keeps going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnreadableDocument { .. }
                | Self::EncryptedDocument { .. }
                | Self::NotAPdf { .. }
                | Self::DuplicateFile { .. }
        )
    }

    /// Get the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingExternalTool { .. } => 127,
            Self::ToolTimedOut { .. } => 124,
            Self::ToolExecutionFailed { .. } => 6,
            Self::UnreadableDocument { .. } => 3,
            Self::EncryptedDocument { .. } => 3,
            Self::NotAPdf { .. } => 3,
            Self::DuplicateFile { .. } => 1,
            Self::NotEnoughFiles { .. } => 1,
            Self::InvalidPermutation { .. } => 1,
            Self::OutOfRange { .. } => 1,
            Self::NoPagesSelected => 1,
            Self::WriteError { .. } => 5,
            Self::InvalidState { .. } => 1,
            Self::Busy => 4,
            Self::InvalidConfig { .. } => 1,
            Self::Io { .. } => 5,
            Self::Other { .. } => 1,
        }
    }
}
