//! iatepdfs - Merge, compress, split and reorder the pages of PDF documents.
//!
//! This library holds everything behind the interface of the desktop tool:
//!
//! - An ordered file list for merging and a page editing session with
//!   reordering and deletion marks
//! - A drag-and-drop controller independent of the toolkit
//! - Background page previews rendered with Poppler's `pdftoppm`
//! - Document transforms: merge, split and page extraction with `lopdf`,
//!   compression with Ghostscript
//! - An application state object that ties them together on a tokio
//!   runtime without ever blocking the interface thread
//!
//! # Examples
//!
//! ## Driving the application state
//!
//! ```no_run
//! use iatepdfs::app::{AppState, CompletedJob};
//! use iatepdfs::config::Settings;
//! use std::path::Path;
//! use std::time::Duration;
//!
//! # fn example() -> iatepdfs::Result<()> {
//! let mut app = AppState::new(Settings::default())?;
//! app.add_files(&["a.pdf", "b.pdf"]);
//! app.merge_all(Path::new("merged.pdf"))?;
//!
//! if let Some(CompletedJob::Merged(report)) = app.wait_for_job(Duration::from_secs(60)) {
//!     println!("Created {} page document", report.total_pages);
//! }
//! app.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! ## Using the backend directly
//!
//! ```no_run
//! use iatepdfs::backend::PdfBackend;
//! use iatepdfs::config::{QualityPreset, Settings};
//! use std::path::Path;
//!
//! # async fn example() -> iatepdfs::Result<()> {
//! let backend = PdfBackend::new(&Settings::default());
//! let report = backend
//!     .compress(Path::new("scan.pdf"), QualityPreset::Screen, Path::new("small.pdf"))
//!     .await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod app;
pub mod backend;
pub mod config;
pub mod drag;
pub mod error;
pub mod io;
pub mod model;
pub mod output;
pub mod tasks;
pub mod thumbnail;
pub mod tools;
pub mod utils;
pub mod view;

// Re-export commonly used types
pub use app::AppState;
pub use config::{QualityPreset, Settings};
pub use error::{PdfToolError, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
