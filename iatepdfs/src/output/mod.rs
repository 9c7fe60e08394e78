//! Output formatting and display for iatepdfs.
//!
//! This module handles all user-facing output of the command line:
//! - Formatted status messages
//! - Notices posted by the application state
//! - Summary reports for documents and tools
//! - Quiet and verbose modes
//!
//! # Examples
//!
//! ```no_run
//! use iatepdfs::output::OutputFormatter;
//!
//! let formatter = OutputFormatter::new(false, false);
//! formatter.info("Merging 3 files");
//! formatter.success("Merged 3 files into merged.pdf");
//! ```

pub mod formatter;

pub use formatter::{MessageLevel, OutputFormatter};

use crate::app::Notice;
use crate::backend::SplitReport;
use crate::io::DocumentInfo;
use crate::tools::ToolStatus;
use crate::utils::format_file_size;

/// Print notices in the order they were posted.
pub fn display_notices(formatter: &OutputFormatter, notices: &[Notice]) {
    for notice in notices {
        formatter.notice(notice);
    }
}

/// Display a document summary.
pub fn display_document_info(formatter: &OutputFormatter, info: &DocumentInfo) {
    formatter.info(&info.path.display().to_string());
    formatter.detail("Pages", &info.page_count.to_string());
    formatter.detail("Version", &info.version);
    formatter.detail("Size", &format_file_size(info.file_size));
}

/// Display the files written by a split.
pub fn display_split_report(formatter: &OutputFormatter, report: &SplitReport) {
    if formatter.is_verbose() {
        for (index, output) in report.outputs.iter().enumerate() {
            formatter.list_item(index + 1, &output.display().to_string());
        }
    }
}

/// Display tool availability. Returns whether every tool is available.
pub fn display_tool_status(formatter: &OutputFormatter, tools: &[ToolStatus]) -> bool {
    for tool in tools {
        if tool.available {
            let version = tool.version.as_deref().unwrap_or("unknown version");
            formatter.success(&format!("{}: {version}", tool.name));
        } else {
            let reason = tool.error.as_deref().unwrap_or("unavailable");
            formatter.warning(&format!("{}: {reason}", tool.name));
        }
    }
    tools.iter().all(|tool| tool.available)
}
