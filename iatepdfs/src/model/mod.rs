//! List models driven by the interface thread.

pub mod file_list;
pub mod page_list;

pub use file_list::{FileEntry, FileId, FileList};
pub use page_list::{CommitPlan, PageEntry, PageList, SessionId, SessionState};
