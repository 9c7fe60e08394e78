//! Page editing session for a single document.
//!
//! A [`PageList`] holds the pages of at most one open document. Pages can be
//! reordered and marked deleted; nothing touches the file until a commit,
//! which hands a [`CommitPlan`] to the backend.
//!
//! States:
//!
//! ```text
//! Unloaded --open--> Loading --previews done--> Ready
//! Ready --begin_commit--> Committing --finish_commit--> Ready
//! any --close--> Unloaded
//! ```
//!
//! Positions of all entries always form a permutation of `0..N`. After a
//! reorder, the live (non-deleted) entries hold `0..N_live` and the
//! deleted ones follow.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::drag::{Reorderable, validate_permutation};
use crate::error::{PdfToolError, Result};
use crate::thumbnail::Thumbnail;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Identity of an opened document; never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        Self(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Lifecycle of the page list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No document open.
    Unloaded,
    /// Document open, previews still being rendered.
    Loading,
    /// Editable.
    Ready,
    /// Writing the edited document.
    Committing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unloaded => "no document is open",
            Self::Loading => "the document is still loading",
            Self::Ready => "the document is ready",
            Self::Committing => "the document is being saved",
        };
        f.write_str(text)
    }
}

/// One page of the open document.
#[derive(Debug, Clone)]
pub struct PageEntry {
    /// 0-based index of the page in the source file.
    pub source_index: usize,
    /// Current position in the edited order.
    pub position: usize,
    /// Hidden from the output; kept until commit.
    pub deleted: bool,
    /// Preview; `None` while pending.
    pub thumbnail: Option<Thumbnail>,
}

impl PageEntry {
    /// 1-based page number in the source file.
    pub fn page_number(&self) -> usize {
        self.source_index + 1
    }
}

/// What a commit should write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitPlan {
    /// Session the plan belongs to.
    pub session: SessionId,
    /// Source document.
    pub source: PathBuf,
    /// Source indices of the live pages, in output order.
    pub page_order: Vec<usize>,
}

#[derive(Debug)]
struct Session {
    id: SessionId,
    source: PathBuf,
    /// Indexed by source index.
    entries: Vec<PageEntry>,
}

/// Page list state machine.
#[derive(Debug)]
pub struct PageList {
    state: SessionState,
    session: Option<Session>,
    last_error: Option<String>,
}

impl PageList {
    /// Create an empty page list.
    pub fn new() -> Self {
        Self {
            state: SessionState::Unloaded,
            session: None,
            last_error: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Id of the open session.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Source document of the open session.
    pub fn source(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.source.as_path())
    }

    /// Message of the last failed commit, cleared by a successful one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Open `page_count` pages of `source` as session `id`.
    ///
    /// # Errors
    ///
    /// - `InvalidState` while loading or committing
    /// - `UnreadableDocument` for a document without pages
    pub fn open(&mut self, id: SessionId, source: &Path, page_count: usize) -> Result<()> {
        if !matches!(self.state, SessionState::Unloaded | SessionState::Ready) {
            return Err(PdfToolError::invalid_state("open a document", self.state.to_string()));
        }
        if page_count == 0 {
            return Err(PdfToolError::unreadable(source, "PDF has no pages"));
        }

        let entries = (0..page_count)
            .map(|index| PageEntry {
                source_index: index,
                position: index,
                deleted: false,
                thumbnail: None,
            })
            .collect();

        self.session = Some(Session {
            id,
            source: source.to_path_buf(),
            entries,
        });
        self.state = SessionState::Loading;
        self.last_error = None;
        Ok(())
    }

    /// Close the open session from any state.
    pub fn close(&mut self) -> Option<SessionId> {
        self.state = SessionState::Unloaded;
        self.last_error = None;
        self.session.take().map(|s| s.id)
    }

    /// Record the preview of `source_index`.
    ///
    /// Results for another session are ignored and reported as `false`.
    /// Once every page has a preview, Loading moves to Ready.
    pub fn thumbnail_ready(
        &mut self,
        session: SessionId,
        source_index: usize,
        thumbnail: Thumbnail,
    ) -> bool {
        let Some(current) = self.session.as_mut().filter(|s| s.id == session) else {
            return false;
        };
        let Some(entry) = current.entries.get_mut(source_index) else {
            return false;
        };
        entry.thumbnail = Some(thumbnail);

        if self.state == SessionState::Loading && self.pending_previews() == 0 {
            self.state = SessionState::Ready;
        }
        true
    }

    /// Number of pages still waiting for a preview.
    pub fn pending_previews(&self) -> usize {
        self.entries()
            .iter()
            .filter(|entry| entry.thumbnail.is_none())
            .count()
    }

    /// Move Loading to Ready without waiting for previews.
    pub fn mark_ready(&mut self) {
        if self.state == SessionState::Loading {
            self.state = SessionState::Ready;
        }
    }

    /// Number of pages, deleted ones included.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether no document is open.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// All entries by position.
    pub fn ordered(&self) -> Vec<&PageEntry> {
        let mut entries: Vec<&PageEntry> = self.entries().iter().collect();
        entries.sort_by_key(|entry| entry.position);
        entries
    }

    /// Live entries by position; what the page grid shows.
    pub fn visible(&self) -> Vec<&PageEntry> {
        self.ordered()
            .into_iter()
            .filter(|entry| !entry.deleted)
            .collect()
    }

    /// Deleted entries by position.
    pub fn deleted(&self) -> Vec<&PageEntry> {
        self.ordered()
            .into_iter()
            .filter(|entry| entry.deleted)
            .collect()
    }

    /// Entry at `position`.
    pub fn at_position(&self, position: usize) -> Option<&PageEntry> {
        self.entries()
            .iter()
            .find(|entry| entry.position == position)
    }

    /// Reorder the live pages.
    ///
    /// `order[k]` is the current position of the page that moves to
    /// position `k`. Live pages take positions `0..N_live` in that order;
    /// deleted pages follow in their previous relative order.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless Ready
    /// - `InvalidPermutation` unless `order` lists every live position
    ///   exactly once
    pub fn reorder(&mut self, order: &[usize]) -> Result<()> {
        self.require(SessionState::Ready, "reorder pages")?;

        let live_positions: Vec<usize> = self.visible().iter().map(|e| e.position).collect();
        let mut requested = order.to_vec();
        requested.sort_unstable();
        if requested != live_positions {
            return Err(PdfToolError::invalid_permutation(format!(
                "expected each of the {} visible page position(s) exactly once",
                live_positions.len()
            )));
        }

        let deleted_positions: Vec<usize> = self.deleted().iter().map(|e| e.position).collect();
        let live_count = order.len();

        let Some(session) = self.session.as_mut() else {
            return Err(PdfToolError::invalid_state("reorder pages", SessionState::Unloaded.to_string()));
        };

        // Map old position -> new position, then apply in one pass.
        let mut new_position = vec![0; session.entries.len()];
        for (k, &old) in order.iter().enumerate() {
            new_position[old] = k;
        }
        for (offset, &old) in deleted_positions.iter().enumerate() {
            new_position[old] = live_count + offset;
        }
        for entry in &mut session.entries {
            entry.position = new_position[entry.position];
        }

        Ok(())
    }

    /// Hide the page at `position` from the output.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless Loading or Ready; `OutOfRange` for a bad
    /// position.
    pub fn mark_deleted(&mut self, position: usize) -> Result<()> {
        self.set_deleted(position, true)
    }

    /// Bring back the page at `position`.
    ///
    /// # Errors
    ///
    /// Same as [`PageList::mark_deleted`].
    pub fn unmark_deleted(&mut self, position: usize) -> Result<()> {
        self.set_deleted(position, false)
    }

    /// Flip the deleted flag of the page at `position`; returns the new flag.
    ///
    /// # Errors
    ///
    /// Same as [`PageList::mark_deleted`].
    pub fn toggle_deleted(&mut self, position: usize) -> Result<bool> {
        let deleted = self
            .at_position(position)
            .map(|entry| entry.deleted)
            .ok_or_else(|| PdfToolError::out_of_range(position, self.len()))?;
        self.set_deleted(position, !deleted)?;
        Ok(!deleted)
    }

    /// Start writing the edits out.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless Ready
    /// - `NoPagesSelected` if every page is deleted; the state is unchanged
    pub fn begin_commit(&mut self) -> Result<CommitPlan> {
        self.require(SessionState::Ready, "save")?;

        let page_order: Vec<usize> = self.visible().iter().map(|e| e.source_index).collect();
        if page_order.is_empty() {
            return Err(PdfToolError::NoPagesSelected);
        }

        let Some(session) = self.session.as_ref() else {
            return Err(PdfToolError::invalid_state("save", SessionState::Unloaded.to_string()));
        };
        let plan = CommitPlan {
            session: session.id,
            source: session.source.clone(),
            page_order,
        };

        self.state = SessionState::Committing;
        Ok(plan)
    }

    /// Record the commit's outcome and return to Ready.
    ///
    /// Positions and flags are left as they were either way.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless Committing.
    pub fn finish_commit<T>(&mut self, outcome: &Result<T>) -> Result<()> {
        self.require(SessionState::Committing, "finish saving")?;

        self.last_error = outcome.as_ref().err().map(|err| err.to_string());
        self.state = SessionState::Ready;
        Ok(())
    }

    fn set_deleted(&mut self, position: usize, deleted: bool) -> Result<()> {
        if !matches!(self.state, SessionState::Loading | SessionState::Ready) {
            return Err(PdfToolError::invalid_state("change pages", self.state.to_string()));
        }

        let len = self.len();
        let entry = self
            .session
            .as_mut()
            .and_then(|s| s.entries.iter_mut().find(|e| e.position == position))
            .ok_or_else(|| PdfToolError::out_of_range(position, len))?;
        entry.deleted = deleted;
        Ok(())
    }

    fn require(&self, state: SessionState, operation: &'static str) -> Result<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(PdfToolError::invalid_state(operation, self.state.to_string()))
        }
    }

    fn entries(&self) -> &[PageEntry] {
        self.session
            .as_ref()
            .map(|s| s.entries.as_slice())
            .unwrap_or_default()
    }
}

impl Default for PageList {
    fn default() -> Self {
        Self::new()
    }
}

/// Reordering through the page grid, which only shows live pages:
/// `order` indexes the visible list.
impl Reorderable for PageList {
    fn item_count(&self) -> usize {
        self.visible().len()
    }

    fn apply_order(&mut self, order: &[usize]) -> Result<()> {
        let visible_positions: Vec<usize> = self.visible().iter().map(|e| e.position).collect();
        validate_permutation(order, visible_positions.len())?;

        let positions: Vec<usize> = order.iter().map(|&i| visible_positions[i]).collect();
        self.reorder(&positions)
    }
}
