//! Application state.
//!
//! [`AppState`] is the single object a front-end drives. It owns the file
//! list, the page editing session, the thumbnail generator, the backend and
//! the tokio runtime everything runs on. It is meant to live on the thread
//! that handles user events; nothing in it is shared with the workers.
//!
//! Backend jobs (merge, compress, split, save) run one at a time. Their
//! results come back through a completion queue and are applied by
//! [`AppState::pump`], which a GUI calls from its idle loop, or by the
//! blocking [`AppState::wait_for_job`] used by the command line.
//!
//! Errors never escape half-applied: a request that cannot start returns
//! the error and also posts it as a [`Notice`]; a job that fails reports
//! [`CompletedJob::Failed`] and leaves the models as they were.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::backend::{
    CompressionReport, MergeReport, PdfBackend, SplitReport, WriteReport, default_compressed_path,
    default_reordered_path,
};
use crate::config::{QualityPreset, Settings};
use crate::drag::{Axis, DragController, DropOutcome, Point};
use crate::error::{PdfToolError, Result};
use crate::io::DocumentInfo;
use crate::model::{FileEntry, FileId, FileList, PageList, SessionId, SessionState};
use crate::tasks::CompletionQueue;
use crate::thumbnail::{
    PopplerRasterizer, Rasterizer, ThumbnailDelivery, ThumbnailGenerator, ThumbnailOwner,
    ThumbnailTarget,
};
use crate::tools::ToolStatus;
use crate::view::{FileRow, GridLayout, ListLayout, PageTile, file_rows, page_tiles};

/// Grace period for background work when shutting down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Progress information.
    Info,
    /// A job finished.
    Success,
    /// Something was skipped or degraded.
    Warning,
    /// A request or job failed.
    Error,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text to show.
    pub text: String,
}

impl Notice {
    fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Kind of background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Opening a document for page editing.
    Open,
    /// Merging the file list.
    Merge,
    /// Compressing the selected file.
    Compress,
    /// Splitting the selected file.
    Split,
    /// Saving the edited page order.
    Save,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Open => "Open",
            Self::Merge => "Merge",
            Self::Compress => "Compression",
            Self::Split => "Split",
            Self::Save => "Save",
        };
        f.write_str(text)
    }
}

/// A background job that has been applied to the state.
#[derive(Debug)]
pub enum CompletedJob {
    /// A document is open for page editing.
    Opened(DocumentInfo),
    /// The file list was merged; merged entries have been removed.
    Merged(MergeReport),
    /// The selected file was compressed.
    Compressed(CompressionReport),
    /// The selected file was split.
    Split(SplitReport),
    /// The edited page order was written.
    Saved(WriteReport),
    /// The job failed; nothing was changed.
    Failed {
        /// Which job.
        kind: JobKind,
        /// Why.
        error: PdfToolError,
    },
}

/// Result of adding files.
#[derive(Debug, Default)]
pub struct AddReport {
    /// Entries created, in order.
    pub added: Vec<FileId>,
    /// Paths that were skipped and why.
    pub rejected: Vec<(PathBuf, PdfToolError)>,
}

/// What one [`AppState::pump`] applied.
#[derive(Debug, Default)]
pub struct PumpReport {
    /// Jobs that finished.
    pub jobs: Vec<CompletedJob>,
    /// Previews attached to files or pages.
    pub thumbnails_applied: usize,
    /// Previews discarded because their owner had gone away.
    pub stale_dropped: u64,
}

#[derive(Debug)]
enum JobOutcome {
    Opened {
        session: SessionId,
        path: PathBuf,
        result: Result<DocumentInfo>,
    },
    Merged {
        files: Vec<FileId>,
        result: Result<MergeReport>,
    },
    Compressed(Result<CompressionReport>),
    Split(Result<SplitReport>),
    Saved {
        session: SessionId,
        result: Result<WriteReport>,
    },
}

enum Event {
    Job(JobOutcome),
    Thumbnail(ThumbnailDelivery),
}

/// Everything a front-end drives.
pub struct AppState<R = PopplerRasterizer> {
    runtime: Runtime,
    settings: Settings,
    backend: Arc<PdfBackend>,
    files: FileList,
    pages: PageList,
    thumbnails: ThumbnailGenerator<R>,
    quality: QualityPreset,
    jobs: CompletionQueue<JobOutcome>,
    active_job: Option<JobKind>,
    pending_open: Option<SessionId>,
    document: Option<DocumentInfo>,
    finished: VecDeque<CompletedJob>,
    notices: VecDeque<Notice>,
    preview_warnings: Vec<String>,
    file_drag: DragController<FileId>,
    page_drag: DragController<usize>,
    list_layout: ListLayout,
    grid_layout: GridLayout,
}

impl AppState<PopplerRasterizer> {
    /// Start the application with the Poppler rasterizer.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for bad settings; `Io` if the runtime cannot start.
    pub fn new(settings: Settings) -> Result<Self> {
        let rasterizer = PopplerRasterizer::new(settings.tools.rasterizer.clone());
        Self::with_rasterizer(settings, rasterizer)
    }
}

impl<R: Rasterizer> AppState<R> {
    /// Start the application with a custom preview renderer.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for bad settings; `Io` if the runtime cannot start.
    pub fn with_rasterizer(settings: Settings, rasterizer: R) -> Result<Self> {
        settings.validate()?;

        let workers = settings.effective_jobs();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name("iatepdfs-worker")
            .enable_all()
            .build()?;

        let thumbnails = ThumbnailGenerator::new(
            rasterizer,
            runtime.handle().clone(),
            settings.thumbnails,
            settings.timeouts.thumbnail,
            workers,
        );

        debug!(workers, "application started");
        Ok(Self {
            backend: Arc::new(PdfBackend::new(&settings)),
            runtime,
            settings,
            files: FileList::new(),
            pages: PageList::new(),
            thumbnails,
            quality: QualityPreset::default(),
            jobs: CompletionQueue::new(),
            active_job: None,
            pending_open: None,
            document: None,
            finished: VecDeque::new(),
            notices: VecDeque::new(),
            preview_warnings: Vec::new(),
            file_drag: DragController::new(Axis::Vertical),
            page_drag: DragController::new(Axis::Horizontal),
            list_layout: ListLayout::default(),
            grid_layout: GridLayout::default(),
        })
    }

    /// Settings the application was started with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The file list.
    pub fn files(&self) -> &FileList {
        &self.files
    }

    /// The page editing session.
    pub fn pages(&self) -> &PageList {
        &self.pages
    }

    /// Summary of the document open for page editing.
    pub fn document(&self) -> Option<&DocumentInfo> {
        self.document.as_ref()
    }

    /// Preset used by the next compression.
    pub fn quality(&self) -> QualityPreset {
        self.quality
    }

    /// Choose the compression preset.
    pub fn set_quality(&mut self, preset: QualityPreset) {
        self.quality = preset;
    }

    /// Job currently running, if any.
    pub fn active_job(&self) -> Option<JobKind> {
        self.active_job
    }

    /// Whether a backend job is running.
    pub fn is_busy(&self) -> bool {
        self.active_job.is_some()
    }

    /// Take the notices posted so far, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    /// Replace the file list geometry.
    pub fn set_list_layout(&mut self, layout: ListLayout) {
        self.list_layout = layout;
    }

    /// Replace the page grid geometry.
    pub fn set_grid_layout(&mut self, layout: GridLayout) {
        self.grid_layout = layout;
    }

    /// Rows to draw for the file list.
    pub fn file_rows(&self) -> Vec<FileRow> {
        file_rows(&self.files, &self.list_layout)
    }

    /// Tiles to draw for the page grid.
    pub fn page_tiles(&self) -> Vec<PageTile> {
        page_tiles(&self.pages, &self.grid_layout)
    }

    // ---- file list ----

    /// Append files to the list and start their previews.
    ///
    /// Files that cannot be added are skipped with a warning notice. If
    /// nothing was selected, the first added file becomes selected.
    pub fn add_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> AddReport {
        let mut report = AddReport::default();

        for path in paths {
            let path = path.as_ref();
            match self.files.add(path) {
                Ok(entry) => {
                    let (id, canonical) = (entry.id, entry.path.clone());
                    if self.settings.previews {
                        self.thumbnails.request(ThumbnailTarget::file(id), &canonical);
                    }
                    report.added.push(id);
                }
                Err(err) => {
                    let level = if err.is_recoverable() {
                        NoticeLevel::Warning
                    } else {
                        NoticeLevel::Error
                    };
                    self.notify(level, format!("Skipped {}: {err}", path.display()));
                    report.rejected.push((path.to_path_buf(), err));
                }
            }
        }

        if self.files.selected().is_none()
            && let Some(index) = report.added.first().and_then(|&id| self.files.position(id))
        {
            let _ = self.files.select(index);
        }

        report
    }

    /// Select the file that compress and split act on.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if there is no such row.
    pub fn select_file(&mut self, index: usize) -> Result<&FileEntry> {
        self.files.select(index)
    }

    /// Remove a file and forget its pending preview.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if there is no such row.
    pub fn remove_file(&mut self, index: usize) -> Result<FileEntry> {
        let entry = self.files.remove(index)?;
        self.thumbnails.invalidate(ThumbnailOwner::File(entry.id));
        self.file_drag.cancel();
        Ok(entry)
    }

    /// Empty the file list and close the page editor.
    ///
    /// Pending previews of the removed files are dropped.
    ///
    /// # Errors
    ///
    /// `InvalidState` while the open document is being saved; nothing is
    /// cleared then.
    pub fn clear_files(&mut self) -> Result<()> {
        if self.pages.state() == SessionState::Committing {
            let err = PdfToolError::invalid_state("clear the lists", self.pages.state().to_string());
            return Err(self.refuse(err));
        }

        let removed = self.files.clear();
        let dropped: usize = removed
            .iter()
            .map(|&id| self.thumbnails.invalidate(ThumbnailOwner::File(id)))
            .sum();
        self.file_drag.cancel();
        self.close_session();

        debug!(files = removed.len(), dropped, "lists cleared");
        Ok(())
    }

    /// Move a file from one row to another.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if either row is missing.
    pub fn move_file(&mut self, from: usize, to: usize) -> Result<()> {
        self.files.move_item(from, to)
    }

    /// Move a file one row up. Returns `false` if it is already first.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if there is no such row.
    pub fn move_file_up(&mut self, index: usize) -> Result<bool> {
        self.files.move_up(index)
    }

    /// Move a file one row down. Returns `false` if it is already last.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if there is no such row.
    pub fn move_file_down(&mut self, index: usize) -> Result<bool> {
        self.files.move_down(index)
    }

    /// Pick up the file row at `index`.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if there is no such row.
    pub fn begin_file_drag(&mut self, index: usize) -> Result<()> {
        let rows = self.file_rows();
        self.file_drag.pick_up(&rows, index)
    }

    /// Track the pointer over the file list; returns the insertion slot.
    pub fn hover_file_drag(&self, pointer: Point) -> Option<usize> {
        let rows = self.file_rows();
        let container = self.list_layout.container(rows.len());
        self.file_drag.hover(&rows, container, pointer)
    }

    /// Drop the picked-up file row at `pointer`.
    ///
    /// # Errors
    ///
    /// Propagates a rejected ordering; the list is unchanged then.
    pub fn drop_file_drag(&mut self, pointer: Point) -> Result<DropOutcome> {
        let rows = self.file_rows();
        let container = self.list_layout.container(rows.len());
        self.file_drag
            .drop_onto(&rows, container, pointer, &mut self.files)
    }

    /// Opacity to draw a file row with.
    pub fn file_opacity(&self, id: FileId) -> f32 {
        self.file_drag.opacity(id)
    }

    // ---- page editing ----

    /// Open a document for page editing, replacing any open one.
    ///
    /// The document is read in the background; it shows up in the page list
    /// once a later [`AppState::pump`] applies the result. Previews of the
    /// replaced session are discarded.
    ///
    /// # Errors
    ///
    /// `InvalidState` while the open document is being saved.
    pub fn open_document(&mut self, path: &Path) -> Result<SessionId> {
        if self.pages.state() == SessionState::Committing {
            let err = PdfToolError::invalid_state("open a document", self.pages.state().to_string());
            return Err(self.refuse(err));
        }

        self.close_session();

        let session = SessionId::next();
        self.pending_open = Some(session);

        let backend = Arc::clone(&self.backend);
        let path = path.to_path_buf();
        self.spawn(async move {
            let result = backend.probe(&path).await;
            JobOutcome::Opened {
                session,
                path,
                result,
            }
        });

        debug!(%session, "opening document");
        Ok(session)
    }

    /// Close the open document, discarding unsaved edits.
    ///
    /// # Errors
    ///
    /// `InvalidState` while the document is being saved.
    pub fn close_document(&mut self) -> Result<()> {
        if self.pages.state() == SessionState::Committing {
            let err =
                PdfToolError::invalid_state("close the document", self.pages.state().to_string());
            return Err(self.refuse(err));
        }
        self.close_session();
        Ok(())
    }

    /// Hide the page at `position` from the output.
    ///
    /// # Errors
    ///
    /// See [`PageList::mark_deleted`].
    pub fn delete_page(&mut self, position: usize) -> Result<()> {
        self.pages.mark_deleted(position)
    }

    /// Bring back the page at `position`.
    ///
    /// # Errors
    ///
    /// See [`PageList::unmark_deleted`].
    pub fn restore_page(&mut self, position: usize) -> Result<()> {
        self.pages.unmark_deleted(position)
    }

    /// Flip the deleted flag of the page at `position`.
    ///
    /// # Errors
    ///
    /// See [`PageList::toggle_deleted`].
    pub fn toggle_page(&mut self, position: usize) -> Result<bool> {
        self.pages.toggle_deleted(position)
    }

    /// Reorder the live pages; `order[k]` is the current position of the
    /// page that moves to position `k`.
    ///
    /// # Errors
    ///
    /// See [`PageList::reorder`].
    pub fn reorder_pages(&mut self, order: &[usize]) -> Result<()> {
        self.pages.reorder(order)
    }

    /// Pick up the page tile at `index` in the grid.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if there is no such tile.
    pub fn begin_page_drag(&mut self, index: usize) -> Result<()> {
        let tiles = self.page_tiles();
        self.page_drag.pick_up(&tiles, index)
    }

    /// Track the pointer over the page grid; returns the insertion slot.
    pub fn hover_page_drag(&self, pointer: Point) -> Option<usize> {
        let tiles = self.page_tiles();
        let container = self.grid_layout.container(tiles.len());
        self.page_drag.hover(&tiles, container, pointer)
    }

    /// Drop the picked-up page tile at `pointer`.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the session is ready; the order is unchanged.
    pub fn drop_page_drag(&mut self, pointer: Point) -> Result<DropOutcome> {
        let tiles = self.page_tiles();
        let container = self.grid_layout.container(tiles.len());
        self.page_drag
            .drop_onto(&tiles, container, pointer, &mut self.pages)
    }

    /// Opacity to draw a page tile with.
    pub fn page_opacity(&self, source_index: usize) -> f32 {
        self.page_drag.opacity(source_index)
    }

    /// Abandon any drag in progress.
    pub fn cancel_drag(&mut self) {
        self.file_drag.cancel();
        self.page_drag.cancel();
    }

    // ---- backend jobs ----

    /// Merge every listed file, in list order, into `destination`.
    ///
    /// On success the merged entries are removed from the list.
    ///
    /// # Errors
    ///
    /// `Busy` while another job runs; `NotEnoughFiles` with fewer than two
    /// files.
    pub fn merge_all(&mut self, destination: &Path) -> Result<()> {
        self.ensure_idle()?;
        if self.files.len() < 2 {
            let err = PdfToolError::NotEnoughFiles {
                needed: 2,
                found: self.files.len(),
            };
            return Err(self.refuse(err));
        }

        let inputs = self.files.paths();
        let files: Vec<FileId> = self.files.iter().map(|entry| entry.id).collect();
        let destination = destination.to_path_buf();
        self.notify(NoticeLevel::Info, format!("Merging {} files", inputs.len()));

        let backend = Arc::clone(&self.backend);
        self.start(JobKind::Merge, async move {
            let result = backend.merge(&inputs, &destination).await;
            JobOutcome::Merged { files, result }
        });
        Ok(())
    }

    /// Compress the selected file with the current preset.
    ///
    /// `destination` defaults to `<stem>_compressed.pdf` next to the source.
    ///
    /// # Errors
    ///
    /// `Busy` while another job runs; `InvalidState` with no selection.
    pub fn compress_selected(&mut self, destination: Option<&Path>) -> Result<()> {
        self.ensure_idle()?;
        let input = self.selected_path("compress")?;
        let destination = destination
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_compressed_path(&input));
        let preset = self.quality;
        self.notify(
            NoticeLevel::Info,
            format!("Compressing with the {preset} preset"),
        );

        let backend = Arc::clone(&self.backend);
        self.start(JobKind::Compress, async move {
            JobOutcome::Compressed(backend.compress(&input, preset, &destination).await)
        });
        Ok(())
    }

    /// Split the selected file into one document per page.
    ///
    /// `output_dir` defaults to the source's directory.
    ///
    /// # Errors
    ///
    /// `Busy` while another job runs; `InvalidState` with no selection.
    pub fn split_selected(&mut self, output_dir: Option<&Path>) -> Result<()> {
        self.ensure_idle()?;
        let input = self.selected_path("split")?;
        let output_dir = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None => input
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };

        let backend = Arc::clone(&self.backend);
        self.start(JobKind::Split, async move {
            JobOutcome::Split(backend.split(&input, &output_dir).await)
        });
        Ok(())
    }

    /// Write the edited page order of the open document.
    ///
    /// `destination` defaults to `<stem>_reordered.pdf` next to the source.
    /// The session is Committing until the result is applied.
    ///
    /// # Errors
    ///
    /// `Busy` while another job runs; `InvalidState` unless the session is
    /// ready; `NoPagesSelected` if every page is deleted.
    pub fn save_reordered(&mut self, destination: Option<&Path>) -> Result<()> {
        self.ensure_idle()?;
        let plan = self.pages.begin_commit().map_err(|err| self.refuse(err))?;
        let destination = destination
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_reordered_path(&plan.source));

        let backend = Arc::clone(&self.backend);
        self.start(JobKind::Save, async move {
            let result = backend
                .write_pages(&plan.source, &plan.page_order, &destination)
                .await;
            JobOutcome::Saved {
                session: plan.session,
                result,
            }
        });
        Ok(())
    }

    /// Ask to quit. Refused with a notice while a job runs.
    pub fn request_close(&mut self) -> bool {
        if self.is_busy() {
            self.notify(
                NoticeLevel::Warning,
                "Cannot close while a task is in progress.",
            );
            return false;
        }
        true
    }

    /// Availability of Ghostscript and the rasterizer.
    pub fn check_tools(&self) -> Vec<ToolStatus> {
        self.runtime.block_on(self.backend.check_tools())
    }

    /// Page count, version and size of a document.
    ///
    /// # Errors
    ///
    /// `UnreadableDocument` or `EncryptedDocument`.
    pub fn probe(&self, path: &Path) -> Result<DocumentInfo> {
        self.runtime.block_on(self.backend.probe(path))
    }

    // ---- completion ----

    /// Apply everything that has finished, without blocking.
    pub fn pump(&mut self) -> PumpReport {
        let mut report = PumpReport {
            jobs: self.finished.drain(..).collect(),
            ..PumpReport::default()
        };

        for outcome in self.jobs.drain() {
            if let Some(done) = self.finish_job(outcome) {
                report.jobs.push(done);
            }
        }

        let stale_before = self.thumbnails.stale_dropped();
        for delivery in self.thumbnails.drain() {
            if self.apply_thumbnail(delivery) {
                report.thumbnails_applied += 1;
            }
        }
        report.stale_dropped = self.thumbnails.stale_dropped() - stale_before;

        self.flush_preview_warnings();
        report
    }

    /// Block until a job finishes or `timeout` expires, applying previews
    /// as they arrive.
    ///
    /// Returns `None` at once when no job is running. Must not be called
    /// from inside the runtime.
    pub fn wait_for_job(&mut self, timeout: Duration) -> Option<CompletedJob> {
        let deadline = Instant::now() + timeout;
        let done = loop {
            if let Some(done) = self.finished.pop_front() {
                break Some(done);
            }
            if self.active_job.is_none() && self.pending_open.is_none() {
                break None;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break None;
            }
            match self.next_event(remaining) {
                Some(Event::Job(outcome)) => {
                    if let Some(done) = self.finish_job(outcome) {
                        break Some(done);
                    }
                }
                Some(Event::Thumbnail(delivery)) => {
                    self.apply_thumbnail(delivery);
                }
                None => break None,
            }
        };
        self.flush_preview_warnings();
        done
    }

    /// Block until the document being opened is ready for editing.
    ///
    /// The result of the open is handed back here instead of being queued
    /// for [`AppState::pump`] or [`AppState::wait_for_job`]. Other jobs that
    /// finish meanwhile stay queued.
    ///
    /// # Errors
    ///
    /// - The open's own failure, e.g. `UnreadableDocument`
    /// - `InvalidState` if no document is open, or it is still loading
    ///   when `timeout` expires
    pub fn wait_for_session_ready(&mut self, timeout: Duration) -> Result<DocumentInfo> {
        let deadline = Instant::now() + timeout;
        let outcome = loop {
            if self.pending_open.is_none() && self.pages.state() != SessionState::Loading {
                break self.open_document_info();
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break Err(PdfToolError::invalid_state(
                    "edit the document",
                    "it is still loading",
                ));
            }
            match self.next_event(remaining) {
                Some(Event::Job(outcome)) => match self.finish_job(outcome) {
                    Some(CompletedJob::Failed {
                        kind: JobKind::Open,
                        error,
                    }) => break Err(error),
                    Some(CompletedJob::Opened(_)) | None => {}
                    Some(done) => self.finished.push_back(done),
                },
                Some(Event::Thumbnail(delivery)) => {
                    self.apply_thumbnail(delivery);
                }
                None => {}
            }
        };
        self.flush_preview_warnings();
        outcome
    }

    /// Block until every requested preview has been applied or `timeout`
    /// expires. Returns how many were applied.
    pub fn wait_for_previews(&mut self, timeout: Duration) -> usize {
        let mut applied = 0;
        for delivery in self.thumbnails.wait_all(timeout) {
            if self.apply_thumbnail(delivery) {
                applied += 1;
            }
        }
        self.flush_preview_warnings();
        applied
    }

    /// Stop the runtime, giving running jobs a short grace period.
    pub fn shutdown(mut self) {
        let dropped = self.thumbnails.invalidate_all();
        self.files.clear();
        self.pages.close();
        info!(dropped_previews = dropped, "shutting down");
        self.runtime.shutdown_timeout(SHUTDOWN_GRACE);
    }

    // ---- internals ----

    fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notices.push_back(Notice::new(level, text));
    }

    /// Post `err` as a notice and hand it back.
    fn refuse(&mut self, err: PdfToolError) -> PdfToolError {
        let level = match err {
            PdfToolError::Busy => NoticeLevel::Warning,
            _ => NoticeLevel::Error,
        };
        self.notify(level, err.to_string());
        err
    }

    fn ensure_idle(&mut self) -> Result<()> {
        match self.active_job {
            Some(kind) => {
                debug!(%kind, "refusing job while busy");
                Err(self.refuse(PdfToolError::Busy))
            }
            None => Ok(()),
        }
    }

    fn selected_path(&mut self, operation: &'static str) -> Result<PathBuf> {
        match self.files.selected() {
            Some(entry) => Ok(entry.path.clone()),
            None => Err(self.refuse(PdfToolError::invalid_state(operation, "no file is selected"))),
        }
    }

    fn spawn<F>(&self, work: F)
    where
        F: Future<Output = JobOutcome> + Send + 'static,
    {
        let tx = self.jobs.sender();
        self.runtime.spawn(async move {
            // The receiver is gone only during shutdown.
            let _ = tx.send(work.await);
        });
    }

    fn start<F>(&mut self, kind: JobKind, work: F)
    where
        F: Future<Output = JobOutcome> + Send + 'static,
    {
        self.active_job = Some(kind);
        self.spawn(work);
        debug!(%kind, "job started");
    }

    fn close_session(&mut self) {
        if let Some(session) = self.pages.close() {
            let dropped = self.thumbnails.invalidate(ThumbnailOwner::Session(session));
            debug!(%session, dropped, "session closed");
        }
        self.pending_open = None;
        self.document = None;
        self.page_drag.cancel();
    }

    fn next_event(&mut self, timeout: Duration) -> Option<Event> {
        let Self {
            runtime,
            jobs,
            thumbnails,
            ..
        } = self;

        runtime.block_on(async {
            let next = async {
                tokio::select! {
                    Some(outcome) = jobs.recv() => Some(Event::Job(outcome)),
                    Some(delivery) = thumbnails.recv() => Some(Event::Thumbnail(delivery)),
                    else => None,
                }
            };
            tokio::time::timeout(timeout, next).await.ok().flatten()
        })
    }

    fn finish_job(&mut self, outcome: JobOutcome) -> Option<CompletedJob> {
        match outcome {
            JobOutcome::Opened {
                session,
                path,
                result,
            } => {
                if self.pending_open != Some(session) {
                    debug!(%session, "discarding superseded open");
                    return None;
                }
                self.pending_open = None;

                let opened = result.and_then(|info| {
                    self.pages.open(session, &path, info.page_count)?;
                    Ok(info)
                });
                match opened {
                    Ok(info) => {
                        self.request_page_previews(session, &path, info.page_count);
                        self.document = Some(info.clone());
                        Some(CompletedJob::Opened(info))
                    }
                    Err(err) => Some(self.job_failed(JobKind::Open, err)),
                }
            }
            JobOutcome::Merged { files, result } => {
                self.active_job = None;
                match result {
                    Ok(report) => {
                        for id in files {
                            if let Some(index) = self.files.position(id) {
                                let _ = self.remove_file(index);
                            }
                        }
                        self.notify(
                            NoticeLevel::Success,
                            format!(
                                "Merged {} files into {}",
                                report.files_merged,
                                report.output.display()
                            ),
                        );
                        info!(output = %report.output.display(), "merge applied");
                        Some(CompletedJob::Merged(report))
                    }
                    Err(err) => Some(self.job_failed(JobKind::Merge, err)),
                }
            }
            JobOutcome::Compressed(result) => {
                self.active_job = None;
                match result {
                    Ok(report) => {
                        self.notify(
                            NoticeLevel::Success,
                            format!("Saved {}: {}", report.output.display(), report.summary()),
                        );
                        Some(CompletedJob::Compressed(report))
                    }
                    Err(err) => Some(self.job_failed(JobKind::Compress, err)),
                }
            }
            JobOutcome::Split(result) => {
                self.active_job = None;
                match result {
                    Ok(report) => {
                        self.notify(
                            NoticeLevel::Success,
                            format!("Split into {} files", report.outputs.len()),
                        );
                        Some(CompletedJob::Split(report))
                    }
                    Err(err) => Some(self.job_failed(JobKind::Split, err)),
                }
            }
            JobOutcome::Saved { session, result } => {
                self.active_job = None;
                if self.pages.session_id() == Some(session)
                    && let Err(err) = self.pages.finish_commit(&result)
                {
                    warn!(%session, %err, "save finished outside a commit");
                }
                match result {
                    Ok(report) => {
                        self.notify(
                            NoticeLevel::Success,
                            format!(
                                "Saved {} pages to {}",
                                report.page_count,
                                report.output.display()
                            ),
                        );
                        Some(CompletedJob::Saved(report))
                    }
                    Err(err) => Some(self.job_failed(JobKind::Save, err)),
                }
            }
        }
    }

    fn open_document_info(&self) -> Result<DocumentInfo> {
        match (&self.document, self.pages.state()) {
            (Some(info), SessionState::Ready | SessionState::Committing) => Ok(info.clone()),
            _ => Err(PdfToolError::invalid_state(
                "edit a document",
                "no document is open",
            )),
        }
    }

    fn job_failed(&mut self, kind: JobKind, error: PdfToolError) -> CompletedJob {
        warn!(%kind, %error, "job failed");
        self.notify(NoticeLevel::Error, format!("{kind} failed: {error}"));
        CompletedJob::Failed { kind, error }
    }

    fn request_page_previews(&mut self, session: SessionId, path: &Path, page_count: usize) {
        if !self.settings.previews {
            self.pages.mark_ready();
            return;
        }
        for page_index in 0..page_count {
            self.thumbnails
                .request(ThumbnailTarget::page(session, page_index), path);
        }
    }

    fn apply_thumbnail(&mut self, delivery: ThumbnailDelivery) -> bool {
        if let Some(warning) = delivery.thumbnail.warning() {
            self.preview_warnings.push(warning.to_string());
        }

        let target = delivery.target;
        match target.owner {
            ThumbnailOwner::File(id) => self.files.set_thumbnail(id, delivery.thumbnail),
            ThumbnailOwner::Session(session) => {
                self.pages
                    .thumbnail_ready(session, target.page_index, delivery.thumbnail)
            }
        }
    }

    /// One notice for every placeholder produced since the last flush.
    fn flush_preview_warnings(&mut self) {
        if self.preview_warnings.is_empty() {
            return;
        }
        let count = self.preview_warnings.len();
        let first = self.preview_warnings.swap_remove(0);
        self.preview_warnings.clear();

        let text = if count == 1 {
            format!("Preview unavailable: {first}")
        } else {
            format!("{count} previews unavailable: {first}")
        };
        self.notify(NoticeLevel::Warning, text);
    }
}
