//! Background page previews.
//!
//! The [`ThumbnailGenerator`] renders previews on the tokio runtime and hands
//! them back to the thread that owns the models through a completion queue.
//! Each request is tied to an owner: a file row or a page session.
//! Invalidating an owner forgets its in-flight requests; results that arrive
//! for them later are dropped instead of being delivered.
//!
//! Rendering failures never abort anything. A missing rasterizer, a corrupt
//! page or a timeout produces a placeholder image carrying the warning.
//!
//! # Examples
//!
//! ```no_run
//! use iatepdfs::config::ThumbnailSettings;
//! use iatepdfs::model::SessionId;
//! use iatepdfs::thumbnail::{PopplerRasterizer, ThumbnailGenerator, ThumbnailOwner, ThumbnailTarget};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let mut generator = ThumbnailGenerator::new(
//!     PopplerRasterizer::new("pdftoppm"),
//!     runtime.handle().clone(),
//!     ThumbnailSettings::default(),
//!     Duration::from_secs(20),
//!     4,
//! );
//!
//! let session = SessionId::next();
//! generator.request(
//!     ThumbnailTarget::page(session, 0),
//!     Path::new("document.pdf"),
//! );
//! for delivery in generator.wait_all(Duration::from_secs(30)) {
//!     println!("{}x{}", delivery.thumbnail.width, delivery.thumbnail.height);
//! }
//! ```

use image::{DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::collections::HashMap;
use std::ffi::OsString;
use std::future::Future;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::ThumbnailSettings;
use crate::error::{PdfToolError, Result};
use crate::model::{FileId, SessionId};
use crate::tasks::CompletionQueue;
use crate::tools::ExternalTool;

/// Height-to-width ratio of placeholders (US Letter).
const PLACEHOLDER_ASPECT: f64 = 11.0 / 8.5;

/// How a preview came to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailKind {
    /// Rendered from the page.
    Rendered,
    /// Stand-in image; rendering failed.
    Placeholder {
        /// Why rendering failed.
        warning: String,
    },
}

/// A small PNG preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    /// Encoded PNG.
    pub png: Vec<u8>,
    /// Width in pixels, from the PNG header.
    pub width: u32,
    /// Height in pixels, from the PNG header.
    pub height: u32,
    /// Rendered or placeholder.
    pub kind: ThumbnailKind,
}

impl Thumbnail {
    /// Wrap rendered PNG bytes, reading the dimensions from the header.
    ///
    /// # Errors
    ///
    /// Fails if the bytes are not a PNG.
    pub fn from_png(png: Vec<u8>) -> Result<Self> {
        let (width, height) = ImageReader::with_format(Cursor::new(&png), ImageFormat::Png)
            .into_dimensions()
            .map_err(|e| PdfToolError::other(format!("Invalid preview image: {e}")))?;

        Ok(Self {
            png,
            width,
            height,
            kind: ThumbnailKind::Rendered,
        })
    }

    /// A plain page-shaped image standing in for a failed preview.
    pub fn placeholder(width: u32, warning: impl Into<String>) -> Self {
        let width = width.max(1);
        let height = ((width as f64 * PLACEHOLDER_ASPECT).round() as u32).max(1);

        let paper = Rgba([236, 236, 236, 255]);
        let edge = Rgba([160, 160, 160, 255]);
        let mut image = RgbaImage::from_pixel(width, height, paper);
        for x in 0..width {
            image.put_pixel(x, 0, edge);
            image.put_pixel(x, height - 1, edge);
        }
        for y in 0..height {
            image.put_pixel(0, y, edge);
            image.put_pixel(width - 1, y, edge);
        }

        let mut png = Vec::new();
        if let Err(err) =
            DynamicImage::ImageRgba8(image).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        {
            warn!(%err, "failed to encode placeholder preview");
            png.clear();
        }

        Self {
            png,
            width,
            height,
            kind: ThumbnailKind::Placeholder {
                warning: warning.into(),
            },
        }
    }

    /// Whether this is a stand-in image.
    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, ThumbnailKind::Placeholder { .. })
    }

    /// The rendering failure, for placeholders.
    pub fn warning(&self) -> Option<&str> {
        match &self.kind {
            ThumbnailKind::Placeholder { warning } => Some(warning),
            ThumbnailKind::Rendered => None,
        }
    }
}

/// What a preview belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThumbnailOwner {
    /// A row of the file list.
    File(FileId),
    /// A page of an open session.
    Session(SessionId),
}

/// One requested preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThumbnailTarget {
    /// Owner of the preview.
    pub owner: ThumbnailOwner,
    /// 0-based page index in the document.
    pub page_index: usize,
}

impl ThumbnailTarget {
    /// First-page preview for a file row.
    pub fn file(id: FileId) -> Self {
        Self {
            owner: ThumbnailOwner::File(id),
            page_index: 0,
        }
    }

    /// Preview of one page of a session.
    pub fn page(session: SessionId, page_index: usize) -> Self {
        Self {
            owner: ThumbnailOwner::Session(session),
            page_index,
        }
    }
}

/// Identity of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThumbnailHandle(u64);

/// Parameters of one rasterization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    /// Document to render from.
    pub document: PathBuf,
    /// 0-based page index.
    pub page_index: usize,
    /// Rendering resolution.
    pub dpi: u32,
    /// Output width in pixels; height keeps the aspect ratio.
    pub width: u32,
    /// Time budget.
    pub timeout: Duration,
}

/// Turns a page into PNG bytes.
pub trait Rasterizer: Send + Sync + 'static {
    /// Render the requested page.
    fn render(&self, request: &RenderRequest) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Rasterizer backed by Poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PopplerRasterizer {
    tool: ExternalTool,
}

impl PopplerRasterizer {
    /// Use the given `pdftoppm` binary.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            tool: ExternalTool::pdftoppm(program),
        }
    }

    /// Command-line arguments for one page, writing `<output_stem>.png`.
    pub fn arguments(request: &RenderRequest, output_stem: &Path) -> Vec<OsString> {
        let page = (request.page_index + 1).to_string();
        vec![
            "-png".into(),
            "-f".into(),
            page.clone().into(),
            "-l".into(),
            page.into(),
            "-r".into(),
            request.dpi.to_string().into(),
            "-scale-to-x".into(),
            request.width.to_string().into(),
            "-scale-to-y".into(),
            "-1".into(),
            "-singlefile".into(),
            request.document.clone().into(),
            output_stem.into(),
        ]
    }
}

impl Rasterizer for PopplerRasterizer {
    async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>> {
        let scratch = tempfile::tempdir()?;
        let stem = scratch.path().join("preview");

        self.tool
            .run(Self::arguments(request, &stem), request.timeout)
            .await?;

        tokio::fs::read(stem.with_extension("png"))
            .await
            .map_err(|e| PdfToolError::other(format!("pdftoppm produced no image: {e}")))
    }
}

/// A preview ready to be shown.
#[derive(Debug, Clone)]
pub struct ThumbnailDelivery {
    /// Request this answers.
    pub handle: ThumbnailHandle,
    /// What the preview belongs to.
    pub target: ThumbnailTarget,
    /// The image.
    pub thumbnail: Thumbnail,
}

#[derive(Debug)]
struct Completion {
    handle: ThumbnailHandle,
    result: Result<Vec<u8>>,
}

#[derive(Debug)]
struct InFlight {
    target: ThumbnailTarget,
    cancelled: Arc<AtomicBool>,
}

/// Renders previews in the background.
pub struct ThumbnailGenerator<R = PopplerRasterizer> {
    rasterizer: Arc<R>,
    runtime: Handle,
    settings: ThumbnailSettings,
    timeout: Duration,
    limiter: Arc<Semaphore>,
    queue: CompletionQueue<Completion>,
    in_flight: HashMap<ThumbnailHandle, InFlight>,
    next_handle: u64,
    stale_dropped: u64,
}

impl<R: Rasterizer> ThumbnailGenerator<R> {
    /// Create a generator rendering at most `workers` previews at once.
    pub fn new(
        rasterizer: R,
        runtime: Handle,
        settings: ThumbnailSettings,
        timeout: Duration,
        workers: usize,
    ) -> Self {
        Self {
            rasterizer: Arc::new(rasterizer),
            runtime,
            settings,
            timeout,
            limiter: Arc::new(Semaphore::new(workers.max(1))),
            queue: CompletionQueue::new(),
            in_flight: HashMap::new(),
            next_handle: 0,
            stale_dropped: 0,
        }
    }

    /// Start rendering `target` from `document`.
    ///
    /// File rows render at the file resolution, page tiles at the page
    /// resolution; both are scaled to the configured width.
    pub fn request(&mut self, target: ThumbnailTarget, document: &Path) -> ThumbnailHandle {
        let handle = ThumbnailHandle(self.next_handle);
        self.next_handle += 1;

        let dpi = match target.owner {
            ThumbnailOwner::File(_) => self.settings.file_dpi,
            ThumbnailOwner::Session(_) => self.settings.page_dpi,
        };
        let request = RenderRequest {
            document: document.to_path_buf(),
            page_index: target.page_index,
            dpi,
            width: self.settings.width,
            timeout: self.timeout,
        };

        let cancelled = Arc::new(AtomicBool::new(false));
        self.in_flight.insert(
            handle,
            InFlight {
                target,
                cancelled: Arc::clone(&cancelled),
            },
        );

        let rasterizer = Arc::clone(&self.rasterizer);
        let limiter = Arc::clone(&self.limiter);
        let tx = self.queue.sender();

        self.runtime.spawn(async move {
            let Ok(_permit) = limiter.acquire().await else {
                return;
            };
            if cancelled.load(Ordering::Acquire) {
                return;
            }

            let result = rasterizer.render(&request).await;
            // The receiver is gone only during shutdown.
            let _ = tx.send(Completion { handle, result });
        });

        debug!(?target, ?handle, "preview requested");
        handle
    }

    /// Forget every in-flight request of `owner`. Returns how many there were.
    pub fn invalidate(&mut self, owner: ThumbnailOwner) -> usize {
        let before = self.in_flight.len();
        self.in_flight.retain(|_, flight| {
            if flight.target.owner == owner {
                flight.cancelled.store(true, Ordering::Release);
                false
            } else {
                true
            }
        });
        before - self.in_flight.len()
    }

    /// Forget every in-flight request.
    pub fn invalidate_all(&mut self) -> usize {
        let count = self.in_flight.len();
        for flight in self.in_flight.values() {
            flight.cancelled.store(true, Ordering::Release);
        }
        self.in_flight.clear();
        count
    }

    /// Take every finished preview without blocking.
    pub fn drain(&mut self) -> Vec<ThumbnailDelivery> {
        let completions = self.queue.drain();
        completions
            .into_iter()
            .filter_map(|completion| self.accept(completion))
            .collect()
    }

    /// Wait for the next deliverable preview.
    ///
    /// Returns `None` at once when nothing is in flight. Cancel-safe.
    pub async fn recv(&mut self) -> Option<ThumbnailDelivery> {
        loop {
            if self.in_flight.is_empty() {
                return None;
            }
            let completion = self.queue.recv().await?;
            if let Some(delivery) = self.accept(completion) {
                return Some(delivery);
            }
        }
    }

    /// Block until the next preview arrives or `timeout` expires.
    ///
    /// Must not be called from inside the runtime.
    pub fn wait_next(&mut self, timeout: Duration) -> Option<ThumbnailDelivery> {
        let runtime = self.runtime.clone();
        runtime.block_on(async { tokio::time::timeout(timeout, self.recv()).await.ok().flatten() })
    }

    /// Block until nothing is in flight or `timeout` expires.
    pub fn wait_all(&mut self, timeout: Duration) -> Vec<ThumbnailDelivery> {
        let deadline = Instant::now() + timeout;
        let mut deliveries = Vec::new();

        while self.pending() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.wait_next(remaining) {
                Some(delivery) => deliveries.push(delivery),
                None => break,
            }
        }

        deliveries
    }

    /// Requests still in flight.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Requests of `owner` still in flight.
    pub fn pending_for(&self, owner: ThumbnailOwner) -> usize {
        self.in_flight
            .values()
            .filter(|flight| flight.target.owner == owner)
            .count()
    }

    /// Results dropped because their request had been invalidated.
    pub fn stale_dropped(&self) -> u64 {
        self.stale_dropped
    }

    fn accept(&mut self, completion: Completion) -> Option<ThumbnailDelivery> {
        let Some(flight) = self.in_flight.remove(&completion.handle) else {
            self.stale_dropped += 1;
            debug!(handle = ?completion.handle, "dropped stale preview");
            return None;
        };

        let thumbnail = match completion.result.and_then(Thumbnail::from_png) {
            Ok(thumbnail) => thumbnail,
            Err(err) => {
                warn!(target = ?flight.target, %err, "preview failed, using placeholder");
                Thumbnail::placeholder(self.settings.width, err.to_string())
            }
        };

        Some(ThumbnailDelivery {
            handle: completion.handle,
            target: flight.target,
            thumbnail,
        })
    }
}
