//! Shared helpers for the integration tests.
//!
//! Documents are generated with lopdf. Every page gets its own MediaBox
//! width, so a test can tell which source page ended up where by reading
//! the widths back.

#![allow(dead_code)]

use iatepdfs::Result;
use iatepdfs::config::Settings;
use iatepdfs::thumbnail::{Rasterizer, RenderRequest, Thumbnail};
use lopdf::{
    Document, EncryptionState, EncryptionVersion, Object, Permissions, Stream, dictionary,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Write a PDF whose pages have the given MediaBox widths.
pub fn write_pdf(dir: &Path, name: &str, widths: impl IntoIterator<Item = i64>) -> PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for width in widths {
        let content = format!("BT /F1 12 Tf 20 700 Td (Page width {width}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), 792.into()],
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let path = dir.join(name);
    doc.save(&path).expect("failed to write test PDF");
    path
}

/// Write a PDF of `pages` pages with widths 100, 101, ...
pub fn write_numbered_pdf(dir: &Path, name: &str, pages: usize) -> PathBuf {
    write_pdf(dir, name, (0..pages as i64).map(|i| 100 + i))
}

/// Write a password-protected copy of a numbered PDF.
pub fn write_encrypted_pdf(dir: &Path, name: &str, user_password: &str) -> PathBuf {
    let plain = write_numbered_pdf(dir, &format!("plain_{name}"), 2);
    let mut doc = Document::load(&plain).expect("failed to reload test PDF");
    // Encryption keys are derived from the trailer's file identifier.
    let file_id = lopdf::Object::string_literal(b"iatepdfs-test-id".to_vec());
    doc.trailer
        .set("ID", lopdf::Object::Array(vec![file_id.clone(), file_id]));

    let state = EncryptionState::try_from(EncryptionVersion::V2 {
        document: &doc,
        owner_password: "owner",
        user_password,
        key_length: 128,
        permissions: Permissions::all(),
    })
    .expect("failed to set up encryption");
    doc.encrypt(&state).expect("failed to encrypt test PDF");

    let path = dir.join(name);
    doc.save(&path).expect("failed to write encrypted PDF");
    path
}

/// MediaBox widths of a PDF on disk, in page order.
pub fn page_widths(path: &Path) -> Vec<i64> {
    let doc = Document::load(path).expect("failed to load output PDF");
    doc.get_pages()
        .values()
        .map(|&id| {
            let page = doc.get_dictionary(id).expect("page dictionary");
            let media_box = page
                .get(b"MediaBox")
                .and_then(Object::as_array)
                .expect("page MediaBox");
            media_box[2].as_i64().expect("integer width")
        })
        .collect()
}

/// Settings for tests: two workers, previews off.
pub fn quiet_settings() -> Settings {
    Settings {
        jobs: Some(2),
        previews: false,
        ..Settings::default()
    }
}

/// Poll `condition` for up to five seconds.
pub fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(condition(), "condition not reached in time");
}

/// Rasterizer stand-in.
///
/// Renders wait on `gate`. The width of each image is `generation` as read
/// when the render started, so a test can tell old renders from new ones.
#[derive(Clone)]
pub struct FakeRasterizer {
    pub gate: Arc<Semaphore>,
    pub started: Arc<AtomicUsize>,
    pub generation: Arc<AtomicU32>,
    pub fail: bool,
}

impl FakeRasterizer {
    /// Renders immediately.
    pub fn open() -> Self {
        Self::with_permits(10_000, false)
    }

    /// Renders block until the test adds permits to `gate`.
    pub fn gated() -> Self {
        Self::with_permits(0, false)
    }

    /// Every render fails like a missing binary.
    pub fn failing() -> Self {
        Self::with_permits(10_000, true)
    }

    fn with_permits(permits: usize, fail: bool) -> Self {
        Self {
            gate: Arc::new(Semaphore::new(permits)),
            started: Arc::new(AtomicUsize::new(0)),
            generation: Arc::new(AtomicU32::new(1)),
            fail,
        }
    }
}

impl Rasterizer for FakeRasterizer {
    async fn render(&self, _request: &RenderRequest) -> Result<Vec<u8>> {
        let generation = self.generation.load(Ordering::SeqCst);
        self.started.fetch_add(1, Ordering::SeqCst);

        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }

        if self.fail {
            return Err(iatepdfs::PdfToolError::missing_tool(
                "pdftoppm",
                "pdftoppm",
            ));
        }
        Ok(Thumbnail::placeholder(generation, "").png)
    }
}
