//! End-to-end tests driving [`AppState`] the way a front-end would.

use iatepdfs::app::{AppState, CompletedJob, NoticeLevel};
use iatepdfs::config::Settings;
use iatepdfs::drag::{DropOutcome, Point};
use iatepdfs::model::SessionState;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use crate::common::{
    FakeRasterizer, page_widths, quiet_settings, write_numbered_pdf, write_pdf,
};

const WAIT: Duration = Duration::from_secs(10);

fn preview_settings() -> Settings {
    Settings {
        previews: true,
        ..quiet_settings()
    }
}

#[test]
fn test_drag_files_then_merge() {
    let dir = TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a.pdf", [100, 101]);
    let b = write_pdf(dir.path(), "b.pdf", [200]);
    let c = write_pdf(dir.path(), "c.pdf", [300]);
    let output = dir.path().join("merged.pdf");

    let mut app = AppState::new(quiet_settings()).unwrap();
    app.add_files(&[a, b, c]);

    // Carry the first row below the last one.
    app.begin_file_drag(0).unwrap();
    let first = app.file_rows()[0].id;
    assert_eq!(app.file_opacity(first), 0.5);
    let below = Point::new(10.0, 300.0);
    assert_eq!(app.hover_file_drag(below), Some(3));
    assert_eq!(
        app.drop_file_drag(below).unwrap(),
        DropOutcome::Reordered(vec![1, 2, 0])
    );
    assert_eq!(app.file_opacity(first), 1.0);

    let names: Vec<&str> = app.files().iter().map(|f| f.display_name.as_str()).collect();
    assert_eq!(names, vec!["b.pdf", "c.pdf", "a.pdf"]);

    app.merge_all(&output).unwrap();
    assert!(app.is_busy());
    match app.wait_for_job(WAIT) {
        Some(CompletedJob::Merged(report)) => assert_eq!(report.files_merged, 3),
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert_eq!(page_widths(&output), vec![200, 300, 100, 101]);
    assert!(app.files().is_empty());
    let notices = app.take_notices();
    assert!(
        notices
            .iter()
            .any(|n| n.level == NoticeLevel::Success && n.text.starts_with("Merged 3 files"))
    );
    app.shutdown();
}

#[test]
fn test_drag_page_tile_then_save() {
    let dir = TempDir::new().unwrap();
    let source = write_numbered_pdf(dir.path(), "doc.pdf", 5);
    let output = dir.path().join("reordered.pdf");

    let mut app = AppState::new(quiet_settings()).unwrap();
    app.open_document(&source).unwrap();
    app.wait_for_session_ready(WAIT).unwrap();

    // Last tile to the front of the grid.
    let tiles = app.page_tiles();
    assert_eq!(tiles.len(), 5);
    let front = Point::new(tiles[0].bounds.x + 5.0, tiles[0].bounds.center().y);
    app.begin_page_drag(4).unwrap();
    assert_eq!(app.page_opacity(4), 0.5);
    assert_eq!(
        app.drop_page_drag(front).unwrap(),
        DropOutcome::Reordered(vec![4, 0, 1, 2, 3])
    );

    let labels: Vec<String> = app.page_tiles().into_iter().map(|t| t.label).collect();
    assert_eq!(labels, vec!["Page 5", "Page 1", "Page 2", "Page 3", "Page 4"]);

    app.save_reordered(Some(&output)).unwrap();
    assert!(matches!(app.wait_for_job(WAIT), Some(CompletedJob::Saved(_))));
    assert_eq!(page_widths(&output), vec![104, 100, 101, 102, 103]);
    app.shutdown();
}

#[test]
fn test_deleted_pages_left_out_of_save() {
    let dir = TempDir::new().unwrap();
    let source = write_numbered_pdf(dir.path(), "doc.pdf", 5);

    let mut app = AppState::new(quiet_settings()).unwrap();
    app.open_document(&source).unwrap();
    app.wait_for_session_ready(WAIT).unwrap();

    app.delete_page(1).unwrap();
    app.delete_page(3).unwrap();
    assert_eq!(app.page_tiles().len(), 3);

    app.save_reordered(None).unwrap();
    match app.wait_for_job(WAIT) {
        Some(CompletedJob::Saved(report)) => {
            assert_eq!(report.page_count, 3);
            assert_eq!(page_widths(&report.output), vec![100, 102, 104]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(app.pages().state(), SessionState::Ready);
    app.shutdown();
}

#[test]
fn test_file_previews_arrive() {
    let dir = TempDir::new().unwrap();
    let a = write_numbered_pdf(dir.path(), "a.pdf", 1);
    let b = write_numbered_pdf(dir.path(), "b.pdf", 2);

    let mut app = AppState::with_rasterizer(preview_settings(), FakeRasterizer::open()).unwrap();
    app.add_files(&[a, b]);
    assert!(app.file_rows().iter().all(|row| row.preview_pending));

    assert_eq!(app.wait_for_previews(WAIT), 2);
    for entry in app.files().iter() {
        let thumbnail = entry.thumbnail.as_ref().unwrap();
        assert!(!thumbnail.is_placeholder());
        assert_eq!(thumbnail.width, 1);
    }
    assert!(app.file_rows().iter().all(|row| !row.preview_pending));
    app.shutdown();
}

#[test]
fn test_failed_previews_collapse_into_one_notice() {
    let dir = TempDir::new().unwrap();
    let source = write_numbered_pdf(dir.path(), "doc.pdf", 3);

    let mut app =
        AppState::with_rasterizer(preview_settings(), FakeRasterizer::failing()).unwrap();
    app.open_document(&source).unwrap();
    app.wait_for_session_ready(WAIT).unwrap();

    assert!(
        app.pages()
            .ordered()
            .iter()
            .all(|page| page.thumbnail.as_ref().is_some_and(|t| t.is_placeholder()))
    );

    let warnings: Vec<_> = app
        .take_notices()
        .into_iter()
        .filter(|n| n.level == NoticeLevel::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].text.starts_with("3 previews unavailable"));
    app.shutdown();
}

#[test]
fn test_reopen_drops_previews_of_old_session() {
    let dir = TempDir::new().unwrap();
    let source = write_numbered_pdf(dir.path(), "doc.pdf", 3);
    let rasterizer = FakeRasterizer::gated();

    let mut app = AppState::with_rasterizer(preview_settings(), rasterizer.clone()).unwrap();
    app.open_document(&source).unwrap();

    // Let the open land so the first session's renders start; two workers.
    let deadline = Instant::now() + WAIT;
    while rasterizer.started.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
        app.pump();
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(rasterizer.started.load(Ordering::SeqCst), 2);
    assert_eq!(app.pages().state(), SessionState::Loading);

    rasterizer.generation.store(2, Ordering::SeqCst);
    let second = app.open_document(&source).unwrap();
    rasterizer.gate.add_permits(100);

    app.wait_for_session_ready(WAIT).unwrap();
    assert_eq!(app.pages().session_id(), Some(second));

    let pages = app.pages().ordered();
    assert_eq!(pages.len(), 3);
    for page in pages {
        let thumbnail = page.thumbnail.as_ref().unwrap();
        assert_eq!(thumbnail.width, 2, "page {} kept an old preview", page.page_number());
    }
    app.shutdown();
}

#[test]
fn test_clear_drops_late_file_previews() {
    let dir = TempDir::new().unwrap();
    let a = write_numbered_pdf(dir.path(), "a.pdf", 1);
    let b = write_numbered_pdf(dir.path(), "b.pdf", 1);
    let c = write_numbered_pdf(dir.path(), "c.pdf", 1);
    let rasterizer = FakeRasterizer::gated();

    let mut app = AppState::with_rasterizer(preview_settings(), rasterizer.clone()).unwrap();
    app.add_files(&[a, b]);
    let deadline = Instant::now() + WAIT;
    while rasterizer.started.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(rasterizer.started.load(Ordering::SeqCst), 2);

    app.clear_files().unwrap();
    assert!(app.files().is_empty());

    // The cleared renders finish after the clear and must not land anywhere.
    rasterizer.generation.store(2, Ordering::SeqCst);
    rasterizer.gate.add_permits(100);
    assert_eq!(app.wait_for_previews(Duration::from_millis(200)), 0);

    app.add_files(&[c]);
    assert_eq!(app.wait_for_previews(WAIT), 1);
    assert_eq!(app.pump().thumbnails_applied, 0);

    assert_eq!(app.files().len(), 1);
    let entry = app.files().get(0).unwrap();
    assert_eq!(entry.display_name, "c.pdf");
    assert_eq!(entry.thumbnail.as_ref().unwrap().width, 2);
    app.shutdown();
}
