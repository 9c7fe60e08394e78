//! Integration tests for merging whole documents.

use iatepdfs::backend::PdfBackend;
use iatepdfs::error::PdfToolError;
use tempfile::TempDir;

use crate::common::{page_widths, quiet_settings, write_numbered_pdf, write_pdf};

#[tokio::test]
async fn test_merge_two_documents_in_order() {
    let dir = TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a.pdf", [100, 101]);
    let b = write_pdf(dir.path(), "b.pdf", [200, 201, 202]);
    let output = dir.path().join("merged.pdf");

    let backend = PdfBackend::new(&quiet_settings());
    let report = backend.merge(&[a, b], &output).await.unwrap();

    assert_eq!(report.files_merged, 2);
    assert_eq!(report.total_pages, 5);
    assert_eq!(report.output, output);
    assert!(report.file_size > 0);
    assert_eq!(page_widths(&output), vec![100, 101, 200, 201, 202]);
}

#[tokio::test]
async fn test_merge_follows_given_order() {
    let dir = TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a.pdf", [100]);
    let b = write_pdf(dir.path(), "b.pdf", [200]);
    let c = write_pdf(dir.path(), "c.pdf", [300, 301]);
    let output = dir.path().join("merged.pdf");

    let backend = PdfBackend::new(&quiet_settings());
    backend.merge(&[c, a, b], &output).await.unwrap();

    assert_eq!(page_widths(&output), vec![300, 301, 100, 200]);
}

#[tokio::test]
async fn test_merge_same_file_twice() {
    let dir = TempDir::new().unwrap();
    let a = write_numbered_pdf(dir.path(), "a.pdf", 2);
    let output = dir.path().join("twice.pdf");

    let backend = PdfBackend::new(&quiet_settings());
    let report = backend.merge(&[a.clone(), a], &output).await.unwrap();

    assert_eq!(report.total_pages, 4);
    assert_eq!(page_widths(&output), vec![100, 101, 100, 101]);
}

#[tokio::test]
async fn test_merge_names_unreadable_input() {
    let dir = TempDir::new().unwrap();
    let good = write_numbered_pdf(dir.path(), "good.pdf", 1);
    let broken = dir.path().join("broken.pdf");
    std::fs::write(&broken, b"%PDF-1.4\nthis is not a document").unwrap();
    let output = dir.path().join("merged.pdf");

    let backend = PdfBackend::new(&quiet_settings());
    let err = backend.merge(&[good, broken.clone()], &output).await.unwrap_err();

    match err {
        PdfToolError::UnreadableDocument { path, .. } => assert_eq!(path, broken),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists());
}

#[tokio::test]
async fn test_merge_nothing() {
    let dir = TempDir::new().unwrap();
    let backend = PdfBackend::new(&quiet_settings());

    let err = backend
        .merge(&[], &dir.path().join("merged.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, PdfToolError::NotEnoughFiles { found: 0, .. }));
}

#[tokio::test]
async fn test_merge_into_missing_directory() {
    let dir = TempDir::new().unwrap();
    let a = write_numbered_pdf(dir.path(), "a.pdf", 1);
    let b = write_numbered_pdf(dir.path(), "b.pdf", 1);
    let output = dir.path().join("nowhere").join("merged.pdf");

    let backend = PdfBackend::new(&quiet_settings());
    let err = backend.merge(&[a, b], &output).await.unwrap_err();

    assert!(matches!(err, PdfToolError::WriteError { .. }));
    assert_eq!(err.exit_code(), 5);
}
