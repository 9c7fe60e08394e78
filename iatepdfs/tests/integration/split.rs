//! Integration tests for splitting a document into single pages.

use iatepdfs::backend::PdfBackend;
use iatepdfs::error::PdfToolError;
use tempfile::TempDir;

use crate::common::{page_widths, quiet_settings, write_numbered_pdf};

#[tokio::test]
async fn test_split_names_and_contents() {
    let dir = TempDir::new().unwrap();
    let input = write_numbered_pdf(dir.path(), "doc.pdf", 3);
    let out_dir = dir.path().join("pages");

    let backend = PdfBackend::new(&quiet_settings());
    let report = backend.split(&input, &out_dir).await.unwrap();

    let names: Vec<String> = report
        .outputs
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["doc_page_1.pdf", "doc_page_2.pdf", "doc_page_3.pdf"]);

    for (index, output) in report.outputs.iter().enumerate() {
        assert_eq!(page_widths(output), vec![100 + index as i64]);
    }
}

#[tokio::test]
async fn test_split_does_not_pad_numbers() {
    let dir = TempDir::new().unwrap();
    let input = write_numbered_pdf(dir.path(), "long.pdf", 11);

    let backend = PdfBackend::new(&quiet_settings());
    let report = backend.split(&input, dir.path()).await.unwrap();

    assert_eq!(report.outputs.len(), 11);
    assert!(dir.path().join("long_page_1.pdf").exists());
    assert!(dir.path().join("long_page_11.pdf").exists());
    assert!(!dir.path().join("long_page_01.pdf").exists());
}

#[tokio::test]
async fn test_split_single_page_document() {
    let dir = TempDir::new().unwrap();
    let input = write_numbered_pdf(dir.path(), "one.pdf", 1);

    let backend = PdfBackend::new(&quiet_settings());
    let report = backend.split(&input, dir.path()).await.unwrap();

    assert_eq!(report.outputs, vec![dir.path().join("one_page_1.pdf")]);
}

#[tokio::test]
async fn test_split_unreadable_source_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("absent.pdf");
    let out_dir = dir.path().join("pages");

    let backend = PdfBackend::new(&quiet_settings());
    let err = backend.split(&input, &out_dir).await.unwrap_err();

    assert!(matches!(err, PdfToolError::UnreadableDocument { .. }));
    assert!(!out_dir.exists());
}
