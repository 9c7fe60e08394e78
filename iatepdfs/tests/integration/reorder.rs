//! Integration tests for writing a page selection.

use iatepdfs::backend::PdfBackend;
use iatepdfs::error::PdfToolError;
use iatepdfs::model::{PageList, SessionId};
use tempfile::TempDir;

use crate::common::{page_widths, quiet_settings, write_numbered_pdf};

#[tokio::test]
async fn test_commit_drops_deleted_pages() {
    let dir = TempDir::new().unwrap();
    let input = write_numbered_pdf(dir.path(), "doc.pdf", 5);
    let output = dir.path().join("out.pdf");

    let mut pages = PageList::new();
    pages.open(SessionId::next(), &input, 5).unwrap();
    pages.mark_ready();
    // Pages 2 and 4, 1-based.
    pages.mark_deleted(1).unwrap();
    pages.mark_deleted(3).unwrap();
    let plan = pages.begin_commit().unwrap();

    let backend = PdfBackend::new(&quiet_settings());
    let result = backend
        .write_pages(&plan.source, &plan.page_order, &output)
        .await;
    pages.finish_commit(&result).unwrap();

    assert_eq!(result.unwrap().page_count, 3);
    assert_eq!(page_widths(&output), vec![100, 102, 104]);
}

#[tokio::test]
async fn test_commit_follows_new_order() {
    let dir = TempDir::new().unwrap();
    let input = write_numbered_pdf(dir.path(), "doc.pdf", 4);
    let output = dir.path().join("out.pdf");

    let mut pages = PageList::new();
    pages.open(SessionId::next(), &input, 4).unwrap();
    pages.mark_ready();
    pages.reorder(&[3, 1, 0, 2]).unwrap();
    pages.mark_deleted(1).unwrap();
    let plan = pages.begin_commit().unwrap();

    let backend = PdfBackend::new(&quiet_settings());
    backend
        .write_pages(&plan.source, &plan.page_order, &output)
        .await
        .unwrap();

    assert_eq!(page_widths(&output), vec![103, 100, 102]);
}

#[tokio::test]
async fn test_write_pages_rejects_bad_orders() {
    let dir = TempDir::new().unwrap();
    let input = write_numbered_pdf(dir.path(), "doc.pdf", 3);
    let output = dir.path().join("out.pdf");
    let backend = PdfBackend::new(&quiet_settings());

    assert!(matches!(
        backend.write_pages(&input, &[], &output).await,
        Err(PdfToolError::NoPagesSelected)
    ));
    assert!(matches!(
        backend.write_pages(&input, &[0, 3], &output).await,
        Err(PdfToolError::OutOfRange { .. })
    ));
    assert!(matches!(
        backend.write_pages(&input, &[1, 1], &output).await,
        Err(PdfToolError::InvalidPermutation { .. })
    ));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_write_pages_source_gone() {
    let dir = TempDir::new().unwrap();
    let input = write_numbered_pdf(dir.path(), "doc.pdf", 2);
    std::fs::remove_file(&input).unwrap();

    let backend = PdfBackend::new(&quiet_settings());
    let err = backend
        .write_pages(&input, &[0], &dir.path().join("out.pdf"))
        .await
        .unwrap_err();

    assert!(matches!(err, PdfToolError::UnreadableDocument { .. }));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_write_pages_replaces_existing_output() {
    let dir = TempDir::new().unwrap();
    let input = write_numbered_pdf(dir.path(), "doc.pdf", 3);
    let output = dir.path().join("out.pdf");
    std::fs::write(&output, b"old contents").unwrap();

    let backend = PdfBackend::new(&quiet_settings());
    backend.write_pages(&input, &[2], &output).await.unwrap();

    assert_eq!(page_widths(&output), vec![102]);
}

#[cfg(target_pointer_width = "64")]
#[tokio::test]
async fn test_write_pages_rejects_index_past_u32() {
    let dir = TempDir::new().unwrap();
    let input = write_numbered_pdf(dir.path(), "doc.pdf", 2);
    let output = dir.path().join("out.pdf");
    let backend = PdfBackend::new(&quiet_settings());

    for index in [1usize << 32, u32::MAX as usize] {
        let err = backend
            .write_pages(&input, &[index], &output)
            .await
            .unwrap_err();
        assert!(matches!(err, PdfToolError::OutOfRange { index: i, len: 2 } if i == index));
    }
    assert!(!output.exists());
}
