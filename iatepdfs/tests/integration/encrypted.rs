//! Integration tests for password-protected input.

use iatepdfs::app::{AppState, CompletedJob, JobKind};
use iatepdfs::error::PdfToolError;
use iatepdfs::io::PdfReader;
use rstest::rstest;
use std::time::Duration;
use tempfile::TempDir;

use crate::common::{quiet_settings, write_encrypted_pdf};

#[rstest]
#[case("")]
#[case("secret")]
#[tokio::test]
async fn test_reader_rejects_encrypted(#[case] password: &str) {
    let dir = TempDir::new().unwrap();
    let path = write_encrypted_pdf(dir.path(), "locked.pdf", password);

    let err = PdfReader::new().load(&path).await.unwrap_err();

    assert!(matches!(err, PdfToolError::EncryptedDocument { .. }));
    assert!(err.to_string().contains("encrypted document"));
    assert!(err.is_recoverable());
}

#[test]
fn test_open_encrypted_document_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_encrypted_pdf(dir.path(), "locked.pdf", "");

    let mut app = AppState::new(quiet_settings()).unwrap();
    app.open_document(&path).unwrap();

    match app.wait_for_job(Duration::from_secs(10)) {
        Some(CompletedJob::Failed { kind, error }) => {
            assert_eq!(kind, JobKind::Open);
            assert!(matches!(error, PdfToolError::EncryptedDocument { .. }));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(app.document().is_none());
    app.shutdown();
}
