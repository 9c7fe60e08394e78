//! Integration tests for compression failure paths.
//!
//! Ghostscript is never required: the tests point the backend at binaries
//! that do not exist or that fail.

use iatepdfs::backend::PdfBackend;
use iatepdfs::config::{QualityPreset, Settings, ToolPaths};
use iatepdfs::error::PdfToolError;
use rstest::rstest;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::common::write_numbered_pdf;

fn settings_with_gs(program: &str) -> Settings {
    Settings {
        tools: ToolPaths {
            ghostscript: PathBuf::from(program),
            ..ToolPaths::default()
        },
        previews: false,
        ..Settings::default()
    }
}

fn dir_entries(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[rstest]
#[case(QualityPreset::Screen)]
#[case(QualityPreset::Prepress)]
#[tokio::test]
async fn test_missing_ghostscript_leaves_source(#[case] preset: QualityPreset) {
    let dir = TempDir::new().unwrap();
    let input = write_numbered_pdf(dir.path(), "doc.pdf", 2);
    let before = std::fs::read(&input).unwrap();

    let backend = PdfBackend::new(&settings_with_gs("iatepdfs-missing-gs"));
    let err = backend
        .compress(&input, preset, &dir.path().join("doc_compressed.pdf"))
        .await
        .unwrap_err();

    assert!(matches!(err, PdfToolError::MissingExternalTool { .. }));
    assert!(err.is_tool_unavailable());
    assert_eq!(err.exit_code(), 127);
    assert_eq!(std::fs::read(&input).unwrap(), before);
    assert_eq!(dir_entries(&dir), vec!["doc.pdf"]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_failing_ghostscript_reports_exit_code() {
    let dir = TempDir::new().unwrap();
    let input = write_numbered_pdf(dir.path(), "doc.pdf", 1);

    let backend = PdfBackend::new(&settings_with_gs("false"));
    let err = backend
        .compress(&input, QualityPreset::Ebook, &dir.path().join("out.pdf"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PdfToolError::ToolExecutionFailed {
            exit_code: Some(1),
            ..
        }
    ));
    assert_eq!(dir_entries(&dir), vec!["doc.pdf"]);
}

#[tokio::test]
async fn test_compress_missing_source() {
    let dir = TempDir::new().unwrap();
    let backend = PdfBackend::new(&settings_with_gs("iatepdfs-missing-gs"));

    let err = backend
        .compress(
            &dir.path().join("absent.pdf"),
            QualityPreset::Ebook,
            &dir.path().join("out.pdf"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PdfToolError::UnreadableDocument { .. }));
}

#[tokio::test]
async fn test_compress_refuses_to_overwrite_source() {
    let dir = TempDir::new().unwrap();
    let input = write_numbered_pdf(dir.path(), "doc.pdf", 1);
    let backend = PdfBackend::new(&settings_with_gs("iatepdfs-missing-gs"));

    let err = backend
        .compress(&input, QualityPreset::Ebook, &input)
        .await
        .unwrap_err();

    assert!(matches!(err, PdfToolError::InvalidConfig { .. }));
    assert_eq!(dir_entries(&dir), vec!["doc.pdf"]);
}
