//! Whole-document concatenation.
//!
//! The first document becomes the base. Every following document is
//! renumbered past the base's highest object id, its objects are moved in,
//! and its pages are appended to the base's page tree.

use lopdf::{Document, ObjectId};

use crate::backend::pages::{materialize_inherited, rebuild_page_tree};
use crate::error::{PdfToolError, Result};
use crate::io::LoadedPdf;

/// Concatenate `documents` in order into a single document.
///
/// # Errors
///
/// Returns `NotEnoughFiles` for an empty input, or an error if a page tree
/// is malformed.
pub fn merge_documents(documents: Vec<LoadedPdf>) -> Result<Document> {
    let mut documents = documents.into_iter();
    let Some(first) = documents.next() else {
        return Err(PdfToolError::NotEnoughFiles {
            needed: 1,
            found: 0,
        });
    };

    let mut merged = first.document;
    let mut page_ids = flattened_pages(&mut merged)?;

    for loaded in documents {
        let mut doc = loaded.document;
        flattened_pages(&mut doc)?;

        // Renumber objects to avoid ID conflicts
        doc.renumber_objects_with(merged.max_id + 1);
        page_ids.extend(doc.get_pages().into_values());

        merged.max_id = doc.max_id;
        merged.objects.extend(doc.objects);
    }

    rebuild_page_tree(&mut merged, &page_ids)?;
    // Catalogs and page nodes of the appended documents are unreachable now.
    merged.prune_objects();
    merged.renumber_objects();

    Ok(merged)
}

/// Materialize inherited attributes on every page and return the pages in
/// order.
fn flattened_pages(doc: &mut Document) -> Result<Vec<ObjectId>> {
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for &page_id in &page_ids {
        materialize_inherited(doc, page_id)?;
    }
    Ok(page_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::pages::tests::{create_nested_document, page_widths};
    use std::path::PathBuf;
    use std::time::Duration;

    fn loaded(document: Document, name: &str) -> LoadedPdf {
        let page_count = document.get_pages().len();
        LoadedPdf {
            document,
            path: PathBuf::from(name),
            page_count,
            load_time: Duration::ZERO,
            file_size: 0,
        }
    }

    #[test]
    fn test_merge_two_documents() {
        let a = create_nested_document(2);
        let b = create_nested_document(4);

        let merged = merge_documents(vec![loaded(a, "a.pdf"), loaded(b, "b.pdf")]).unwrap();

        assert_eq!(page_widths(&merged), vec![101, 102, 101, 102, 103, 104]);
    }

    #[test]
    fn test_merge_single_document() {
        let merged = merge_documents(vec![loaded(create_nested_document(3), "a.pdf")]).unwrap();
        assert_eq!(merged.get_pages().len(), 3);
    }

    #[test]
    fn test_merge_nothing() {
        assert!(matches!(
            merge_documents(Vec::new()),
            Err(PdfToolError::NotEnoughFiles { found: 0, .. })
        ));
    }

    #[test]
    fn test_merged_pages_keep_resources() {
        let merged = merge_documents(vec![
            loaded(create_nested_document(1), "a.pdf"),
            loaded(create_nested_document(1), "b.pdf"),
        ])
        .unwrap();

        for page_id in merged.get_pages().into_values() {
            let page = merged.get_dictionary(page_id).unwrap();
            assert!(page.has(b"Resources"));
        }
    }
}
