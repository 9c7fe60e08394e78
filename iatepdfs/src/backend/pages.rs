//! Page tree manipulation.
//!
//! Output documents always get a flat page tree: one root `Pages` node whose
//! `Kids` lists every page in output order. Before a page is moved under that
//! root, the attributes it inherits from intermediate nodes are copied onto
//! the page itself so it renders the same once those nodes are gone.

use lopdf::{Document, Object, ObjectId};
use std::collections::HashSet;

use crate::error::{PdfToolError, Result};

/// Page attributes a page may inherit from its ancestors.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains in malformed files.
const MAX_TREE_DEPTH: usize = 64;

/// Copy inherited attributes onto the page dictionary.
///
/// # Errors
///
/// Fails if the page or one of its ancestors is not a dictionary.
pub fn materialize_inherited(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let mut inherited: Vec<(&[u8], Object)> = Vec::new();

    {
        let page = doc.get_dictionary(page_id)?;
        let mut missing: Vec<&[u8]> = INHERITABLE
            .iter()
            .copied()
            .filter(|key| !page.has(key))
            .collect();
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut depth = 0;

        while let Some(parent_id) = parent {
            if missing.is_empty() || depth >= MAX_TREE_DEPTH {
                break;
            }

            let node = doc.get_dictionary(parent_id)?;
            missing.retain(|key| match node.get(key) {
                Ok(value) => {
                    inherited.push((*key, value.clone()));
                    false
                }
                Err(_) => true,
            });

            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
            depth += 1;
        }
    }

    if !inherited.is_empty() {
        let page = doc.get_dictionary_mut(page_id)?;
        for (key, value) in inherited {
            page.set(key.to_vec(), value);
        }
    }

    Ok(())
}

/// Make `page_ids` the complete, ordered page list of `doc`.
///
/// Pages are hung directly under the catalog's root `Pages` node. Nodes and
/// pages that drop out of the tree become unreachable and are removed by
/// the next `prune_objects`.
///
/// # Errors
///
/// Fails if the catalog has no `Pages` reference or a page is not a
/// dictionary.
pub fn rebuild_page_tree(doc: &mut Document, page_ids: &[ObjectId]) -> Result<()> {
    let pages_id = doc
        .catalog()?
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|e| PdfToolError::other(format!("Failed to get pages reference: {e}")))?;

    for &page_id in page_ids {
        doc.get_dictionary_mut(page_id)?.set("Parent", pages_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();
    let pages = doc.get_dictionary_mut(pages_id)?;
    pages.set("Kids", kids);
    pages.set("Count", page_ids.len() as i64);

    Ok(())
}

/// Build a copy of `source` containing exactly `page_numbers`, in that order.
///
/// Page numbers are 1-based, as returned by `Document::get_pages`. The copy
/// drops the outline, whose entries may point at pages that are gone.
///
/// # Errors
///
/// - `NoPagesSelected` if `page_numbers` is empty
/// - `OutOfRange` if a page does not exist
/// - `InvalidPermutation` if a page is listed twice
pub fn extract_pages(source: &Document, page_numbers: &[u32]) -> Result<Document> {
    if page_numbers.is_empty() {
        return Err(PdfToolError::NoPagesSelected);
    }

    let all_pages = source.get_pages();
    let mut seen = HashSet::with_capacity(page_numbers.len());
    let mut page_ids = Vec::with_capacity(page_numbers.len());

    for &number in page_numbers {
        let id = all_pages
            .get(&number)
            .copied()
            .ok_or_else(|| PdfToolError::out_of_range(number as usize, all_pages.len()))?;
        if !seen.insert(number) {
            return Err(PdfToolError::invalid_permutation(format!(
                "page {number} is listed more than once"
            )));
        }
        page_ids.push(id);
    }

    let mut doc = source.clone();
    for &page_id in &page_ids {
        materialize_inherited(&mut doc, page_id)?;
    }
    rebuild_page_tree(&mut doc, &page_ids)?;

    doc.catalog_mut()?.remove(b"Outlines");
    doc.prune_objects();

    Ok(doc)
}

/// Get the number of pages in a document.
pub fn page_count(doc: &Document) -> usize {
    doc.get_pages().len()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::dictionary;

    /// Document whose page `i` (1-based) is `100 + i` points wide, nested
    /// under intermediate `Pages` nodes in groups of three. Resources and
    /// height are inherited from the root node.
    pub(crate) fn create_nested_document(pages: usize) -> Document {
        let mut doc = Document::with_version("1.5");
        let root_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut groups = Vec::new();
        for chunk_start in (0..pages).step_by(3) {
            let group_id = doc.new_object_id();
            let chunk_end = (chunk_start + 3).min(pages);
            let kids: Vec<Object> = (chunk_start..chunk_end)
                .map(|i| {
                    doc.add_object(dictionary! {
                        "Type" => "Page",
                        "Parent" => group_id,
                        "MediaBox" => vec![0.into(), 0.into(), (101 + i as i64).into(), 792.into()],
                    })
                    .into()
                })
                .collect();
            doc.objects.insert(
                group_id,
                dictionary! {
                    "Type" => "Pages",
                    "Parent" => root_id,
                    "Kids" => kids,
                    "Count" => (chunk_end - chunk_start) as i64,
                    "Rotate" => 90,
                }
                .into(),
            );
            groups.push(Object::Reference(group_id));
        }

        doc.objects.insert(
            root_id,
            dictionary! {
                "Type" => "Pages",
                "Kids" => groups,
                "Count" => pages as i64,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            }
            .into(),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => root_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    /// Widths of the pages in order, identifying which source page each is.
    pub(crate) fn page_widths(doc: &Document) -> Vec<i64> {
        doc.get_pages()
            .values()
            .map(|&id| {
                let page = doc.get_dictionary(id).unwrap();
                page.get(b"MediaBox").unwrap().as_array().unwrap()[2]
                    .as_i64()
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_page_count() {
        let doc = create_nested_document(7);
        assert_eq!(page_count(&doc), 7);
    }

    #[test]
    fn test_materialize_inherited() {
        let mut doc = create_nested_document(2);
        let page_id = doc.get_pages()[&1];

        materialize_inherited(&mut doc, page_id).unwrap();

        let page = doc.get_dictionary(page_id).unwrap();
        assert!(page.has(b"Resources"));
        assert_eq!(page.get(b"Rotate").unwrap().as_i64().unwrap(), 90);
        // Own MediaBox is never overwritten.
        assert_eq!(
            page.get(b"MediaBox").unwrap().as_array().unwrap()[2]
                .as_i64()
                .unwrap(),
            101
        );
        assert!(!page.has(b"CropBox"));
    }

    #[test]
    fn test_extract_pages_in_given_order() {
        let doc = create_nested_document(5);

        let extracted = extract_pages(&doc, &[5, 1, 3]).unwrap();

        assert_eq!(page_widths(&extracted), vec![105, 101, 103]);
        assert_eq!(page_widths(&doc), vec![101, 102, 103, 104, 105]);
    }

    #[test]
    fn test_extracted_pages_keep_inherited_attributes() {
        let doc = create_nested_document(4);

        let extracted = extract_pages(&doc, &[4]).unwrap();

        let page_id = extracted.get_pages()[&1];
        let page = extracted.get_dictionary(page_id).unwrap();
        assert!(page.has(b"Resources"));
        assert_eq!(page.get(b"Rotate").unwrap().as_i64().unwrap(), 90);
    }

    #[test]
    fn test_extract_pages_errors() {
        let doc = create_nested_document(3);

        assert!(matches!(
            extract_pages(&doc, &[]),
            Err(PdfToolError::NoPagesSelected)
        ));
        assert!(matches!(
            extract_pages(&doc, &[4]),
            Err(PdfToolError::OutOfRange { index: 4, len: 3 })
        ));
        assert!(matches!(
            extract_pages(&doc, &[1, 1]),
            Err(PdfToolError::InvalidPermutation { .. })
        ));
    }

    #[test]
    fn test_extract_survives_save_and_reload() {
        let doc = create_nested_document(6);
        let mut extracted = extract_pages(&doc, &[2, 6]).unwrap();

        let mut bytes = Vec::new();
        extracted.save_to(&mut bytes).unwrap();
        let reloaded = Document::load_mem(&bytes).unwrap();

        assert_eq!(page_widths(&reloaded), vec![102, 106]);
    }
}
