//! Ordered list of PDF files for merging.
//!
//! The order of the list is the literal merge order. Entries keep their
//! [`FileId`] for their whole life; ids are never handed out twice by the
//! same list, so late thumbnail results for a removed file cannot land on a
//! newer entry.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::drag::{Reorderable, validate_permutation};
use crate::error::{PdfToolError, Result};
use crate::io::has_pdf_header;
use crate::thumbnail::Thumbnail;

/// Identity of a file entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file-{}", self.0)
    }
}

/// One PDF in the list.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Identity, unique within the list's lifetime.
    pub id: FileId,
    /// Canonical path.
    pub path: PathBuf,
    /// File name shown as the row title.
    pub display_name: String,
    /// Parent directory shown as the row subtitle.
    pub location: String,
    /// Preview of the first page; `None` while pending.
    pub thumbnail: Option<Thumbnail>,
}

impl FileEntry {
    /// Whether the preview has not arrived yet.
    pub fn is_preview_pending(&self) -> bool {
        self.thumbnail.is_none()
    }
}

/// Ordered, selectable list of files.
#[derive(Debug, Default)]
pub struct FileList {
    entries: Vec<FileEntry>,
    selected: Option<FileId>,
    next_id: u64,
}

impl FileList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a file.
    ///
    /// # Errors
    ///
    /// - `NotAPdf` if the extension is not `.pdf` or the `%PDF-` header is
    ///   missing
    /// - `UnreadableDocument` if the file cannot be opened
    /// - `DuplicateFile` if the same file is already listed
    pub fn add(&mut self, path: &Path) -> Result<&FileEntry> {
        let is_pdf_name = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf_name {
            return Err(PdfToolError::NotAPdf {
                path: path.to_path_buf(),
            });
        }

        let canonical =
            std::fs::canonicalize(path).map_err(|e| PdfToolError::unreadable(path, e.to_string()))?;

        if self.entries.iter().any(|entry| entry.path == canonical) {
            return Err(PdfToolError::DuplicateFile { path: canonical });
        }

        if !has_pdf_header(&canonical)? {
            return Err(PdfToolError::NotAPdf { path: canonical });
        }

        let id = FileId(self.next_id);
        self.next_id += 1;

        let display_name = canonical
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let location = canonical
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        self.entries.push(FileEntry {
            id,
            path: canonical,
            display_name,
            location,
            thumbnail: None,
        });

        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Move the entry at `from` to `to`, shifting the entries in between.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if either index is past the end.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_index(from)?;
        self.check_index(to)?;

        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        Ok(())
    }

    /// Swap the entry at `index` with the one above it.
    ///
    /// Returns `false` if it is already first.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `index` is past the end.
    pub fn move_up(&mut self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        if index == 0 {
            return Ok(false);
        }
        self.entries.swap(index, index - 1);
        Ok(true)
    }

    /// Swap the entry at `index` with the one below it.
    ///
    /// Returns `false` if it is already last.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `index` is past the end.
    pub fn move_down(&mut self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        if index + 1 == self.entries.len() {
            return Ok(false);
        }
        self.entries.swap(index, index + 1);
        Ok(true)
    }

    /// Remove and return the entry at `index`.
    ///
    /// Removing the selected entry clears the selection.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `index` is past the end.
    pub fn remove(&mut self, index: usize) -> Result<FileEntry> {
        self.check_index(index)?;
        let entry = self.entries.remove(index);
        if self.selected == Some(entry.id) {
            self.selected = None;
        }
        Ok(entry)
    }

    /// Remove every entry, returning their ids.
    pub fn clear(&mut self) -> Vec<FileId> {
        self.selected = None;
        self.entries.drain(..).map(|entry| entry.id).collect()
    }

    /// Select the entry at `index`.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `index` is past the end.
    pub fn select(&mut self, index: usize) -> Result<&FileEntry> {
        self.check_index(index)?;
        let entry = &self.entries[index];
        self.selected = Some(entry.id);
        Ok(entry)
    }

    /// The selected entry.
    pub fn selected(&self) -> Option<&FileEntry> {
        let id = self.selected?;
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Position of the selected entry.
    pub fn selected_index(&self) -> Option<usize> {
        let id = self.selected?;
        self.position(id)
    }

    /// Position of the entry with `id`.
    pub fn position(&self, id: FileId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    /// The entry with `id`.
    pub fn find(&self, id: FileId) -> Option<&FileEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// The entry at `index`.
    pub fn get(&self, index: usize) -> Option<&FileEntry> {
        self.entries.get(index)
    }

    /// Paths in list order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|entry| entry.path.clone()).collect()
    }

    /// Entries in list order.
    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record the preview for `id`. Returns `false` if the entry is gone.
    pub fn set_thumbnail(&mut self, id: FileId, thumbnail: Thumbnail) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.thumbnail = Some(thumbnail);
                true
            }
            None => false,
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.entries.len() {
            Ok(())
        } else {
            Err(PdfToolError::out_of_range(index, self.entries.len()))
        }
    }
}

impl Reorderable for FileList {
    fn item_count(&self) -> usize {
        self.entries.len()
    }

    fn apply_order(&mut self, order: &[usize]) -> Result<()> {
        validate_permutation(order, self.entries.len())?;

        let mut slots: Vec<Option<FileEntry>> = self.entries.drain(..).map(Some).collect();
        self.entries = order.iter().filter_map(|&i| slots[i].take()).collect();
        Ok(())
    }
}
