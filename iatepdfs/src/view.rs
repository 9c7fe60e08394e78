//! Presentation items for the two list views.
//!
//! A front-end draws [`FileRow`]s in a vertical list and [`PageTile`]s in a
//! row-major grid. Both carry their bounds so the drag controller can find
//! insertion slots without knowing anything about the toolkit.

use crate::drag::{Bounds, Draggable};
use crate::model::{FileId, FileList, PageList};

/// Geometry of the file list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListLayout {
    /// Row width.
    pub width: f64,
    /// Height of one row.
    pub row_height: f64,
    /// Visible height; the container is never smaller.
    pub viewport_height: f64,
}

impl Default for ListLayout {
    fn default() -> Self {
        Self {
            width: 360.0,
            row_height: 72.0,
            viewport_height: 480.0,
        }
    }
}

impl ListLayout {
    /// Bounds of row `index`.
    pub fn row_bounds(&self, index: usize) -> Bounds {
        Bounds::new(0.0, index as f64 * self.row_height, self.width, self.row_height)
    }

    /// Area that accepts drops for `count` rows.
    pub fn container(&self, count: usize) -> Bounds {
        let content = count as f64 * self.row_height;
        Bounds::new(0.0, 0.0, self.width, content.max(self.viewport_height))
    }
}

/// Geometry of the page grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    /// Tiles per row.
    pub columns: usize,
    /// Tile width.
    pub tile_width: f64,
    /// Tile height, label included.
    pub tile_height: f64,
    /// Gap around tiles.
    pub spacing: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            columns: 8,
            tile_width: 130.0,
            tile_height: 190.0,
            spacing: 10.0,
        }
    }
}

impl GridLayout {
    fn columns(&self) -> usize {
        self.columns.max(1)
    }

    /// Bounds of tile `index`.
    pub fn tile_bounds(&self, index: usize) -> Bounds {
        let column = index % self.columns();
        let row = index / self.columns();
        Bounds::new(
            self.spacing + column as f64 * (self.tile_width + self.spacing),
            self.spacing + row as f64 * (self.tile_height + self.spacing),
            self.tile_width,
            self.tile_height,
        )
    }

    /// Area that accepts drops for `count` tiles.
    pub fn container(&self, count: usize) -> Bounds {
        let rows = count.div_ceil(self.columns()).max(1);
        Bounds::new(
            0.0,
            0.0,
            self.spacing + self.columns() as f64 * (self.tile_width + self.spacing),
            self.spacing + rows as f64 * (self.tile_height + self.spacing),
        )
    }
}

/// A row of the file list.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRow {
    /// Entry shown.
    pub id: FileId,
    /// File name.
    pub title: String,
    /// Parent directory.
    pub subtitle: String,
    /// Whether the preview is still being rendered.
    pub preview_pending: bool,
    /// Where the row is drawn.
    pub bounds: Bounds,
}

impl Draggable for FileRow {
    type Key = FileId;

    fn drag_key(&self) -> FileId {
        self.id
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }
}

/// A tile of the page grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PageTile {
    /// 0-based page index in the source file.
    pub source_index: usize,
    /// Position in the edited order.
    pub position: usize,
    /// Caption, e.g. "Page 3".
    pub label: String,
    /// Whether the preview is still being rendered.
    pub preview_pending: bool,
    /// Where the tile is drawn.
    pub bounds: Bounds,
}

impl Draggable for PageTile {
    type Key = usize;

    fn drag_key(&self) -> usize {
        self.source_index
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }
}

/// Rows for every file, in list order.
pub fn file_rows(files: &FileList, layout: &ListLayout) -> Vec<FileRow> {
    files
        .iter()
        .enumerate()
        .map(|(index, entry)| FileRow {
            id: entry.id,
            title: entry.display_name.clone(),
            subtitle: entry.location.clone(),
            preview_pending: entry.is_preview_pending(),
            bounds: layout.row_bounds(index),
        })
        .collect()
}

/// Tiles for the live pages, in edited order. Deleted pages are not shown.
pub fn page_tiles(pages: &PageList, layout: &GridLayout) -> Vec<PageTile> {
    pages
        .visible()
        .into_iter()
        .enumerate()
        .map(|(index, entry)| PageTile {
            source_index: entry.source_index,
            position: entry.position,
            label: format!("Page {}", entry.page_number()),
            preview_pending: entry.thumbnail.is_none(),
            bounds: layout.tile_bounds(index),
        })
        .collect()
}
