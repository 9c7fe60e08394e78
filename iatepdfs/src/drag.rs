//! Drag-and-drop reordering.
//!
//! The controller is independent of what is being dragged. Items expose
//! their identity and on-screen bounds through [`Draggable`]; the list that
//! owns them accepts a complete new ordering through [`Reorderable`].
//!
//! The insertion slot under the pointer follows the midpoint rule: pointing
//! at the leading half of an item inserts before it, pointing at the
//! trailing half inserts after it. Items must be supplied in layout order
//! (top to bottom for lists, row-major for grids).
//!
//! # Examples
//!
//! ```
//! use iatepdfs::drag::{splice_order, validate_permutation};
//!
//! // Move the item at index 0 to the slot after index 2.
//! let order = splice_order(4, 0, 3);
//! assert_eq!(order, vec![1, 2, 0, 3]);
//! assert!(validate_permutation(&order, 4).is_ok());
//! ```

use std::fmt::Debug;

use crate::error::{PdfToolError, Result};

/// Opacity of an item while it is being dragged.
pub const DETACHED_OPACITY: f32 = 0.5;

/// A point in container coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate, growing downwards.
    pub y: f64,
}

impl Point {
    /// Create a point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Bounds {
    /// Create a rectangle.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Center point.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether `point` lies inside, edges included on the leading side.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }
}

/// Direction in which items follow each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// A vertical list: one item per row.
    Vertical,
    /// A row-major grid: items run left to right, then wrap.
    Horizontal,
}

/// Something that can be picked up and dropped.
pub trait Draggable {
    /// Identity that survives re-layout.
    type Key: Copy + Eq + Debug;

    /// Identity of this item.
    fn drag_key(&self) -> Self::Key;

    /// Where the item is drawn.
    fn bounds(&self) -> Bounds;
}

/// A list model that accepts a complete new ordering.
pub trait Reorderable {
    /// Number of items that take part in ordering.
    fn item_count(&self) -> usize;

    /// Reorder so that new position `k` holds the item previously at
    /// `order[k]`.
    ///
    /// # Errors
    ///
    /// `InvalidPermutation` if `order` is not a permutation of
    /// `0..item_count()`.
    fn apply_order(&mut self, order: &[usize]) -> Result<()>;
}

/// Result of a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// The order changed; `order[k]` is the old index now at `k`.
    Reordered(Vec<usize>),
    /// Dropped onto its own slot, outside the container, or with nothing
    /// picked up.
    Unchanged,
}

#[derive(Debug, Clone, Copy)]
struct DragState<K> {
    key: K,
    source_index: usize,
}

/// Tracks one drag gesture at a time.
#[derive(Debug, Clone)]
pub struct DragController<K> {
    axis: Axis,
    state: Option<DragState<K>>,
}

impl<K: Copy + Eq + Debug> DragController<K> {
    /// Create a controller for items laid out along `axis`.
    pub fn new(axis: Axis) -> Self {
        Self { axis, state: None }
    }

    /// Pick up the item at `index`.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if there is no such item.
    pub fn pick_up<D>(&mut self, items: &[D], index: usize) -> Result<()>
    where
        D: Draggable<Key = K>,
    {
        let item = items
            .get(index)
            .ok_or_else(|| PdfToolError::out_of_range(index, items.len()))?;

        self.state = Some(DragState {
            key: item.drag_key(),
            source_index: index,
        });
        Ok(())
    }

    /// Slot the picked-up item would be dropped into at `pointer`.
    ///
    /// `None` while the pointer is outside `container` or nothing is
    /// picked up.
    pub fn hover<D>(&self, items: &[D], container: Bounds, pointer: Point) -> Option<usize>
    where
        D: Draggable<Key = K>,
    {
        self.state.as_ref()?;
        insertion_slot(items, container, pointer, self.axis)
    }

    /// Finish the gesture at `pointer`.
    ///
    /// The drag ends whatever the outcome. If the list changed underneath
    /// the drag so that the picked-up item is no longer at its source
    /// index, the drop is ignored.
    pub fn drop<D>(&mut self, items: &[D], container: Bounds, pointer: Point) -> DropOutcome
    where
        D: Draggable<Key = K>,
    {
        let Some(state) = self.state.take() else {
            return DropOutcome::Unchanged;
        };

        let still_there = items
            .get(state.source_index)
            .is_some_and(|item| item.drag_key() == state.key);
        if !still_there {
            return DropOutcome::Unchanged;
        }

        let Some(slot) = insertion_slot(items, container, pointer, self.axis) else {
            return DropOutcome::Unchanged;
        };

        let order = splice_order(items.len(), state.source_index, slot);
        if is_identity(&order) {
            DropOutcome::Unchanged
        } else {
            DropOutcome::Reordered(order)
        }
    }

    /// Finish the gesture and hand a changed ordering to `model`.
    ///
    /// # Errors
    ///
    /// Propagates the model's rejection of the ordering.
    pub fn drop_onto<D, M>(
        &mut self,
        items: &[D],
        container: Bounds,
        pointer: Point,
        model: &mut M,
    ) -> Result<DropOutcome>
    where
        D: Draggable<Key = K>,
        M: Reorderable + ?Sized,
    {
        let outcome = self.drop(items, container, pointer);
        if let DropOutcome::Reordered(order) = &outcome {
            model.apply_order(order)?;
        }
        Ok(outcome)
    }

    /// Abandon the gesture.
    pub fn cancel(&mut self) {
        self.state = None;
    }

    /// Whether a gesture is in progress.
    pub fn is_dragging(&self) -> bool {
        self.state.is_some()
    }

    /// Whether `key` is the picked-up item.
    pub fn is_detached(&self, key: K) -> bool {
        self.state.is_some_and(|state| state.key == key)
    }

    /// Opacity to draw the item with.
    pub fn opacity(&self, key: K) -> f32 {
        if self.is_detached(key) {
            DETACHED_OPACITY
        } else {
            1.0
        }
    }
}

/// Slot in `0..=items.len()` that `pointer` designates.
///
/// `None` when the pointer is outside `container`. Empty space after the
/// last item designates the end of the list.
pub fn insertion_slot<D: Draggable>(
    items: &[D],
    container: Bounds,
    pointer: Point,
    axis: Axis,
) -> Option<usize> {
    if !container.contains(pointer) {
        return None;
    }

    Some(
        items
            .iter()
            .filter(|item| lies_before(item.bounds(), pointer, axis))
            .count(),
    )
}

fn lies_before(bounds: Bounds, pointer: Point, axis: Axis) -> bool {
    let center = bounds.center();
    match axis {
        Axis::Vertical => center.y < pointer.y,
        Axis::Horizontal => {
            if bounds.bottom() <= pointer.y {
                true
            } else if bounds.y <= pointer.y {
                center.x < pointer.x
            } else {
                false
            }
        }
    }
}

/// Ordering after moving the item at `from` into insertion slot `slot`.
///
/// `slot` counts gaps: 0 is before the first item, `len` after the last.
/// Slots past the end are clamped to `len`.
pub fn splice_order(len: usize, from: usize, slot: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    if from >= len {
        return order;
    }

    let slot = slot.min(len);
    let item = order.remove(from);
    let target = if slot > from { slot - 1 } else { slot };
    order.insert(target, item);
    order
}

/// Check that `order` is a permutation of `0..len`.
///
/// # Errors
///
/// `InvalidPermutation` describing the first problem found.
pub fn validate_permutation(order: &[usize], len: usize) -> Result<()> {
    if order.len() != len {
        return Err(PdfToolError::invalid_permutation(format!(
            "expected {len} entries, got {}",
            order.len()
        )));
    }

    let mut seen = vec![false; len];
    for &index in order {
        if index >= len {
            return Err(PdfToolError::invalid_permutation(format!(
                "index {index} is out of range"
            )));
        }
        if std::mem::replace(&mut seen[index], true) {
            return Err(PdfToolError::invalid_permutation(format!(
                "index {index} appears more than once"
            )));
        }
    }

    Ok(())
}

fn is_identity(order: &[usize]) -> bool {
    order.iter().enumerate().all(|(k, &index)| k == index)
}
