//! Drag gesture state machine
//!
//! `idle → dragging → { dropped → idle, cancelled → idle }`
//!
//! A gesture works on a by-value snapshot of the per-bucket id layout taken
//! at drag start. Hovering splices ids purely in memory; the cache and the
//! network are never touched mid-gesture. Drag end collapses the whole
//! gesture to at most one move call - rapid bucket-hopping emits nothing
//! until the pointer is released.

use chrono::NaiveDate;
use shared::MealSlot;

use crate::cache::{BucketLayout, RangeCache};

/// Pointer position relative to the hovered sibling's midpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverPosition {
    /// Above the midpoint - insert before the sibling
    Above,
    /// Below the midpoint - insert after the sibling
    Below,
}

/// The single move call a completed gesture collapses to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTarget {
    pub entry_id: String,
    pub target_date: NaiveDate,
    pub target_slot: MealSlot,
    pub target_index: u32,
}

#[derive(Debug, Default)]
enum DragState {
    #[default]
    Idle,
    Dragging(Gesture),
}

#[derive(Debug)]
struct Gesture {
    entry_id: String,
    origin: ((NaiveDate, MealSlot), usize),
    layout: BucketLayout,
}

impl Gesture {
    /// Where the dragged id currently sits in the working layout
    fn position(&self) -> Option<((NaiveDate, MealSlot), usize)> {
        for (bucket, ids) in &self.layout {
            if let Some(index) = ids.iter().position(|id| id == &self.entry_id) {
                return Some((*bucket, index));
            }
        }
        None
    }
}

/// State machine for one pointer gesture
#[derive(Debug, Default)]
pub struct DragSession {
    state: DragState,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    /// Begin a gesture on `entry_id`, snapshotting the cache's layout
    ///
    /// `false` when a gesture is already active or the id is not cached.
    pub fn drag_start(&mut self, cache: &RangeCache, entry_id: &str) -> bool {
        if self.is_dragging() {
            return false;
        }
        let layout = cache.bucket_layout();
        let origin = layout.iter().find_map(|(bucket, ids)| {
            ids.iter()
                .position(|id| id == entry_id)
                .map(|index| (*bucket, index))
        });
        let Some(origin) = origin else {
            return false;
        };
        self.state = DragState::Dragging(Gesture {
            entry_id: entry_id.to_string(),
            origin,
            layout,
        });
        true
    }

    /// Hover the pointer over a bucket, splicing the dragged id in memory
    ///
    /// `hovered` names the sibling under the pointer; `None` targets the end
    /// of the bucket (including an empty one).
    pub fn drag_over(
        &mut self,
        date: NaiveDate,
        slot: MealSlot,
        hovered: Option<&str>,
        position: HoverPosition,
    ) -> bool {
        let DragState::Dragging(gesture) = &mut self.state else {
            return false;
        };

        let dragged = gesture.entry_id.clone();
        let mut spliced_out = false;
        for ids in gesture.layout.values_mut() {
            if let Some(pos) = ids.iter().position(|id| id == &dragged) {
                ids.remove(pos);
                spliced_out = true;
                break;
            }
        }
        if !spliced_out {
            return false;
        }

        let bucket = gesture.layout.entry((date, slot)).or_default();
        let index = match hovered {
            Some(sibling) => match bucket.iter().position(|id| id == sibling) {
                Some(at) => match position {
                    HoverPosition::Above => at,
                    HoverPosition::Below => at + 1,
                },
                None => bucket.len(),
            },
            None => bucket.len(),
        };
        bucket.insert(index, dragged);
        true
    }

    /// Release the pointer
    ///
    /// `None` when the entry sits exactly where it started - the gesture is
    /// discarded without an engine call. Otherwise the final (bucket, index)
    /// becomes one move request.
    pub fn drag_end(&mut self) -> Option<DropTarget> {
        let DragState::Dragging(gesture) = std::mem::take(&mut self.state) else {
            return None;
        };
        let (bucket, index) = gesture.position()?;
        if (bucket, index) == gesture.origin {
            return None;
        }
        Some(DropTarget {
            entry_id: gesture.entry_id,
            target_date: bucket.0,
            target_slot: bucket.1,
            target_index: index as u32,
        })
    }

    /// Abandon the gesture
    ///
    /// The cache was never touched mid-gesture, so dropping the working
    /// layout restores the pre-gesture view.
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }

    /// The working layout while a gesture is active, for rendering
    pub fn layout(&self) -> Option<&BucketLayout> {
        match &self.state {
            DragState::Dragging(gesture) => Some(&gesture.layout),
            DragState::Idle => None,
        }
    }
}
