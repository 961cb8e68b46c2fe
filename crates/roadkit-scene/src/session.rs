//! Edit session state for interactive hosts.
//!
//! The host owns an [`EditSession`] and feeds it the selection and cursor;
//! the session turns them into network edits. Anchor edits are recorded on
//! an undo stack.

use glam::Vec3;
use roadkit_core::{ObjectId, Result, RoadError};
use roadkit_road::{AnchorPoint, ConnectionEnd, Handle};

use crate::network::{RemoveOutcome, RoadNetwork, SplitOutcome};

/// What the next `apply` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditTool {
    /// Drag the selected anchor or handle to the cursor
    #[default]
    Move,
    /// Insert a point on the selected segment nearest the cursor
    Insert,
    /// Split the road at the selected point
    Split { large_movement: bool },
    Remove,
    /// Extend the selected road past an end to the cursor
    Continue(ConnectionEnd),
}

/// The anchor (or one of its handles) the host has selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub road: ObjectId,
    /// Point index; a segment index for [`EditTool::Insert`]
    pub index: usize,
    pub handle: Handle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Moved,
    Inserted(usize),
    Split(SplitOutcome),
    Removed(RemoveOutcome),
    Continued(usize),
}

/// A recorded anchor change for undo/redo.
#[derive(Debug, Clone)]
pub struct UndoEntry {
    pub road: ObjectId,
    pub index: usize,
    pub before: AnchorPoint,
    pub after: AnchorPoint,
}

#[derive(Debug, Default)]
pub struct EditSession {
    pub tool: EditTool,
    /// Handles move without mirroring their opposite
    pub move_independently: bool,
    pub cursor: Option<Vec3>,
    pub selection: Option<Selection>,
    undo_stack: Vec<UndoEntry>,
    redo_stack: Vec<UndoEntry>,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, road: ObjectId, index: usize, handle: Handle) {
        self.selection = Some(Selection { road, index, handle });
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn selected(&self) -> Result<Selection> {
        self.selection
            .ok_or_else(|| RoadError::NotFound("nothing selected".into()))
    }

    fn cursor(&self) -> Result<Vec3> {
        self.cursor
            .ok_or_else(|| RoadError::NotFound("no cursor position".into()))
    }

    /// Run the current tool against the network.
    pub fn apply(&mut self, network: &mut RoadNetwork) -> Result<EditOutcome> {
        let selection = self.selected()?;
        let outcome = match self.tool {
            EditTool::Move => {
                let target = self.cursor()?;
                let before = self.point(network, selection)?;
                network.move_point(
                    selection.road,
                    selection.index,
                    selection.handle,
                    target,
                    self.move_independently,
                )?;
                let after = self.point(network, selection)?;
                self.undo_stack.push(UndoEntry {
                    road: selection.road,
                    index: selection.index,
                    before,
                    after,
                });
                self.redo_stack.clear();
                EditOutcome::Moved
            }
            EditTool::Insert => {
                let target = self.cursor()?;
                let index = network.insert_point(selection.road, selection.index, target)?;
                self.invalidate_history(selection.road);
                EditOutcome::Inserted(index)
            }
            EditTool::Split { large_movement } => {
                let outcome = network.split_segment(selection.road, selection.index, large_movement)?;
                self.invalidate_history(selection.road);
                EditOutcome::Split(outcome)
            }
            EditTool::Remove => {
                let outcome = network.remove_point(selection.road, selection.index)?;
                self.invalidate_history(selection.road);
                self.selection = None;
                EditOutcome::Removed(outcome)
            }
            EditTool::Continue(end) => {
                let target = self.cursor()?;
                let index = network.continue_road(selection.road, end, target)?;
                self.invalidate_history(selection.road);
                self.selection = Some(Selection {
                    index,
                    handle: Handle::Anchor,
                    ..selection
                });
                EditOutcome::Continued(index)
            }
        };
        Ok(outcome)
    }

    /// Revert the last anchor move. Returns false with nothing to undo.
    pub fn undo(&mut self, network: &mut RoadNetwork) -> Result<bool> {
        let Some(entry) = self.undo_stack.pop() else {
            return Ok(false);
        };
        network.replace_point(entry.road, entry.index, &entry.before)?;
        self.redo_stack.push(entry);
        Ok(true)
    }

    pub fn redo(&mut self, network: &mut RoadNetwork) -> Result<bool> {
        let Some(entry) = self.redo_stack.pop() else {
            return Ok(false);
        };
        network.replace_point(entry.road, entry.index, &entry.after)?;
        self.undo_stack.push(entry);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    fn point(&self, network: &RoadNetwork, selection: Selection) -> Result<AnchorPoint> {
        let road = network
            .road(selection.road)
            .ok_or_else(|| RoadError::NotFound(format!("road {}", selection.road)))?;
        let count = road.curve().point_count();
        road.curve()
            .points
            .get(selection.index)
            .cloned()
            .ok_or(RoadError::IndexOutOfRange {
                index: selection.index,
                len: count,
            })
    }

    // Point indices on this road shift after structural edits.
    fn invalidate_history(&mut self, road: ObjectId) {
        self.undo_stack.retain(|e| e.road != road);
        self.redo_stack.retain(|e| e.road != road);
    }
}
