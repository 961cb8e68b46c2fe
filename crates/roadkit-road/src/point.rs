//! Anchor points and their tangent handles

use glam::Vec3;
use roadkit_core::PointId;
use serde::{Deserialize, Serialize};

/// Which part of an anchor point an edit addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handle {
    Anchor,
    LeftHandle,
    RightHandle,
}

/// A curve vertex with two tangent offsets.
///
/// `left_tangent` shapes the incoming segment and `right_tangent` the
/// outgoing one. Both are stored relative to `position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorPoint {
    #[serde(skip)]
    pub id: PointId,
    pub position: Vec3,
    #[serde(default)]
    pub left_tangent: Vec3,
    #[serde(default)]
    pub right_tangent: Vec3,
}

impl AnchorPoint {
    pub fn new(position: Vec3) -> Self {
        Self {
            id: PointId::new(),
            position,
            left_tangent: Vec3::ZERO,
            right_tangent: Vec3::ZERO,
        }
    }

    pub fn with_tangents(position: Vec3, left_tangent: Vec3, right_tangent: Vec3) -> Self {
        Self {
            id: PointId::new(),
            position,
            left_tangent,
            right_tangent,
        }
    }

    /// World position of an anchor or handle.
    pub fn handle_position(&self, handle: Handle) -> Vec3 {
        match handle {
            Handle::Anchor => self.position,
            Handle::LeftHandle => self.position + self.left_tangent,
            Handle::RightHandle => self.position + self.right_tangent,
        }
    }

    /// Move an anchor or handle to world position `target`.
    ///
    /// Handles stay relative to the anchor, so moving the anchor carries
    /// them along. Moving one handle points the opposite handle the other
    /// way (keeping its length) unless `independent` is set.
    pub fn move_handle(&mut self, handle: Handle, target: Vec3, independent: bool) {
        match handle {
            Handle::Anchor => self.position = target,
            Handle::LeftHandle => {
                self.left_tangent = target - self.position;
                if !independent {
                    self.right_tangent = mirrored(self.left_tangent, self.right_tangent);
                }
            }
            Handle::RightHandle => {
                self.right_tangent = target - self.position;
                if !independent {
                    self.left_tangent = mirrored(self.right_tangent, self.left_tangent);
                }
            }
        }
    }
}

fn mirrored(moved: Vec3, other: Vec3) -> Vec3 {
    let dir = moved.normalize_or_zero();
    if dir == Vec3::ZERO {
        return other;
    }
    let length = other.length();
    // A collapsed opposite handle takes the moved handle's length.
    let length = if length <= f32::EPSILON { moved.length() } else { length };
    -dir * length
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_positions_are_world_space() {
        let p = AnchorPoint::with_tangents(Vec3::new(1.0, 0.0, 0.0), Vec3::NEG_X, Vec3::X * 2.0);
        assert_eq!(p.handle_position(Handle::Anchor), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(p.handle_position(Handle::LeftHandle), Vec3::ZERO);
        assert_eq!(p.handle_position(Handle::RightHandle), Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_moving_a_handle_mirrors_the_other() {
        let mut p = AnchorPoint::with_tangents(Vec3::ZERO, Vec3::NEG_X, Vec3::X * 3.0);
        p.move_handle(Handle::LeftHandle, Vec3::new(0.0, 0.0, 2.0), false);
        assert_eq!(p.left_tangent, Vec3::new(0.0, 0.0, 2.0));
        assert!((p.right_tangent - Vec3::new(0.0, 0.0, -3.0)).length() < 1e-6);
    }

    #[test]
    fn test_independent_handles_do_not_mirror() {
        let mut p = AnchorPoint::with_tangents(Vec3::ZERO, Vec3::NEG_X, Vec3::X);
        p.move_handle(Handle::RightHandle, Vec3::new(0.0, 0.0, 5.0), true);
        assert_eq!(p.left_tangent, Vec3::NEG_X);
        assert_eq!(p.right_tangent, Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn test_moving_the_anchor_carries_handles() {
        let mut p = AnchorPoint::with_tangents(Vec3::ZERO, Vec3::NEG_X, Vec3::X);
        p.move_handle(Handle::Anchor, Vec3::new(5.0, 1.0, 0.0), false);
        assert_eq!(p.handle_position(Handle::RightHandle), Vec3::new(6.0, 1.0, 0.0));
    }
}
