//! Sibling position sequencing.
//!
//! # Invariants
//! - New nodes are appended: `max(sibling positions) + 1`, or `0` when empty.
//! - Display order is `position ASC`; equal positions keep store order.
//! - A move swaps positions with the adjacent sibling only.

use crate::model::node::{HierarchyNode, NodeId};
use serde::{Deserialize, Serialize};

/// Position for a node appended after siblings whose highest position is
/// `max_existing`.
pub fn next_position(max_existing: Option<i64>) -> i64 {
    max_existing.map_or(0, |max| max.max(-1).saturating_add(1))
}

/// Reorder direction within a sibling list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    /// Towards the start of the list (lower position).
    Up,
    /// Towards the end of the list (higher position).
    Down,
}

impl MoveDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// Planned position exchange between a node and its neighbour.
///
/// Carries the positions the plan was computed from so storage can reject
/// the swap when either row changed in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionSwap {
    pub moving_id: NodeId,
    pub moving_position: i64,
    pub neighbor_id: NodeId,
    pub neighbor_position: i64,
}

impl PositionSwap {
    /// Both rows share a position, so exchanging values changes nothing.
    pub fn is_tie(&self) -> bool {
        self.moving_position == self.neighbor_position
    }
}

/// Plans a one-step move of `node_id` inside `siblings` (display order).
///
/// Returns `None` when the node is not in the list or is already at the edge
/// in the requested direction.
pub fn plan_move(
    siblings: &[HierarchyNode],
    node_id: NodeId,
    direction: MoveDirection,
) -> Option<PositionSwap> {
    let index = siblings.iter().position(|node| node.id == node_id)?;
    let neighbor_index = match direction {
        MoveDirection::Up => index.checked_sub(1)?,
        MoveDirection::Down => index + 1,
    };
    let neighbor = siblings.get(neighbor_index)?;
    let moving = &siblings[index];
    Some(PositionSwap {
        moving_id: moving.id,
        moving_position: moving.position,
        neighbor_id: neighbor.id,
        neighbor_position: neighbor.position,
    })
}

/// Gap-free positions `0..n` following current display order.
pub fn resequence(siblings: &[HierarchyNode]) -> Vec<(NodeId, i64)> {
    siblings
        .iter()
        .enumerate()
        .map(|(index, node)| (node.id, index as i64))
        .collect()
}
