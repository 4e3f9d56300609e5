//! Grid formation math: slot index to leader-relative offset.
//!
//! Slots fill row by row. Each row is centred on the leader and rows recede
//! behind it along local -z. A row never has more columns than there are
//! members, so a crowd of three stands three abreast rather than
//! off-centre in an eight-wide row.

use serde::{Deserialize, Serialize};

use crate::math::{Pose, Vec3};

/// Row and column of a formation slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSlot {
    pub row: usize,
    pub col: usize,
}

/// Columns actually used for `count` members.
///
/// With `widen` the grid may grow to twice the configured width (flatter
/// grids for very large crowds).
pub fn actual_columns(count: usize, columns: u32, widen: bool) -> usize {
    let limit = if widen {
        columns as usize * 2
    } else {
        columns as usize
    };
    limit.min(count)
}

/// Row/column for slot `index`.
pub fn grid_slot(index: usize, actual_columns: usize) -> GridSlot {
    let cols = actual_columns.max(1);
    GridSlot {
        row: index / cols,
        col: index % cols,
    }
}

/// Leader-local offset of slot `index`.
pub fn slot_offset(index: usize, actual_columns: usize, spacing_x: f32, spacing_z: f32) -> Vec3 {
    let slot = grid_slot(index, actual_columns);
    let width = actual_columns.saturating_sub(1) as f32 * spacing_x;
    Vec3::new(
        slot.col as f32 * spacing_x - width / 2.0,
        0.0,
        -(slot.row as f32) * spacing_z,
    )
}

/// World-space target of slot `index` behind `leader`.
pub fn slot_target(
    leader: &Pose,
    index: usize,
    actual_columns: usize,
    spacing_x: f32,
    spacing_z: f32,
) -> Vec3 {
    leader.transform_point(slot_offset(index, actual_columns, spacing_x, spacing_z))
}

/// Number of rows `count` members occupy.
pub fn row_count(count: usize, actual_columns: usize) -> usize {
    if count == 0 {
        return 0;
    }
    count.div_ceil(actual_columns.max(1))
}
