//! Level-of-detail for large crowds.
//!
//! Past the performance threshold, laying out every member every tick is
//! too expensive. This module provides the pure decisions behind the
//! degraded layout: which mode to use, which members to refresh this tick,
//! and which members to cull by distance.
//!
//! # Modes
//!
//! | Mode | Who | Members refreshed per tick | Columns | Culling |
//! |------|-----|----------------------------|---------|---------|
//! | `Full` | count <= threshold | all | configured | no |
//! | `Degraded` | count > threshold | `members_per_tick` | up to 2x | yes |
//!
//! # Usage
//!
//! ```
//! use crowd_logic::config::CrowdConfig;
//! use crowd_logic::lod::{select_layout, LayoutMode, RollingCursor};
//!
//! let config = CrowdConfig::default();
//! assert_eq!(select_layout(150, &config.performance), LayoutMode::Degraded);
//!
//! let mut cursor = RollingCursor::default();
//! let first = cursor.window(150, 10);
//! assert_eq!(first, (0..10).collect::<Vec<_>>());
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{FormationConfig, PerformanceConfig};
use crate::formation::actual_columns;

/// Layout algorithm for the current population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutMode {
    /// Every member refreshed every tick.
    Full,
    /// Bounded refresh with a rolling cursor and distance culling.
    Degraded,
}

/// Pick the layout mode for `count` members.
pub fn select_layout(count: usize, perf: &PerformanceConfig) -> LayoutMode {
    if count > perf.threshold as usize {
        LayoutMode::Degraded
    } else {
        LayoutMode::Full
    }
}

/// Grid width for `count` members in `mode`.
pub fn layout_columns(mode: LayoutMode, count: usize, formation: &FormationConfig) -> usize {
    let widen = mode == LayoutMode::Degraded && formation.use_simple_formation;
    actual_columns(count, formation.columns, widen)
}

/// Approach rate (per second) for members in `mode`.
pub fn layout_rate(mode: LayoutMode, formation: &FormationConfig) -> f32 {
    match mode {
        LayoutMode::Full => formation.member_smooth,
        LayoutMode::Degraded => formation.member_smooth * formation.degraded_smooth_multiplier,
    }
}

/// Round-robin cursor over the roster.
///
/// Each call hands out the next `budget` slot indices, wrapping at the
/// roster end, so every member is visited within `ceil(count / budget)`
/// ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingCursor {
    next: usize,
}

impl RollingCursor {
    /// Slot indices to refresh this tick.
    pub fn window(&mut self, count: usize, budget: usize) -> Vec<usize> {
        let take = budget.min(count);
        let mut indices = Vec::with_capacity(take);
        for _ in 0..take {
            if self.next >= count {
                self.next = 0;
            }
            indices.push(self.next);
            self.next += 1;
        }
        indices
    }

    /// Index the next window starts from (before wrapping).
    pub fn position(&self) -> usize {
        self.next
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

/// What to do with a member's visibility this refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CullDecision {
    /// In range and visible: lay it out.
    Visible,
    /// Was culled, back in range: reactivate, then lay it out.
    Restore,
    /// Visible but out of range: deactivate, skip layout.
    Cull,
    /// Still culled and still out of range.
    StayCulled,
}

impl CullDecision {
    /// Whether the member should be positioned this refresh.
    pub fn positions(self) -> bool {
        matches!(self, CullDecision::Visible | CullDecision::Restore)
    }
}

/// Decide culling for a member `distance` away from the leader.
pub fn cull_decision(distance: f32, cull_distance: f32, culled: bool) -> CullDecision {
    match (distance > cull_distance, culled) {
        (false, false) => CullDecision::Visible,
        (false, true) => CullDecision::Restore,
        (true, false) => CullDecision::Cull,
        (true, true) => CullDecision::StayCulled,
    }
}

/// What one layout pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LodStats {
    /// Members moved toward their slot.
    pub refreshed: usize,
    /// Members deactivated for distance.
    pub culled: usize,
    /// Members reactivated.
    pub restored: usize,
    /// Members left alone because they were airborne.
    pub airborne: usize,
}

impl LodStats {
    /// Members the pass looked at.
    pub fn visited(&self) -> usize {
        self.refreshed + self.culled + self.airborne
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrowdConfig;

    #[test]
    fn threshold_is_inclusive_for_full() {
        let perf = PerformanceConfig::default();
        assert_eq!(select_layout(50, &perf), LayoutMode::Full);
        assert_eq!(select_layout(51, &perf), LayoutMode::Degraded);
        assert_eq!(select_layout(0, &perf), LayoutMode::Full);
    }

    #[test]
    fn degraded_widens_columns() {
        let config = CrowdConfig::default();
        assert_eq!(layout_columns(LayoutMode::Full, 150, &config.formation), 8);
        assert_eq!(layout_columns(LayoutMode::Degraded, 150, &config.formation), 16);
    }

    #[test]
    fn degraded_without_simple_formation_keeps_width() {
        let mut config = CrowdConfig::default();
        config.formation.use_simple_formation = false;
        assert_eq!(layout_columns(LayoutMode::Degraded, 150, &config.formation), 8);
    }

    #[test]
    fn degraded_rate_is_faster() {
        let config = CrowdConfig::default();
        assert!(
            layout_rate(LayoutMode::Degraded, &config.formation)
                > layout_rate(LayoutMode::Full, &config.formation)
        );
    }

    #[test]
    fn cursor_visits_everyone() {
        let mut cursor = RollingCursor::default();
        let mut seen = vec![0u32; 25];
        for _ in 0..5 {
            for i in cursor.window(25, 5) {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
    }

    #[test]
    fn cursor_wraps() {
        let mut cursor = RollingCursor::default();
        cursor.window(12, 10);
        assert_eq!(cursor.window(12, 10), vec![10, 11, 0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn cursor_survives_roster_shrink() {
        let mut cursor = RollingCursor::default();
        cursor.window(100, 60);
        // Roster dropped to 20: restart from the front
        assert_eq!(cursor.window(20, 3), vec![0, 1, 2]);
    }

    #[test]
    fn cursor_budget_larger_than_roster() {
        let mut cursor = RollingCursor::default();
        assert_eq!(cursor.window(3, 10), vec![0, 1, 2]);
        assert!(cursor.window(0, 10).is_empty());
    }

    #[test]
    fn cull_decisions() {
        assert_eq!(cull_decision(5.0, 20.0, false), CullDecision::Visible);
        assert_eq!(cull_decision(5.0, 20.0, true), CullDecision::Restore);
        assert_eq!(cull_decision(25.0, 20.0, false), CullDecision::Cull);
        assert_eq!(cull_decision(25.0, 20.0, true), CullDecision::StayCulled);
        // Exactly at the limit stays visible
        assert_eq!(cull_decision(20.0, 20.0, false), CullDecision::Visible);
        assert!(CullDecision::Restore.positions());
        assert!(!CullDecision::Cull.positions());
    }
}
