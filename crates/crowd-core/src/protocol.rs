//! Population change protocol - every event that resizes the crowd.
//!
//! Gates, hazards, hordes and the finish line all funnel through
//! [`CrowdEngine::apply`]. Each change hits the store once, so the
//! deformation is recomputed and the game-over check runs once per event no
//! matter how many members it touched.

use hecs::Entity;
use serde::{Deserialize, Serialize};

use crowd_logic::gates::multiply_delta;

use crate::engine::CrowdEngine;
use crate::session::Cue;

/// A request to resize the crowd
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PopulationChange {
    /// Spawn members; large requests are spread over several ticks
    Add(u32),
    /// Drop the most recently added members
    Remove(u32),
    /// Signed change; negative values count as damage
    Delta(i64),
    /// `round(count * ratio) - count`, ties to even
    Multiply(f32),
    /// A horde took this many members
    HordeDamage(u32),
    /// One member touched a lethal hazard
    HazardKill(Entity),
    /// One member dropped through a gap
    Fall(Entity),
    /// Win-sequence removal; never ends the game
    FinishDrain(u32),
}

/// Live count around one change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeOutcome {
    pub before: usize,
    /// Count right after the change. Scheduled spawns are not included yet.
    pub after: usize,
}

impl ChangeOutcome {
    pub fn delta(&self) -> i64 {
        self.after as i64 - self.before as i64
    }
}

impl CrowdEngine {
    /// Apply one population change. A disabled engine ignores everything.
    pub fn apply(&mut self, change: PopulationChange) -> ChangeOutcome {
        let Some(store) = self.store.as_mut() else {
            return ChangeOutcome::default();
        };
        let session = &mut self.session;
        let before = store.count();

        let delta = match change {
            PopulationChange::Delta(delta) => Some(delta),
            PopulationChange::Multiply(ratio) => Some(multiply_delta(before, ratio)),
            _ => None,
        };

        let damage = match (change, delta) {
            (_, Some(delta)) if delta > 0 => {
                store.add(delta as usize, session);
                0
            }
            (_, Some(delta)) => store.remove(delta.unsigned_abs() as usize, session),
            (PopulationChange::Add(n), None) => {
                store.add(n as usize, session);
                0
            }
            (PopulationChange::Remove(n), None) => {
                store.remove(n as usize, session);
                0
            }
            (PopulationChange::HordeDamage(n), None) => {
                if n > 0 && before > 0 {
                    session.play(Cue::Damage);
                }
                store.remove(n as usize, session)
            }
            (PopulationChange::HazardKill(entity), None) => {
                usize::from(store.kill_by_hazard(entity, session))
            }
            (PopulationChange::Fall(entity), None) => usize::from(store.make_fall(entity, session)),
            (PopulationChange::FinishDrain(n), None) => {
                store.remove_for_finish_drain(n as usize, session);
                0
            }
            (PopulationChange::Delta(_) | PopulationChange::Multiply(_), None) => 0,
        };

        self.damage_taken += damage as u64;
        ChangeOutcome {
            before,
            after: store.len(),
        }
    }

    pub fn add(&mut self, n: u32) -> ChangeOutcome {
        self.apply(PopulationChange::Add(n))
    }

    pub fn remove(&mut self, n: u32) -> ChangeOutcome {
        self.apply(PopulationChange::Remove(n))
    }

    /// Gate-style signed change
    pub fn apply_delta(&mut self, delta: i64) -> ChangeOutcome {
        self.apply(PopulationChange::Delta(delta))
    }

    pub fn apply_multiply(&mut self, ratio: f32) -> ChangeOutcome {
        self.apply(PopulationChange::Multiply(ratio))
    }

    /// Remove one named member without counting it as damage
    pub fn remove_specific(&mut self, entity: Entity) -> bool {
        let Some(store) = self.store.as_mut() else {
            return false;
        };
        store.remove_specific(entity, &mut self.session)
    }

    /// Kill a member on hazard contact. Idempotent.
    pub fn kill_by_hazard(&mut self, entity: Entity) -> bool {
        self.apply(PopulationChange::HazardKill(entity)).delta() != 0
    }

    /// Drop a member out of the world. Idempotent.
    pub fn make_fall(&mut self, entity: Entity) -> bool {
        self.apply(PopulationChange::Fall(entity)).delta() != 0
    }

    /// Obstacle hit taking `n` members from the back. Plays the damage cue
    /// when there is anyone to lose.
    pub fn hit_obstacle(&mut self, n: u32) -> ChangeOutcome {
        if n > 0 && self.len() > 0 {
            self.session.play(Cue::Damage);
        }
        self.apply(PopulationChange::Delta(-(n as i64)))
    }
}
