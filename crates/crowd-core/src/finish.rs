//! Finish-line drain - empties the crowd after the leader crosses the line.
//!
//! `Inactive -> Draining -> Celebrating -> Complete`. Each tick while
//! draining it asks for `ceil(reduction_speed * dt)` removals; once the
//! crowd is empty it holds for `celebrate_delay` seconds, then reports
//! completion exactly once.

use crowd_logic::config::FinishConfig;
use serde::{Deserialize, Serialize};

/// Drain phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FinishPhase {
    Inactive,
    Draining,
    Celebrating { remaining: f32 },
    Complete,
}

/// What the engine should do after one drain step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinishStep {
    /// Members to remove this tick
    pub remove: usize,
    /// The hold elapsed this tick
    pub completed: bool,
}

#[derive(Debug, Clone)]
pub struct FinishDrain {
    phase: FinishPhase,
    reduction_speed: f32,
    celebrate_delay: f32,
}

impl FinishDrain {
    pub fn new(config: &FinishConfig) -> Self {
        Self {
            phase: FinishPhase::Inactive,
            reduction_speed: config.reduction_speed,
            celebrate_delay: config.celebrate_delay.max(0.0),
        }
    }

    /// Begin draining. Ignored unless inactive.
    pub fn start(&mut self) -> bool {
        if self.phase != FinishPhase::Inactive {
            return false;
        }
        self.phase = FinishPhase::Draining;
        true
    }

    /// Stop without reporting completion
    pub fn cancel(&mut self) {
        if matches!(
            self.phase,
            FinishPhase::Draining | FinishPhase::Celebrating { .. }
        ) {
            log::info!("Finish drain cancelled");
        }
        self.phase = FinishPhase::Inactive;
    }

    pub fn reset(&mut self) {
        self.phase = FinishPhase::Inactive;
    }

    pub fn phase(&self) -> FinishPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.phase,
            FinishPhase::Draining | FinishPhase::Celebrating { .. }
        )
    }

    /// Advance by `dt` seconds with `count` members left
    pub fn step(&mut self, dt: f32, count: usize) -> FinishStep {
        match self.phase {
            FinishPhase::Inactive | FinishPhase::Complete => FinishStep::default(),
            FinishPhase::Draining => {
                if count == 0 {
                    log::info!("Finish drain emptied the crowd");
                    self.phase = FinishPhase::Celebrating {
                        remaining: self.celebrate_delay,
                    };
                    // A zero hold completes on this same step
                    return self.step(0.0, 0);
                }
                let per_tick = (self.reduction_speed * dt).ceil().max(0.0) as usize;
                FinishStep {
                    remove: per_tick.min(count),
                    completed: false,
                }
            }
            FinishPhase::Celebrating { remaining } => {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    self.phase = FinishPhase::Celebrating { remaining };
                    return FinishStep::default();
                }
                log::info!("Finish sequence complete");
                self.phase = FinishPhase::Complete;
                FinishStep {
                    remove: 0,
                    completed: true,
                }
            }
        }
    }
}
