//! Spawn scheduler - spreads large spawn requests over several ticks.
//!
//! A resumable state machine driven by the tick: `Idle -> Draining -> Idle`.
//! While draining it hands out at most `max_spawn_per_tick` agents per step
//! and then waits `batch_delay` seconds of real time before the next
//! sub-batch. The wait is stored as data, not as suspended control flow.

use std::collections::VecDeque;

use crowd_logic::config::SpawnConfig;
use serde::{Deserialize, Serialize};

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SchedulerState {
    Idle,
    Draining {
        /// Agents left in the batch being worked on
        batch_remaining: usize,
        /// Seconds until the next sub-batch may spawn
        cooldown: f32,
    },
}

/// What the store should do after one scheduler step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpawnStep {
    /// Agents to spawn now
    pub spawn: usize,
    /// The queue ran dry this step
    pub finished: bool,
    /// The win flag stopped the scheduler this step
    pub halted: bool,
}

/// Batches pending spawn requests
#[derive(Debug, Clone)]
pub struct SpawnScheduler {
    queue: VecDeque<usize>,
    state: SchedulerState,
    max_per_step: usize,
    batch_delay: f32,
}

impl SpawnScheduler {
    pub fn new(config: &SpawnConfig) -> Self {
        Self {
            queue: VecDeque::new(),
            state: SchedulerState::Idle,
            max_per_step: config.max_spawn_per_tick.max(1) as usize,
            batch_delay: config.batch_delay.max(0.0),
        }
    }

    /// Queue a request for `amount` agents
    pub fn enqueue(&mut self, amount: usize) {
        if amount == 0 {
            return;
        }
        self.queue.push_back(amount);
        if self.state == SchedulerState::Idle {
            log::info!(
                "Spawn queue started: {} agents in batches of {}",
                amount,
                self.max_per_step
            );
            self.state = SchedulerState::Draining {
                batch_remaining: 0,
                cooldown: 0.0,
            };
        }
    }

    /// Advance by `dt` seconds. Checks `winning` before doing anything.
    pub fn step(&mut self, dt: f32, winning: bool) -> SpawnStep {
        let SchedulerState::Draining {
            mut batch_remaining,
            mut cooldown,
        } = self.state
        else {
            return SpawnStep::default();
        };

        if winning {
            log::info!(
                "Spawn queue halted by finish line, {} agents abandoned",
                self.pending()
            );
            self.queue.clear();
            self.state = SchedulerState::Idle;
            return SpawnStep {
                halted: true,
                ..Default::default()
            };
        }

        cooldown -= dt;
        if cooldown > 0.0 {
            self.state = SchedulerState::Draining {
                batch_remaining,
                cooldown,
            };
            return SpawnStep::default();
        }

        if batch_remaining == 0 {
            match self.queue.pop_front() {
                Some(amount) => batch_remaining = amount,
                None => {
                    self.state = SchedulerState::Idle;
                    return SpawnStep {
                        finished: true,
                        ..Default::default()
                    };
                }
            }
        }

        let spawn = batch_remaining.min(self.max_per_step);
        batch_remaining -= spawn;
        self.state = SchedulerState::Draining {
            batch_remaining,
            cooldown: self.batch_delay,
        };

        SpawnStep {
            spawn,
            ..Default::default()
        }
    }

    /// Drop every pending request and go idle, mid-batch or not
    pub fn cancel(&mut self) {
        if !self.is_idle() {
            log::info!("Spawn queue cancelled, {} agents dropped", self.pending());
        }
        self.queue.clear();
        self.state = SchedulerState::Idle;
    }

    pub fn is_idle(&self) -> bool {
        self.state == SchedulerState::Idle
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Agents requested but not yet spawned
    pub fn pending(&self) -> usize {
        let in_flight = match self.state {
            SchedulerState::Draining {
                batch_remaining, ..
            } => batch_remaining,
            SchedulerState::Idle => 0,
        };
        self.queue
            .iter()
            .fold(in_flight, |total, &amount| total.saturating_add(amount))
    }
}
