//! Gameplay triggers - gates, hordes, walls and hazards that resize the crowd.
//!
//! Each trigger is plain data owned by the level layer. Passing one goes
//! through the engine so the change lands on the store exactly once.

use hecs::Entity;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crowd_logic::config::ObstacleConfig;
use crowd_logic::gates::{label, population_delta, value_range, GateOp, ROLLED_OPS};

use crate::engine::CrowdEngine;
use crate::protocol::{ChangeOutcome, PopulationChange};
use crate::session::Cue;

/// One arithmetic gate. Works once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub op: GateOp,
    pub value: f32,
    consumed: bool,
}

impl Gate {
    pub fn new(op: GateOp, value: f32) -> Self {
        Self {
            op,
            value,
            consumed: false,
        }
    }

    /// Fresh add or multiply gate sized for a crowd of `crowd_count`
    pub fn roll<R: Rng>(rng: &mut R, crowd_count: usize) -> Self {
        let op = ROLLED_OPS.choose(rng).copied().unwrap_or(GateOp::Add);
        let value = rng.gen_range(value_range(op, crowd_count)) as f32;
        Self::new(op, value)
    }

    /// Re-roll the value for the current crowd. Used gates keep theirs.
    pub fn refresh<R: Rng>(&mut self, rng: &mut R, crowd_count: usize) {
        if self.consumed {
            return;
        }
        self.value = rng.gen_range(value_range(self.op, crowd_count)) as f32;
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Signed change this gate would make to a crowd of `count`
    pub fn delta(&self, count: usize) -> i64 {
        population_delta(self.op, self.value, count)
    }

    pub fn label(&self) -> String {
        label(self.op, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateSide {
    Left,
    Right,
}

/// Two gates side by side. Only the first one hit counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GatePair {
    pub left: Gate,
    pub right: Gate,
    chosen: Option<GateSide>,
}

impl GatePair {
    pub fn new(left: Gate, right: Gate) -> Self {
        Self {
            left,
            right,
            chosen: None,
        }
    }

    pub fn chosen(&self) -> Option<GateSide> {
        self.chosen
    }

    pub fn gate_mut(&mut self, side: GateSide) -> &mut Gate {
        match side {
            GateSide::Left => &mut self.left,
            GateSide::Right => &mut self.right,
        }
    }
}

/// Re-rolls unused gates when the crowd has changed a lot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateProofing {
    /// Seconds between checks
    pub interval: f32,
    /// Minimum change in crowd size that triggers a re-roll
    pub change_threshold: usize,
    elapsed: f32,
    last_count: usize,
}

impl Default for GateProofing {
    fn default() -> Self {
        Self::new(2.0, 20, 0)
    }
}

impl GateProofing {
    pub fn new(interval: f32, change_threshold: usize, count: usize) -> Self {
        Self {
            interval,
            change_threshold,
            elapsed: 0.0,
            last_count: count,
        }
    }

    /// Advance by `dt`. Returns how many gates were re-rolled.
    pub fn update<R: Rng>(&mut self, dt: f32, count: usize, gates: &mut [Gate], rng: &mut R) -> usize {
        self.elapsed += dt;
        if self.elapsed < self.interval {
            return 0;
        }
        self.elapsed = 0.0;

        if count.abs_diff(self.last_count) < self.change_threshold {
            return 0;
        }
        log::debug!(
            "Crowd moved from {} to {}, re-rolling gates",
            self.last_count,
            count
        );
        self.last_count = count;

        let mut refreshed = 0;
        for gate in gates.iter_mut().filter(|g| !g.is_consumed()) {
            gate.refresh(rng, count);
            refreshed += 1;
        }
        refreshed
    }
}

/// Enemy group that takes a fixed bite out of the crowd. Works once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutantHorde {
    pub amount: u32,
    engaged: bool,
}

impl MutantHorde {
    pub fn new(amount: u32) -> Self {
        Self {
            amount,
            engaged: false,
        }
    }

    /// Horde sized somewhere in `min..=max`
    pub fn roll<R: Rng>(rng: &mut R, min: u32, max: u32) -> Self {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        Self::new(rng.gen_range(lo..=hi))
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    pub fn label(&self) -> String {
        format!("-{}", self.amount)
    }
}

/// Wall that breaks after enough members run into it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestructibleWall {
    pub hits_required: u32,
    hits: u32,
    destroyed: bool,
}

impl DestructibleWall {
    pub fn new(hits_required: u32) -> Self {
        Self {
            hits_required,
            hits: 0,
            destroyed: false,
        }
    }

    /// Register one hit. Returns true on the hit that breaks the wall.
    pub fn take_hit(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        self.hits += 1;
        if self.hits >= self.hits_required {
            self.destroyed = true;
            log::debug!("Wall destroyed after {} hits", self.hits);
            return true;
        }
        false
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

/// How an obstacle hurts the members touching it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageMode {
    /// One hit when a member first touches it
    OnEnter,
    /// Repeated hits at `damage_per_second` while contact lasts
    PerSecond,
}

/// Spikes, saws or a wall, with its own contact timing.
///
/// The obstacle keeps its own clock: call [`Obstacle::advance`] once per
/// frame, then report contacts through [`CrowdEngine::obstacle_enter`] and
/// [`CrowdEngine::obstacle_stay`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub mode: DamageMode,
    /// Hits per second in `PerSecond` mode
    pub damage_per_second: f32,
    /// Seconds between damage cues
    pub cue_cooldown: f32,
    /// Members taken from the back per hit. Zero kills only the member
    /// that touched it.
    pub bite: u32,
    /// Hits survived before breaking. With no limit a biting obstacle goes
    /// down on its first hit and any other one never breaks.
    pub hits_to_destroy: Option<u32>,
    hits: u32,
    clock: f32,
    last_hit: Option<f32>,
    last_cue: Option<f32>,
    active: bool,
}

impl Obstacle {
    pub fn new(mode: DamageMode, config: &ObstacleConfig) -> Self {
        Self {
            mode,
            damage_per_second: config.damage_per_second,
            cue_cooldown: config.damage_cue_cooldown,
            bite: 0,
            hits_to_destroy: None,
            hits: 0,
            clock: 0.0,
            last_hit: None,
            last_cue: None,
            active: true,
        }
    }

    /// Wall that takes `config.wall_bite` members per hit
    pub fn wall(config: &ObstacleConfig) -> Self {
        Self {
            bite: config.wall_bite,
            ..Self::new(DamageMode::OnEnter, config)
        }
    }

    pub fn breaks_after(mut self, hits: u32) -> Self {
        self.hits_to_destroy = Some(hits);
        self
    }

    pub fn advance(&mut self, dt: f32) {
        self.clock += dt.max(0.0);
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    fn damage_due(&mut self) -> bool {
        let interval = 1.0 / self.damage_per_second.max(1e-4);
        Self::stamp(&mut self.last_hit, self.clock, interval)
    }

    fn cue_due(&mut self) -> bool {
        Self::stamp(&mut self.last_cue, self.clock, self.cue_cooldown)
    }

    /// True and restamped once `interval` has passed since `last`
    fn stamp(last: &mut Option<f32>, now: f32, interval: f32) -> bool {
        if last.is_some_and(|at| now - at < interval) {
            return false;
        }
        *last = Some(now);
        true
    }

    fn register_hit(&mut self) {
        self.hits += 1;
        let breaks = match self.hits_to_destroy {
            Some(limit) => self.hits > limit,
            None => self.bite > 0,
        };
        if breaks {
            self.active = false;
            log::debug!("Obstacle down after {} hits", self.hits);
        }
    }
}

/// What a member ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HazardKind {
    /// Hole in the track; the member falls out
    Gap,
    /// Water; the member falls out
    Water,
    /// Spikes, saws and the like
    Obstacle,
    /// A wall; takes a bite out of the back of the crowd and chips at
    /// the wall
    Wall,
}

impl CrowdEngine {
    /// Pass through a gate. Plays the gate cue, applies the gate once and
    /// consumes it. Used gates do nothing.
    pub fn pass_gate(&mut self, gate: &mut Gate) -> ChangeOutcome {
        if gate.consumed || !self.is_enabled() {
            return ChangeOutcome::default();
        }
        gate.consumed = true;
        self.session.play(Cue::GateMultiply);
        let count = self.count();
        let delta = gate.delta(count);
        log::debug!("Gate {} at {} members: {:+}", gate.label(), count, delta);
        self.apply(PopulationChange::Delta(delta))
    }

    /// Pass one side of a pair. The other side is disabled for good.
    pub fn pass_gate_pair(&mut self, pair: &mut GatePair, side: GateSide) -> ChangeOutcome {
        if pair.chosen.is_some() || !self.is_enabled() {
            return ChangeOutcome::default();
        }
        pair.chosen = Some(side);
        let other = match side {
            GateSide::Left => GateSide::Right,
            GateSide::Right => GateSide::Left,
        };
        pair.gate_mut(other).consumed = true;
        self.pass_gate(pair.gate_mut(side))
    }

    /// Let a horde take its bite. Works once per horde.
    pub fn engage_horde(&mut self, horde: &mut MutantHorde) -> ChangeOutcome {
        if horde.engaged || !self.is_enabled() {
            return ChangeOutcome::default();
        }
        horde.engaged = true;
        self.apply(PopulationChange::HordeDamage(horde.amount))
    }

    /// A member touched a hazard. Ignored for dead members, broken walls
    /// and during the finish sequence. Returns whether anyone was lost.
    pub fn hazard_contact(
        &mut self,
        entity: Entity,
        kind: HazardKind,
        wall: Option<&mut DestructibleWall>,
    ) -> bool {
        if self.is_winning() || !self.is_alive(entity) {
            return false;
        }
        if wall.as_ref().is_some_and(|w| w.is_destroyed()) {
            return false;
        }
        self.play_hazard_cue();
        match kind {
            HazardKind::Gap | HazardKind::Water => self.make_fall(entity),
            HazardKind::Obstacle => self.kill_by_hazard(entity),
            HazardKind::Wall => {
                if let Some(wall) = wall {
                    wall.take_hit();
                }
                match self.config().obstacles.wall_bite {
                    0 => self.kill_by_hazard(entity),
                    bite => self.apply(PopulationChange::Delta(-(bite as i64))).delta() != 0,
                }
            }
        }
    }

    /// Damage cue for hazard contacts, at most once per cue cooldown
    fn play_hazard_cue(&mut self) {
        let Some(now) = self.store.as_ref().map(|store| store.now()) else {
            return;
        };
        let cooldown = self.config().obstacles.damage_cue_cooldown as f64;
        if self.last_hazard_cue.is_some_and(|at| now - at < cooldown) {
            return;
        }
        self.last_hazard_cue = Some(now);
        self.session.play(Cue::Damage);
    }

    /// A member touched `obstacle`. `OnEnter` obstacles hit now. Returns
    /// how many members were lost.
    pub fn obstacle_enter(&mut self, obstacle: &mut Obstacle, entity: Entity) -> usize {
        if obstacle.mode != DamageMode::OnEnter {
            return 0;
        }
        self.strike(obstacle, entity)
    }

    /// A member is still touching `obstacle`. `PerSecond` obstacles hit at
    /// their rate. Returns how many members were lost.
    pub fn obstacle_stay(&mut self, obstacle: &mut Obstacle, entity: Entity) -> usize {
        if obstacle.mode != DamageMode::PerSecond || !self.can_strike(obstacle, entity) {
            return 0;
        }
        if !obstacle.damage_due() {
            return 0;
        }
        self.strike(obstacle, entity)
    }

    fn can_strike(&self, obstacle: &Obstacle, entity: Entity) -> bool {
        obstacle.active && !self.is_winning() && self.is_alive(entity)
    }

    fn strike(&mut self, obstacle: &mut Obstacle, entity: Entity) -> usize {
        if !self.can_strike(obstacle, entity) {
            return 0;
        }
        if obstacle.cue_due() {
            self.session.play(Cue::Damage);
        }
        obstacle.register_hit();
        if obstacle.bite == 0 {
            return usize::from(self.kill_by_hazard(entity));
        }
        let outcome = self.apply(PopulationChange::Delta(-(obstacle.bite as i64)));
        outcome.before.saturating_sub(outcome.after)
    }

    /// Advance gate proofing against the current crowd size
    pub fn refresh_gates<R: Rng>(
        &mut self,
        proofing: &mut GateProofing,
        gates: &mut [Gate],
        dt: f32,
        rng: &mut R,
    ) -> usize {
        let count = self.count();
        proofing.update(dt, count, gates, rng)
    }
}
