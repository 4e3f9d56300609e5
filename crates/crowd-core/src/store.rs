//! Population store - the authoritative roster of live agents.
//!
//! Owns the `hecs` world every agent lives in, the ordered live sequence
//! (index = formation slot), the pool of inactive agents and the spawn
//! scheduler. Every structural change recomputes the deformation and, unless
//! told otherwise, runs the game-over check.
//!
//! Agents attached to the crowd carry a [`Member`] component. The live
//! sequence is a cache over that set: [`PopulationStore::count`] repairs it
//! whenever agents were despawned or detached behind the store's back.

use std::collections::{HashSet, VecDeque};

use hecs::{Entity, World};
use serde::{Deserialize, Serialize};

use crowd_logic::config::{AgentTemplate, CrowdConfig};
use crowd_logic::deformation::{compute, Deformation};

use crate::components::{
    Agent, Culled, Falling, LaunchCooldown, Member, Pooled, Pose, Refreshed, Transform, Vertical,
};
use crate::scheduler::SpawnScheduler;
use crate::session::{Cue, SessionContext};

/// Spawn requests are clamped to this many times `scaling.max_crowd_size`
pub const SPAWN_REQUEST_MULTIPLE: usize = 10;

/// Pool bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Agents attached to the crowd
    pub live: usize,
    /// Inactive agents ready for reuse
    pub pooled: usize,
    /// Agents ever created
    pub created: u64,
    /// Spawns served from the pool
    pub recycled: u64,
}

pub struct PopulationStore {
    world: World,
    live: Vec<Entity>,
    pool: VecDeque<Entity>,
    scheduler: SpawnScheduler,
    config: CrowdConfig,
    template: AgentTemplate,
    deformation: Deformation,
    spawn_origin: Pose,
    /// Sim clock in seconds, stamped onto `Refreshed`
    now: f64,
    next_seq: u64,
    created: u64,
    recycled: u64,
    /// Latched once the arbiter has been told about an empty crowd
    depleted: bool,
}

impl PopulationStore {
    /// Create a store and pre-warm its pool
    pub fn new(config: CrowdConfig, template: AgentTemplate, ctx: &mut SessionContext) -> Self {
        let mut store = Self {
            world: World::new(),
            live: Vec::new(),
            pool: VecDeque::new(),
            scheduler: SpawnScheduler::new(&config.spawning),
            deformation: compute(0, &config),
            config,
            template,
            spawn_origin: Pose::default(),
            now: 0.0,
            next_seq: 0,
            created: 0,
            recycled: 0,
            depleted: true,
        };

        let prewarm = store.config.spawning.pool_size as usize;
        for _ in 0..prewarm {
            let entity = store.create_agent(ctx);
            store.pool.push_back(entity);
        }
        log::debug!("Pool pre-warmed with {} agents", prewarm);
        store
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct world access. Anything despawned or detached here is picked
    /// up by the next repair pass.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// World and roster borrowed together for layout systems
    pub fn parts_mut(&mut self) -> (&mut World, &[Entity]) {
        (&mut self.world, &self.live)
    }

    /// Live count as last recorded, without repairing
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Live agents in formation order
    pub fn live(&self) -> &[Entity] {
        &self.live
    }

    /// Live count after a repair pass
    pub fn count(&mut self) -> usize {
        self.repair();
        self.live.len()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.live.contains(&entity)
    }

    pub fn config(&self) -> &CrowdConfig {
        &self.config
    }

    pub fn template(&self) -> &AgentTemplate {
        &self.template
    }

    pub fn deformation(&self) -> Deformation {
        self.deformation
    }

    pub fn scheduler(&self) -> &SpawnScheduler {
        &self.scheduler
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            live: self.live.len(),
            pooled: self.pool.len(),
            created: self.created,
            recycled: self.recycled,
        }
    }

    /// Where new members appear
    pub fn set_spawn_origin(&mut self, origin: Pose) {
        self.spawn_origin = origin;
    }

    pub fn advance_clock(&mut self, dt: f32) {
        self.now += dt.max(0.0) as f64;
    }

    // ── Repair ─────────────────────────────────────────────────────────

    /// Drop stale and duplicate handles, then rebuild from the attached set
    /// if the counts still disagree. Returns whether the roster changed.
    pub fn repair(&mut self) -> bool {
        let before = self.live.len();
        let world = &self.world;
        let mut seen = HashSet::with_capacity(before);
        self.live
            .retain(|&e| world.get::<&Member>(e).is_ok() && seen.insert(e));

        let attached = self.world.query::<&Member>().iter().count();
        let rebuilt = attached != self.live.len();
        if rebuilt {
            let mut members: Vec<(u64, Entity)> = self
                .world
                .query::<&Member>()
                .iter()
                .map(|(e, m)| (m.seq, e))
                .collect();
            members.sort_unstable_by_key(|(seq, _)| *seq);
            self.live = members.into_iter().map(|(_, e)| e).collect();
        }

        let changed = rebuilt || self.live.len() != before;
        if changed {
            log::debug!(
                "Roster repaired: {} -> {} members{}",
                before,
                self.live.len(),
                if rebuilt { " (rebuilt)" } else { "" }
            );
        }
        changed
    }

    /// Periodic repair: also forgets pooled agents that no longer exist
    pub fn force_cleanup(&mut self, ctx: &mut SessionContext) {
        let world = &self.world;
        self.pool.retain(|&e| world.contains(e));
        if self.repair() {
            self.size_changed(ctx, true);
        }
    }

    // ── Spawning ───────────────────────────────────────────────────────

    fn create_agent(&mut self, ctx: &mut SessionContext) -> Entity {
        let transform = Transform::default();
        let entity = self.world.spawn((
            Agent::default(),
            transform,
            Vertical::grounded_at(0.0),
            Pooled,
        ));
        self.created += 1;
        ctx.agents.spawned(entity, &transform);
        ctx.agents.set_active(entity, false);
        entity
    }

    /// Attach one agent to the tail of the formation
    pub fn spawn_one(&mut self, ctx: &mut SessionContext) -> Entity {
        let entity = loop {
            match self.pool.pop_front() {
                Some(e) if self.world.contains(e) => {
                    self.recycled += 1;
                    break e;
                }
                Some(_) => continue,
                None => break self.create_agent(ctx),
            }
        };

        let origin = self.spawn_origin;
        let transform = Transform::new(origin.position, origin.rotation, self.deformation.scale);
        let seq = self.next_seq;
        self.next_seq += 1;

        // Clear everything a previous life may have left behind
        let _ = self.world.remove_one::<Pooled>(entity);
        let _ = self.world.remove_one::<Culled>(entity);
        let _ = self.world.remove_one::<LaunchCooldown>(entity);
        let _ = self.world.remove_one::<Falling>(entity);
        let _ = self.world.insert(
            entity,
            (
                Agent::alive(),
                transform,
                Vertical::grounded_at(origin.position.y),
                Member { seq },
                Refreshed { at: self.now },
            ),
        );

        self.live.push(entity);
        self.depleted = false;
        ctx.agents.set_active(entity, true);
        entity
    }

    /// Request `n` new members. Small requests spawn now, larger ones go
    /// through the scheduler. Returns how many spawned immediately.
    pub fn add(&mut self, n: usize, ctx: &mut SessionContext) -> usize {
        if n == 0 {
            return 0;
        }
        if ctx.is_winning() {
            log::debug!("Spawn of {} ignored during finish sequence", n);
            return 0;
        }

        let limit = self.request_limit();
        if n > limit {
            log::warn!("Spawn request of {} clamped to {}", n, limit);
        }
        let n = n.min(limit);

        let cap = self.config.spawning.max_spawn_per_tick as usize;
        if n <= cap {
            for _ in 0..n {
                self.spawn_one(ctx);
            }
            self.size_changed(ctx, true);
            return n;
        }

        self.scheduler.enqueue(n);
        self.pump(0.0, ctx)
    }

    /// Largest single spawn request, a multiple of the crowd size the
    /// scaling curve is tuned for
    pub fn request_limit(&self) -> usize {
        (self.config.scaling.max_crowd_size as usize).saturating_mul(SPAWN_REQUEST_MULTIPLE)
    }

    /// Advance the spawn scheduler by `dt` and spawn whatever it releases
    pub fn pump(&mut self, dt: f32, ctx: &mut SessionContext) -> usize {
        let step = self.scheduler.step(dt, ctx.is_winning());
        for _ in 0..step.spawn {
            self.spawn_one(ctx);
        }
        if step.finished {
            log::info!("Spawn queue finished at {} members", self.live.len());
        }
        if step.spawn > 0 || step.finished {
            self.size_changed(ctx, true);
        }
        step.spawn
    }

    pub fn stop_spawning(&mut self) {
        self.scheduler.cancel();
    }

    pub fn is_spawning(&self) -> bool {
        !self.scheduler.is_idle()
    }

    // ── Removal ────────────────────────────────────────────────────────

    /// Remove the `n` most recently added members. Returns how many went.
    pub fn remove(&mut self, n: usize, ctx: &mut SessionContext) -> usize {
        let removed = self.remove_tail(n, ctx);
        if removed > 0 {
            self.size_changed(ctx, true);
        }
        removed
    }

    /// Like [`remove`](Self::remove) but never treats an empty crowd as a loss
    pub fn remove_for_finish_drain(&mut self, n: usize, ctx: &mut SessionContext) -> usize {
        let removed = self.remove_tail(n, ctx);
        if removed > 0 {
            self.size_changed(ctx, false);
        }
        removed
    }

    fn remove_tail(&mut self, n: usize, ctx: &mut SessionContext) -> usize {
        self.repair();
        let n = n.min(self.live.len());
        for _ in 0..n {
            if let Some(entity) = self.live.pop() {
                self.release(entity, ctx);
            }
        }
        n
    }

    /// Remove one named member wherever it stands. False if it was not live.
    pub fn remove_specific(&mut self, entity: Entity, ctx: &mut SessionContext) -> bool {
        if !self.detach(entity) {
            return false;
        }
        self.release(entity, ctx);
        self.size_changed(ctx, true);
        true
    }

    fn detach(&mut self, entity: Entity) -> bool {
        match self.live.iter().position(|&e| e == entity) {
            Some(index) => {
                self.live.remove(index);
                let _ = self.world.remove_one::<Member>(entity);
                true
            }
            None => false,
        }
    }

    /// Return an agent to the pool unless it already left on its own
    fn release(&mut self, entity: Entity, ctx: &mut SessionContext) {
        if !self.world.contains(entity) || self.world.get::<&Falling>(entity).is_ok() {
            return;
        }
        let _ = self.world.remove_one::<Member>(entity);
        let _ = self.world.remove_one::<Culled>(entity);
        let _ = self.world.remove_one::<Refreshed>(entity);
        let _ = self.world.remove_one::<LaunchCooldown>(entity);
        let _ = self.world.insert(entity, (Agent::default(), Pooled));
        self.pool.push_back(entity);
        ctx.agents.released(entity);
    }

    /// Return every live member to the pool and destroy any still falling
    pub fn clear_to_pool(&mut self, ctx: &mut SessionContext) {
        self.scheduler.cancel();
        for entity in std::mem::take(&mut self.live) {
            self.release(entity, ctx);
        }

        let falling: Vec<Entity> = self
            .world
            .query::<&Falling>()
            .iter()
            .map(|(e, _)| e)
            .collect();
        for entity in falling {
            if self.world.despawn(entity).is_ok() {
                ctx.agents.destroyed(entity);
            }
        }

        self.depleted = true;
        self.recompute();
    }

    // ── Agent lifecycle ────────────────────────────────────────────────

    fn is_alive(&self, entity: Entity) -> bool {
        self.world
            .get::<&Agent>(entity)
            .map(|agent| agent.alive)
            .unwrap_or(false)
    }

    fn mark_dead(&mut self, entity: Entity) {
        if let Ok(mut agent) = self.world.get::<&mut Agent>(entity) {
            agent.alive = false;
        }
    }

    /// Kill a member on hazard contact. It goes back to the pool.
    /// No-op for dead or unknown agents.
    pub fn kill_by_hazard(&mut self, entity: Entity, ctx: &mut SessionContext) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.mark_dead(entity);
        self.remove_specific(entity, ctx);
        true
    }

    /// Drop a member out of the world. It is destroyed by the falling
    /// system once its delay runs out. No-op for dead or unknown agents.
    pub fn make_fall(&mut self, entity: Entity, ctx: &mut SessionContext) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.mark_dead(entity);
        let _ = self.world.remove_one::<Refreshed>(entity);
        let _ = self.world.insert_one(
            entity,
            Falling {
                remaining: self.template.fall_despawn_delay,
                velocity: 0.0,
            },
        );
        if self.detach(entity) {
            self.size_changed(ctx, true);
        }
        true
    }

    /// Jump with `force`, or the template force when `None`
    pub fn jump(&mut self, entity: Entity, force: Option<f32>, ctx: &mut SessionContext) -> bool {
        let force = force.unwrap_or(self.template.jump_force);
        let Ok((agent, vertical)) = self.world.query_one_mut::<(&Agent, &mut Vertical)>(entity)
        else {
            return false;
        };
        if !vertical.jump(agent.alive, force) {
            return false;
        }
        ctx.play(Cue::Jump);
        true
    }

    /// Launchpad jump. Refused while the agent's cooldown is running.
    pub fn launch(&mut self, entity: Entity, force: Option<f32>, ctx: &mut SessionContext) -> bool {
        if self.world.get::<&LaunchCooldown>(entity).is_ok() {
            return false;
        }
        if !self.jump(entity, force, ctx) {
            return false;
        }
        if self.template.launch_cooldown > 0.0 {
            let _ = self.world.insert_one(
                entity,
                LaunchCooldown {
                    remaining: self.template.launch_cooldown,
                },
            );
        }
        true
    }

    // ── Size change ────────────────────────────────────────────────────

    pub fn recompute(&mut self) {
        self.deformation = compute(self.live.len(), &self.config);
    }

    fn size_changed(&mut self, ctx: &mut SessionContext, check_game_over: bool) {
        self.recompute();
        log::debug!(
            "Crowd size {} (spacing {:.3}x{:.3}, scale {:.3})",
            self.live.len(),
            self.deformation.spacing_x,
            self.deformation.spacing_z,
            self.deformation.scale
        );
        if check_game_over {
            self.check_depleted(ctx);
        }
    }

    /// Tell the arbiter once per transition into an empty crowd.
    /// Suppressed while winning. Returns whether the arbiter was called.
    pub fn check_depleted(&mut self, ctx: &mut SessionContext) -> bool {
        if !self.live.is_empty() {
            self.depleted = false;
            return false;
        }
        if ctx.is_winning() || self.depleted {
            return false;
        }
        self.depleted = true;
        log::info!("Crowd depleted");
        ctx.arbiter.population_depleted();
        true
    }
}

impl std::fmt::Debug for PopulationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopulationStore")
            .field("live", &self.live.len())
            .field("pooled", &self.pool.len())
            .field("deformation", &self.deformation)
            .field("scheduler", &self.scheduler.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::GameOverArbiter;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counter(Rc<Cell<u32>>);

    impl GameOverArbiter for Counter {
        fn population_depleted(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn setup() -> (PopulationStore, SessionContext, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        let mut ctx = SessionContext::headless().with_arbiter(Box::new(Counter(calls.clone())));
        let store = PopulationStore::new(CrowdConfig::default(), AgentTemplate::default(), &mut ctx);
        (store, ctx, calls)
    }

    #[test]
    fn test_pool_prewarmed() {
        let (store, _, _) = setup();
        let stats = store.pool_stats();
        assert_eq!(stats.pooled, 50);
        assert_eq!(stats.created, 50);
        assert_eq!(stats.live, 0);
    }

    #[test]
    fn test_small_add_is_immediate_and_recycles() {
        let (mut store, mut ctx, _) = setup();
        assert_eq!(store.add(5, &mut ctx), 5);
        assert_eq!(store.count(), 5);
        let stats = store.pool_stats();
        assert_eq!(stats.recycled, 5);
        assert_eq!(stats.created, 50);
    }

    #[test]
    fn test_large_add_goes_through_scheduler() {
        let (mut store, mut ctx, _) = setup();
        assert_eq!(store.add(12, &mut ctx), 5);
        assert!(store.is_spawning());
        assert_eq!(store.pump(0.05, &mut ctx), 5);
        assert_eq!(store.pump(0.05, &mut ctx), 2);
        store.pump(0.05, &mut ctx);
        assert!(!store.is_spawning());
        assert_eq!(store.count(), 12);
    }

    #[test]
    fn test_oversized_request_is_clamped() {
        let (mut store, mut ctx, _) = setup();
        let limit = store.request_limit();
        assert_eq!(limit, 2000);
        let now = store.add(usize::MAX, &mut ctx);
        assert_eq!(now + store.scheduler().pending(), limit);
    }

    #[test]
    fn test_spawned_agents_take_current_scale() {
        let (mut store, mut ctx, _) = setup();
        store.add(1, &mut ctx);
        let e = store.live()[0];
        let scale = store.world().get::<&Transform>(e).map(|t| t.scale).unwrap();
        assert_eq!(scale, CrowdConfig::default().scaling.base_scale);
    }

    #[test]
    fn test_remove_is_lifo_and_clamped() {
        let (mut store, mut ctx, _) = setup();
        store.add(4, &mut ctx);
        let first = store.live()[0];
        assert_eq!(store.remove(3, &mut ctx), 3);
        assert_eq!(store.live(), &[first]);
        assert_eq!(store.remove(10, &mut ctx), 1);
        assert_eq!(store.remove(10, &mut ctx), 0);
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_removed_agents_return_to_pool() {
        let (mut store, mut ctx, _) = setup();
        store.add(3, &mut ctx);
        let e = store.live()[2];
        store.remove(1, &mut ctx);
        assert!(store.world().get::<&Pooled>(e).is_ok());
        assert!(store.world().get::<&Member>(e).is_err());
        assert_eq!(store.pool_stats().pooled, 48);
    }

    #[test]
    fn test_depletion_reported_once_per_transition() {
        let (mut store, mut ctx, calls) = setup();
        store.add(2, &mut ctx);
        store.remove(2, &mut ctx);
        assert_eq!(calls.get(), 1);
        store.remove(1, &mut ctx);
        store.check_depleted(&mut ctx);
        assert_eq!(calls.get(), 1);

        store.add(1, &mut ctx);
        store.remove(1, &mut ctx);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_empty_start_is_not_game_over() {
        let (mut store, mut ctx, calls) = setup();
        assert!(!store.check_depleted(&mut ctx));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_finish_drain_skips_game_over() {
        let (mut store, mut ctx, calls) = setup();
        store.add(3, &mut ctx);
        assert_eq!(store.remove_for_finish_drain(3, &mut ctx), 3);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_winning_suppresses_game_over_and_spawns() {
        let (mut store, mut ctx, calls) = setup();
        store.add(2, &mut ctx);
        ctx.set_winning(true);
        assert_eq!(store.add(3, &mut ctx), 0);
        store.remove(2, &mut ctx);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_remove_specific_is_idempotent() {
        let (mut store, mut ctx, _) = setup();
        store.add(3, &mut ctx);
        let middle = store.live()[1];
        assert!(store.remove_specific(middle, &mut ctx));
        assert!(!store.remove_specific(middle, &mut ctx));
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_kill_twice_decrements_once() {
        let (mut store, mut ctx, _) = setup();
        store.add(3, &mut ctx);
        let e = store.live()[0];
        assert!(store.kill_by_hazard(e, &mut ctx));
        assert!(!store.kill_by_hazard(e, &mut ctx));
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_fall_detaches_without_pooling() {
        let (mut store, mut ctx, _) = setup();
        store.add(2, &mut ctx);
        let e = store.live()[0];
        assert!(store.make_fall(e, &mut ctx));
        assert!(!store.make_fall(e, &mut ctx));
        assert!(!store.kill_by_hazard(e, &mut ctx));
        assert_eq!(store.count(), 1);
        assert!(store.world().get::<&Falling>(e).is_ok());
        assert!(store.world().get::<&Pooled>(e).is_err());
    }

    #[test]
    fn test_repair_after_external_despawn() {
        let (mut store, mut ctx, _) = setup();
        store.add(4, &mut ctx);
        let e = store.live()[1];
        store.world_mut().despawn(e).unwrap();
        assert_eq!(store.len(), 4);
        assert_eq!(store.count(), 3);
        assert!(!store.contains(e));
    }

    #[test]
    fn test_repair_rebuilds_in_spawn_order() {
        let (mut store, mut ctx, _) = setup();
        store.add(3, &mut ctx);
        let order = store.live().to_vec();
        // Detach the middle agent's membership marker externally
        store.world_mut().remove_one::<Member>(order[1]).unwrap();
        assert!(store.repair());
        assert_eq!(store.live(), &[order[0], order[2]]);
    }

    #[test]
    fn test_stale_pool_entries_are_skipped() {
        let mut ctx = SessionContext::headless();
        let mut config = CrowdConfig::default();
        config.spawning.pool_size = 2;
        let mut store = PopulationStore::new(config, AgentTemplate::default(), &mut ctx);
        let stale: Vec<Entity> = store
            .world()
            .query::<&Pooled>()
            .iter()
            .map(|(e, _)| e)
            .collect();
        for e in stale {
            store.world_mut().despawn(e).unwrap();
        }
        store.add(1, &mut ctx);
        assert_eq!(store.count(), 1);
        assert_eq!(store.pool_stats().created, 3);
    }

    #[test]
    fn test_jump_needs_living_grounded_agent() {
        let (mut store, mut ctx, _) = setup();
        store.add(1, &mut ctx);
        let e = store.live()[0];
        assert!(store.jump(e, None, &mut ctx));
        assert!(!store.jump(e, None, &mut ctx));
        let velocity = store.world().get::<&Vertical>(e).map(|v| v.velocity).unwrap();
        assert_eq!(velocity, AgentTemplate::default().jump_force);
    }

    #[test]
    fn test_launch_cooldown_blocks_relaunch() {
        let (mut store, mut ctx, _) = setup();
        store.add(1, &mut ctx);
        let e = store.live()[0];
        assert!(store.launch(e, Some(15.0), &mut ctx));
        // Land it by hand; cooldown still blocks
        store.world_mut().get::<&mut Vertical>(e).unwrap().grounded = true;
        assert!(!store.launch(e, Some(15.0), &mut ctx));
    }

    #[test]
    fn test_clear_to_pool_resets_everything() {
        let (mut store, mut ctx, calls) = setup();
        store.add(20, &mut ctx);
        let faller = store.live()[0];
        store.make_fall(faller, &mut ctx);
        store.clear_to_pool(&mut ctx);
        assert_eq!(store.count(), 0);
        assert!(!store.is_spawning());
        assert!(!store.world().contains(faller));
        store.check_depleted(&mut ctx);
        assert_eq!(calls.get(), 0);
    }
}
