//! Scenario tests driving the full engine tick by tick.
//!
//! Each test plays out a short piece of a level: gates, hazards, the finish
//! line, and checks the crowd and the collaborator calls it produced.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crowd_core::finish::FinishPhase;
use crowd_core::prelude::*;
use hecs::Entity;

const DT: f32 = 1.0 / 60.0;

// ── Collaborators ──────────────────────────────────────────────────────

#[derive(Default, Clone)]
struct Calls {
    depleted: Rc<Cell<u32>>,
    finished: Rc<Cell<u32>>,
    destroyed: Rc<Cell<u32>>,
    cues: Rc<RefCell<Vec<Cue>>>,
}

struct Arbiter(Calls);

impl GameOverArbiter for Arbiter {
    fn population_depleted(&mut self) {
        self.0.depleted.set(self.0.depleted.get() + 1);
    }

    fn finish_sequence_complete(&mut self) {
        self.0.finished.set(self.0.finished.get() + 1);
    }
}

struct Agents(Calls);

impl AgentSink for Agents {
    fn destroyed(&mut self, _agent: Entity) {
        self.0.destroyed.set(self.0.destroyed.get() + 1);
    }
}

struct Audio(Calls);

impl CueSink for Audio {
    fn play(&mut self, cue: Cue) {
        self.0.cues.borrow_mut().push(cue);
    }
}

fn engine() -> (CrowdEngine, Calls) {
    let calls = Calls::default();
    let session = SessionContext::headless()
        .with_arbiter(Box::new(Arbiter(calls.clone())))
        .with_agents(Box::new(Agents(calls.clone())))
        .with_cues(Box::new(Audio(calls.clone())));
    let engine = CrowdEngine::new(CrowdConfig::default(), Some(AgentTemplate::default()), session);
    (engine, calls)
}

/// Tick until the spawn queue is empty
fn settle(engine: &mut CrowdEngine) {
    for _ in 0..2000 {
        if engine.pending_spawns() == 0 {
            break;
        }
        engine.tick(DT, Pose::default());
    }
    engine.tick(DT, Pose::default());
}

fn position(engine: &CrowdEngine, e: Entity) -> Vec3 {
    engine.world().unwrap().get::<&Transform>(e).unwrap().position
}

// ── Gates ──────────────────────────────────────────────────────────────

#[test]
fn gate_chain_from_initial_spawn() {
    let (mut engine, calls) = engine();
    engine.begin_session();
    assert_eq!(engine.count(), 1);

    engine.pass_gate(&mut Gate::new(GateOp::Add, 5.0));
    assert_eq!(engine.count(), 6);

    // +6 is over the per-tick cap, so one sub-batch lands now
    engine.pass_gate(&mut Gate::new(GateOp::Multiply, 2.0));
    assert_eq!(engine.count(), 11);
    settle(&mut engine);
    assert_eq!(engine.count(), 12);

    assert_eq!(
        *calls.cues.borrow(),
        vec![Cue::GateMultiply, Cue::GateMultiply]
    );
}

#[test]
fn huge_multiplier_is_clamped() {
    let (mut engine, _) = engine();
    engine.add(3);
    for _ in 0..3 {
        engine.apply_multiply(f32::MAX);
    }
    let limit = engine.store().unwrap().request_limit();
    assert!(engine.count() + engine.pending_spawns() <= 3 + 3 * limit);
    engine.tick(DT, Pose::default());
}

#[test]
fn used_gate_does_nothing() {
    let (mut engine, _) = engine();
    engine.begin_session();
    let mut gate = Gate::new(GateOp::Add, 3.0);
    engine.pass_gate(&mut gate);
    engine.pass_gate(&mut gate);
    assert_eq!(engine.count(), 4);
}

#[test]
fn gate_pair_only_applies_first_side() {
    let (mut engine, _) = engine();
    engine.begin_session();
    let mut pair = GatePair::new(Gate::new(GateOp::Add, 4.0), Gate::new(GateOp::Multiply, 3.0));
    engine.pass_gate_pair(&mut pair, GateSide::Left);
    engine.pass_gate_pair(&mut pair, GateSide::Right);
    assert_eq!(engine.count(), 5);
    assert_eq!(pair.chosen(), Some(GateSide::Left));
    assert!(pair.right.is_consumed());
}

#[test]
fn subtract_gate_counts_as_damage() {
    let (mut engine, _) = engine();
    engine.add(5);
    engine.pass_gate(&mut Gate::new(GateOp::Subtract, 3.0));
    assert_eq!(engine.count(), 2);
    assert_eq!(engine.damage_taken(), 3);
}

// ── Store properties ───────────────────────────────────────────────────

#[test]
fn remove_then_count() {
    let (mut engine, _) = engine();
    engine.add(20);
    settle(&mut engine);
    assert_eq!(engine.count(), 20);

    engine.remove(7);
    assert_eq!(engine.count(), 13);
    engine.remove(50);
    assert_eq!(engine.count(), 0);
}

#[test]
fn add_then_remove_restores_count() {
    let (mut engine, _) = engine();
    engine.add(3);
    engine.add(4);
    engine.remove(4);
    assert_eq!(engine.count(), 3);
}

#[test]
fn kill_by_hazard_twice_counts_once() {
    let (mut engine, _) = engine();
    engine.add(5);
    let victim = engine.live()[2];
    assert!(engine.kill_by_hazard(victim));
    assert!(!engine.kill_by_hazard(victim));
    assert_eq!(engine.count(), 4);
    assert_eq!(engine.damage_taken(), 1);
}

#[test]
fn external_despawn_is_repaired() {
    let (mut engine, calls) = engine();
    engine.add(3);
    for e in engine.live().to_vec() {
        engine.world_mut().unwrap().despawn(e).unwrap();
    }
    assert_eq!(engine.len(), 3);

    // The periodic repair notices the empty crowd and ends the game once
    for _ in 0..120 {
        engine.tick(DT, Pose::default());
    }
    assert_eq!(engine.count(), 0);
    assert_eq!(calls.depleted.get(), 1);
}

// ── Game over ──────────────────────────────────────────────────────────

#[test]
fn game_over_called_once_per_wipe() {
    let (mut engine, calls) = engine();
    engine.add(4);
    engine.hit_obstacle(10);
    for _ in 0..10 {
        engine.tick(DT, Pose::default());
    }
    assert_eq!(calls.depleted.get(), 1);

    engine.add(1);
    engine.engage_horde(&mut MutantHorde::new(3));
    assert_eq!(calls.depleted.get(), 2);
}

#[test]
fn horde_plays_damage_and_works_once() {
    let (mut engine, calls) = engine();
    engine.add(5);
    let mut horde = MutantHorde::new(2);
    engine.engage_horde(&mut horde);
    engine.engage_horde(&mut horde);
    assert_eq!(engine.count(), 3);
    assert_eq!(*calls.cues.borrow(), vec![Cue::Damage]);
}

// ── Layout ─────────────────────────────────────────────────────────────

#[test]
fn large_crowd_uses_bounded_degraded_layout() {
    let (mut engine, _) = engine();
    engine.add(150);
    settle(&mut engine);
    assert_eq!(engine.count(), 150);

    for _ in 0..5 {
        let stats = engine.tick(DT, Pose::default());
        assert_eq!(engine.layout_mode(), LayoutMode::Degraded);
        assert!(stats.refreshed <= engine.config().performance.members_per_tick as usize);
        assert!(stats.visited() <= engine.config().performance.members_per_tick as usize);
    }
}

#[test]
fn airborne_member_is_left_alone() {
    let (mut engine, calls) = engine();
    engine.add(5);
    for _ in 0..30 {
        engine.tick(DT, Pose::default());
    }

    let jumper = engine.live()[0];
    let start = position(&engine, jumper);
    assert!(engine.jump(jumper, None));
    assert!(!engine.jump(jumper, None));

    // Leader moves away while the member is in the air
    let leader = Pose::at(Vec3::new(3.0, 0.0, 5.0));
    for _ in 0..10 {
        engine.tick(DT, leader);
        let now = position(&engine, jumper);
        assert_eq!((now.x, now.z), (start.x, start.z));
    }

    // Flight is one second; after landing it heads for its slot
    for _ in 0..60 {
        engine.tick(DT, leader);
    }
    let after = position(&engine, jumper);
    assert!(after.distance(&leader.position) < start.distance(&leader.position));
    assert_eq!(calls.cues.borrow().as_slice(), &[Cue::Jump]);
}

// ── Hazards ────────────────────────────────────────────────────────────

#[test]
fn gap_drops_member_and_destroys_it_later() {
    let (mut engine, calls) = engine();
    engine.add(3);
    let victim = engine.live()[1];
    assert!(engine.hazard_contact(victim, HazardKind::Gap, None));
    assert!(!engine.hazard_contact(victim, HazardKind::Gap, None));
    assert_eq!(engine.count(), 2);

    // Fall delay is two seconds
    for _ in 0..100 {
        engine.tick(DT, Pose::default());
    }
    assert_eq!(calls.destroyed.get(), 0);
    for _ in 0..30 {
        engine.tick(DT, Pose::default());
    }
    assert_eq!(calls.destroyed.get(), 1);
    assert!(!engine.world().unwrap().contains(victim));
}

#[test]
fn wall_takes_a_bite_until_it_breaks() {
    let (mut engine, calls) = engine();
    engine.add(12);
    settle(&mut engine);
    let mut wall = DestructibleWall::new(2);
    for _ in 0..3 {
        let e = engine.live()[0];
        engine.hazard_contact(e, HazardKind::Wall, Some(&mut wall));
    }
    assert!(wall.is_destroyed());
    assert_eq!(wall.hits(), 2);
    assert_eq!(engine.count(), 2);
    assert_eq!(engine.damage_taken(), 10);
    assert_eq!(*calls.cues.borrow(), vec![Cue::Damage]);
}

#[test]
fn hazard_cues_are_throttled() {
    let (mut engine, calls) = engine();
    engine.add(5);
    for e in engine.live()[..3].to_vec() {
        assert!(engine.hazard_contact(e, HazardKind::Obstacle, None));
    }
    assert_eq!(calls.cues.borrow().len(), 1);

    for _ in 0..20 {
        engine.tick(DT, Pose::default());
    }
    let e = engine.live()[0];
    engine.hazard_contact(e, HazardKind::Obstacle, None);
    assert_eq!(*calls.cues.borrow(), vec![Cue::Damage, Cue::Damage]);
}

#[test]
fn obstacle_hit_plays_damage() {
    let (mut engine, calls) = engine();
    engine.add(5);
    engine.hit_obstacle(2);
    assert_eq!(engine.count(), 3);
    engine.hit_obstacle(0);
    assert_eq!(*calls.cues.borrow(), vec![Cue::Damage]);
}

#[test]
fn row_of_spikes_plays_one_cue() {
    let (mut engine, calls) = engine();
    engine.add(50);
    settle(&mut engine);
    let mut spikes = Obstacle::new(DamageMode::OnEnter, &engine.config().obstacles);

    let lost: usize = engine
        .live()
        .to_vec()
        .into_iter()
        .map(|e| engine.obstacle_enter(&mut spikes, e))
        .sum();
    assert_eq!(lost, 50);
    assert_eq!(engine.count(), 0);
    assert_eq!(*calls.cues.borrow(), vec![Cue::Damage]);
    assert_eq!(calls.depleted.get(), 1);
}

#[test]
fn saw_kills_at_its_rate_while_touched() {
    let (mut engine, calls) = engine();
    engine.add(20);
    settle(&mut engine);
    let mut saw = Obstacle::new(DamageMode::PerSecond, &engine.config().obstacles);

    let mut lost = 0;
    for _ in 0..60 {
        saw.advance(DT);
        let e = engine.live()[0];
        assert_eq!(engine.obstacle_enter(&mut saw, e), 0);
        lost += engine.obstacle_stay(&mut saw, e);
        engine.tick(DT, Pose::default());
    }

    // Five kills a second, cue at most every 0.3s
    assert_eq!(lost, 5);
    assert_eq!(engine.count(), 15);
    assert_eq!(calls.cues.borrow().len(), 3);
}

#[test]
fn wall_obstacle_bites_once_then_drops() {
    let (mut engine, _) = engine();
    engine.add(12);
    settle(&mut engine);
    let mut wall = Obstacle::wall(&engine.config().obstacles);

    let e = engine.live()[0];
    assert_eq!(engine.obstacle_enter(&mut wall, e), 5);
    assert!(!wall.is_active());
    assert_eq!(engine.obstacle_enter(&mut wall, e), 0);
    assert_eq!(engine.count(), 7);
    assert_eq!(engine.damage_taken(), 5);
}

#[test]
fn hazards_ignored_while_winning() {
    let (mut engine, _) = engine();
    engine.add(3);
    engine.reach_finish_line();
    let e = engine.live()[0];
    assert!(!engine.hazard_contact(e, HazardKind::Obstacle, None));
    assert_eq!(engine.count(), 3);
}

#[test]
fn launchpad_cooldown() {
    let (mut engine, _) = engine();
    engine.add(1);
    let e = engine.live()[0];
    assert!(engine.launch(e, Some(12.0)));
    // Lands after 1.2s but the cooldown runs for only 1s, so by 1.5s it works again
    for _ in 0..90 {
        engine.tick(DT, Pose::default());
    }
    assert!(engine.launch(e, None));
}

// ── Finish line ────────────────────────────────────────────────────────

#[test]
fn win_mid_batch_stops_spawning_and_drains_without_game_over() {
    let (mut engine, calls) = engine();
    engine.add(40);
    for _ in 0..4 {
        engine.tick(DT, Pose::default());
    }
    let at_finish = engine.count();
    assert!(at_finish < 40);
    assert!(engine.pending_spawns() > 0);

    assert!(engine.reach_finish_line());
    assert_eq!(engine.pending_spawns(), 0);

    let mut previous = at_finish;
    for _ in 0..600 {
        engine.tick(DT, Pose::default());
        let count = engine.count();
        assert!(count <= previous, "crowd grew during finish drain");
        previous = count;
    }

    assert_eq!(engine.count(), 0);
    assert_eq!(calls.depleted.get(), 0);
    assert_eq!(calls.finished.get(), 1);
    assert_eq!(engine.damage_taken(), 0);
}

#[test]
fn spawn_requests_ignored_after_win() {
    let (mut engine, _) = engine();
    engine.add(3);
    engine.reach_finish_line();
    engine.add(10);
    engine.apply_multiply(3.0);
    assert_eq!(engine.count(), 3);
}

#[test]
fn cancelled_drain_never_completes() {
    let (mut engine, calls) = engine();
    engine.add(5);
    engine.reach_finish_line();
    engine.tick(DT, Pose::default());
    engine.cancel_finish_drain();
    let left = engine.count();
    for _ in 0..120 {
        engine.tick(DT, Pose::default());
    }
    assert_eq!(engine.count(), left);
    assert_eq!(calls.finished.get(), 0);
}

#[test]
fn new_session_mid_drain_starts_clean() {
    let (mut engine, calls) = engine();
    engine.begin_session();
    engine.add(20);
    engine.reach_finish_line();
    engine.tick(DT, Pose::default());

    engine.begin_session();
    assert!(!engine.is_winning());
    assert_eq!(engine.finish_phase(), FinishPhase::Inactive);
    let at_start = engine.count();
    assert!(at_start > 0);

    for _ in 0..120 {
        engine.tick(DT, Pose::default());
    }
    assert_eq!(engine.count(), at_start);
    assert_eq!(calls.depleted.get(), 0);
    assert_eq!(calls.finished.get(), 0);
    assert!(engine.reach_finish_line());
}

#[test]
fn new_session_after_win_starts_clean() {
    let (mut engine, calls) = engine();
    engine.begin_session();
    engine.reach_finish_line();
    for _ in 0..120 {
        engine.tick(DT, Pose::default());
    }
    engine.reset_session();
    engine.begin_session();
    assert_eq!(engine.count(), 1);
    assert!(!engine.is_winning());

    engine.hit_obstacle(1);
    assert_eq!(calls.depleted.get(), 1);
}

// ── Disabled engine ────────────────────────────────────────────────────

#[test]
fn disabled_engine_is_inert() {
    let calls = Calls::default();
    let session = SessionContext::headless().with_arbiter(Box::new(Arbiter(calls.clone())));
    let mut config = CrowdConfig::default();
    config.scaling.max_crowd_size = 1;

    let mut engine = CrowdEngine::new(config, Some(AgentTemplate::default()), session);
    assert!(!engine.is_enabled());
    assert!(matches!(engine.init_error(), Some(InitError::InvalidConfig(_))));

    engine.begin_session();
    engine.add(10);
    engine.hit_obstacle(1);
    let mut pair = GatePair::new(Gate::new(GateOp::Add, 4.0), Gate::new(GateOp::Add, 2.0));
    engine.pass_gate_pair(&mut pair, GateSide::Left);
    assert_eq!(pair.chosen(), None);
    assert!(!pair.right.is_consumed());
    assert!(!engine.reach_finish_line());
    for _ in 0..10 {
        engine.tick(DT, Pose::default());
    }
    assert_eq!(engine.count(), 0);
    assert!(engine.live().is_empty());
    assert_eq!(calls.depleted.get(), 0);
    assert!(!engine.snapshot().enabled);
}
