//! Crowd Headless Simulation Harness
//!
//! Plays the crowd through short level scenarios and checks the results.
//! Runs entirely in-process: no engine, no rendering, no audio.
//!
//! Usage:
//!   cargo run -p crowd-simtest
//!   cargo run -p crowd-simtest -- --verbose

use std::cell::Cell;
use std::rc::Rc;

use crowd_core::prelude::*;
use crowd_logic::deformation::{scale, spacing};
use crowd_logic::gates::{multiply_delta, population_delta};

// ── Reference config (same JSON a game build ships) ─────────────────────
const CONFIG_JSON: &str = include_str!("../../../data/crowd_config.json");

const DT: f32 = 1.0 / 60.0;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

/// Counts arbiter calls so scenarios can check them
#[derive(Clone, Default)]
struct ArbiterLog {
    depleted: Rc<Cell<u32>>,
    finished: Rc<Cell<u32>>,
}

impl GameOverArbiter for ArbiterLog {
    fn population_depleted(&mut self) {
        self.depleted.set(self.depleted.get() + 1);
    }

    fn finish_sequence_complete(&mut self) {
        self.finished.set(self.finished.get() + 1);
    }
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if verbose { "debug" } else { "warn" }),
    )
    .init();

    println!("=== Crowd Simulation Harness ===\n");

    let config = match load_config(CONFIG_JSON) {
        Ok(config) => config,
        Err(e) => {
            println!("  ✗ config_load: {}", e);
            std::process::exit(1);
        }
    };

    let mut results = Vec::new();

    // 1. Reference config
    results.extend(validate_config(&config));

    // 2. Deformation / scale sweep
    results.extend(validate_deformation(&config));

    // 3. Gate arithmetic
    results.extend(validate_gates());

    // 4. Population store behaviour
    results.extend(validate_population(&config));

    // 5. Formation layout
    results.extend(validate_layout(&config));

    // 6. Finish line
    results.extend(validate_finish_line(&config, verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn engine_with(config: &CrowdConfig, arbiter: &ArbiterLog) -> CrowdEngine {
    let session = SessionContext::headless().with_arbiter(Box::new(arbiter.clone()));
    CrowdEngine::new(config.clone(), Some(AgentTemplate::default()), session)
}

/// Tick until the spawn queue is empty
fn settle(engine: &mut CrowdEngine, leader: Pose) {
    for _ in 0..5000 {
        if engine.pending_spawns() == 0 {
            break;
        }
        engine.tick(DT, leader);
    }
    engine.tick(DT, leader);
}

// ── 1. Config ───────────────────────────────────────────────────────────

fn validate_config(config: &CrowdConfig) -> Vec<TestResult> {
    println!("--- Config ---");
    let mut results = Vec::new();

    let errors = config.validate();
    results.push(TestResult {
        name: "config_valid".into(),
        passed: errors.is_empty(),
        detail: if errors.is_empty() {
            "reference config passes validation".into()
        } else {
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        },
    });

    results.push(TestResult {
        name: "config_matches_defaults".into(),
        passed: *config == CrowdConfig::default(),
        detail: "shipped JSON equals built-in tuning".into(),
    });

    let partial = load_config(r#"{ "performance": { "threshold": 80 } }"#);
    results.push(TestResult {
        name: "config_partial_json".into(),
        passed: matches!(&partial, Ok(c) if c.performance.threshold == 80 && c.formation.columns == 8),
        detail: "missing sections fall back to defaults".into(),
    });

    let broken = load_config(r#"{ "spawning": { "max_spawn_per_tick": 0 } }"#);
    results.push(TestResult {
        name: "config_rejects_zero_budget".into(),
        passed: matches!(broken, Err(InitError::InvalidConfig(_))),
        detail: "zero spawn budget is refused".into(),
    });

    results
}

// ── 2. Deformation ──────────────────────────────────────────────────────

fn validate_deformation(config: &CrowdConfig) -> Vec<TestResult> {
    println!("--- Deformation ---");
    let mut results = Vec::new();
    let max = config.scaling.max_crowd_size as usize;

    let mut spacing_drops = Vec::new();
    let mut scale_rises = Vec::new();
    let mut prev_spacing = spacing(0, &config.formation, &config.deformation);
    let mut prev_scale = scale(0, &config.scaling);
    for count in 1..=max + 20 {
        let s = spacing(count, &config.formation, &config.deformation);
        let k = scale(count, &config.scaling);
        if s.0 < prev_spacing.0 || s.1 < prev_spacing.1 {
            spacing_drops.push(count);
        }
        if k > prev_scale {
            scale_rises.push(count);
        }
        prev_spacing = s;
        prev_scale = k;
    }

    results.push(TestResult {
        name: "spacing_non_decreasing".into(),
        passed: spacing_drops.is_empty(),
        detail: format!("0..={} checked, drops at {:?}", max + 20, spacing_drops),
    });
    results.push(TestResult {
        name: "scale_non_increasing".into(),
        passed: scale_rises.is_empty(),
        detail: format!("0..={} checked, rises at {:?}", max + 20, scale_rises),
    });

    let at_threshold = spacing(
        config.deformation.threshold as usize,
        &config.formation,
        &config.deformation,
    );
    results.push(TestResult {
        name: "spacing_base_at_threshold".into(),
        passed: at_threshold
            == (config.formation.base_spacing_x, config.formation.base_spacing_z),
        detail: format!("{:?}", at_threshold),
    });

    let floor = scale(max * 4, &config.scaling);
    let expected = config.scaling.base_scale
        + (config.scaling.min_scale - config.scaling.base_scale) * config.scaling.factor;
    results.push(TestResult {
        name: "scale_clamped_past_max".into(),
        passed: (floor - expected).abs() < 1e-5,
        detail: format!("scale at {} = {:.4}", max * 4, floor),
    });

    results
}

// ── 3. Gates ────────────────────────────────────────────────────────────

fn validate_gates() -> Vec<TestResult> {
    println!("--- Gates ---");
    let mut results = Vec::new();

    let mut count = 1usize;
    for (op, value) in [(GateOp::Add, 5.0), (GateOp::Multiply, 2.0)] {
        count = (count as i64 + population_delta(op, value, count)) as usize;
    }
    results.push(TestResult {
        name: "gate_chain_arithmetic".into(),
        passed: count == 12,
        detail: format!("1 -> +5 -> x2 = {}", count),
    });

    let ties = [multiply_delta(5, 0.5), multiply_delta(3, 1.5), multiply_delta(7, 0.5)];
    results.push(TestResult {
        name: "multiply_rounds_ties_even".into(),
        passed: ties == [-3, 1, -3],
        detail: format!("5x0.5, 3x1.5, 7x0.5 deltas = {:?}", ties),
    });

    results.push(TestResult {
        name: "divide_by_zero_noop".into(),
        passed: population_delta(GateOp::Divide, 0.0, 40) == 0,
        detail: "÷0 leaves the crowd alone".into(),
    });

    results
}

// ── 4. Population ───────────────────────────────────────────────────────

fn validate_population(config: &CrowdConfig) -> Vec<TestResult> {
    println!("--- Population ---");
    let mut results = Vec::new();
    let leader = Pose::default();

    let arbiter = ArbiterLog::default();
    let mut engine = engine_with(config, &arbiter);
    engine.begin_session();
    engine.pass_gate(&mut Gate::new(GateOp::Add, 5.0));
    engine.pass_gate(&mut Gate::new(GateOp::Multiply, 2.0));
    settle(&mut engine, leader);
    let count = engine.count();
    results.push(TestResult {
        name: "engine_gate_chain".into(),
        passed: count == 12,
        detail: format!("initial spawn, +5, x2 -> {}", count),
    });

    let before = engine.count();
    engine.remove(5);
    let after = engine.count();
    results.push(TestResult {
        name: "remove_then_count".into(),
        passed: after == before.saturating_sub(5),
        detail: format!("{} - 5 = {}", before, after),
    });

    engine.add(4);
    engine.remove(4);
    results.push(TestResult {
        name: "add_remove_idempotent".into(),
        passed: engine.count() == after,
        detail: format!("count back to {}", engine.count()),
    });

    let victim = engine.live()[0];
    engine.kill_by_hazard(victim);
    engine.kill_by_hazard(victim);
    results.push(TestResult {
        name: "double_kill_counts_once".into(),
        passed: engine.count() == after - 1 && engine.damage_taken() == 1,
        detail: format!(
            "count {}, damage taken {}",
            engine.count(),
            engine.damage_taken()
        ),
    });

    engine.hit_obstacle(1000);
    for _ in 0..120 {
        engine.tick(DT, leader);
    }
    results.push(TestResult {
        name: "game_over_once".into(),
        passed: arbiter.depleted.get() == 1,
        detail: format!("arbiter called {} time(s)", arbiter.depleted.get()),
    });

    let stats = engine.pool_stats();
    results.push(TestResult {
        name: "pool_recycles".into(),
        passed: stats.recycled > 0 && stats.pooled > 0 && stats.live == 0,
        detail: format!(
            "created {}, recycled {}, pooled {}",
            stats.created, stats.recycled, stats.pooled
        ),
    });

    results
}

// ── 5. Layout ───────────────────────────────────────────────────────────

fn validate_layout(config: &CrowdConfig) -> Vec<TestResult> {
    println!("--- Layout ---");
    let mut results = Vec::new();
    let leader = Pose::default();
    let budget = config.performance.members_per_tick as usize;

    let arbiter = ArbiterLog::default();
    let mut engine = engine_with(config, &arbiter);
    engine.add(150);
    settle(&mut engine, leader);

    let mut worst = 0;
    for _ in 0..30 {
        let stats = engine.tick(DT, leader);
        worst = worst.max(stats.visited());
    }
    results.push(TestResult {
        name: "degraded_layout_bounded".into(),
        passed: engine.layout_mode() == LayoutMode::Degraded && worst <= budget,
        detail: format!(
            "{} members, {:?}, at most {} refreshed per tick",
            engine.count(),
            engine.layout_mode(),
            worst
        ),
    });

    let mut small = engine_with(config, &arbiter);
    small.add(5);
    for _ in 0..30 {
        small.tick(DT, leader);
    }
    let jumper = small.live()[0];
    let grab = |engine: &CrowdEngine| {
        engine
            .world()
            .and_then(|w| w.get::<&Transform>(jumper).ok().map(|t| t.position))
    };
    let start = grab(&small);
    small.jump(jumper, None);
    let moved_leader = Pose::at(Vec3::new(2.0, 0.0, 4.0));
    let mut drifted = false;
    for _ in 0..20 {
        small.tick(DT, moved_leader);
        if let (Some(a), Some(b)) = (start, grab(&small)) {
            drifted |= a.x != b.x || a.z != b.z;
        }
    }
    results.push(TestResult {
        name: "airborne_member_untouched".into(),
        passed: start.is_some() && !drifted,
        detail: "jumping member kept its x/z while the leader moved".into(),
    });

    results
}

// ── 6. Finish line ──────────────────────────────────────────────────────

fn validate_finish_line(config: &CrowdConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Finish Line ---");
    let mut results = Vec::new();
    let leader = Pose::default();

    let arbiter = ArbiterLog::default();
    let mut engine = engine_with(config, &arbiter);
    engine.add(40);
    for _ in 0..4 {
        engine.tick(DT, leader);
    }
    let at_finish = engine.count();
    engine.reach_finish_line();

    let mut grew = false;
    let mut previous = at_finish;
    for _ in 0..600 {
        engine.tick(DT, leader);
        let count = engine.count();
        grew |= count > previous;
        previous = count;
    }

    results.push(TestResult {
        name: "win_stops_spawning".into(),
        passed: !grew && engine.pending_spawns() == 0,
        detail: format!("{} of 40 spawned before the line, none after", at_finish),
    });
    results.push(TestResult {
        name: "drain_empties_crowd".into(),
        passed: engine.count() == 0,
        detail: format!("{} members left", engine.count()),
    });
    results.push(TestResult {
        name: "drain_is_not_game_over".into(),
        passed: arbiter.depleted.get() == 0 && arbiter.finished.get() == 1,
        detail: format!(
            "depleted {}, finished {}",
            arbiter.depleted.get(),
            arbiter.finished.get()
        ),
    });

    if verbose {
        match serde_json::to_string_pretty(&engine.snapshot()) {
            Ok(json) => println!("{}", json),
            Err(e) => println!("  snapshot serialization failed: {}", e),
        }
    }

    results
}
