//! Crowd engine - main entry point, driven once per frame by the game loop

use hecs::{Entity, World};
use serde::{Deserialize, Serialize};

use crowd_logic::config::{AgentTemplate, CrowdConfig};
use crowd_logic::deformation::Deformation;
use crowd_logic::lod::{layout_columns, layout_rate, select_layout, LayoutMode, LodStats, RollingCursor};

use crate::components::{Agent, Pose};
use crate::error::InitError;
use crate::finish::{FinishDrain, FinishPhase};
use crate::protocol::PopulationChange;
use crate::session::SessionContext;
use crate::store::{PoolStats, PopulationStore};
use crate::systems::*;

/// Serializable view of the crowd for reports and debugging overlays
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrowdSnapshot {
    pub enabled: bool,
    pub tick: u64,
    pub count: usize,
    pub deformation: Deformation,
    pub layout_mode: LayoutMode,
    pub last_layout: LodStats,
    pub pool: PoolStats,
    pub pending_spawns: usize,
    pub winning: bool,
    pub finish_phase: FinishPhase,
    pub damage_taken: u64,
}

/// Main crowd simulation
pub struct CrowdEngine {
    /// `None` when initialization failed; every operation is then a no-op
    pub(crate) store: Option<PopulationStore>,
    pub(crate) session: SessionContext,
    pub(crate) damage_taken: u64,
    config: CrowdConfig,
    finish: FinishDrain,
    finish_triggered: bool,
    /// Clock time of the last hazard damage cue
    pub(crate) last_hazard_cue: Option<f64>,
    cursor: RollingCursor,
    tick: u64,
    leader: Pose,
    layout_mode: LayoutMode,
    last_layout: LodStats,
    init_error: Option<InitError>,
}

impl CrowdEngine {
    fn check(config: &CrowdConfig, template: Option<AgentTemplate>) -> Result<AgentTemplate, InitError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(InitError::InvalidConfig(errors));
        }
        template.ok_or(InitError::MissingTemplate)
    }

    fn build(
        config: CrowdConfig,
        store: Option<PopulationStore>,
        session: SessionContext,
        init_error: Option<InitError>,
    ) -> Self {
        Self {
            store,
            session,
            damage_taken: 0,
            finish: FinishDrain::new(&config.finish),
            config,
            finish_triggered: false,
            last_hazard_cue: None,
            cursor: RollingCursor::default(),
            tick: 0,
            leader: Pose::default(),
            layout_mode: LayoutMode::Full,
            last_layout: LodStats::default(),
            init_error,
        }
    }

    /// Create an engine, failing on a bad config or a missing template
    pub fn try_new(
        config: CrowdConfig,
        template: Option<AgentTemplate>,
        mut session: SessionContext,
    ) -> Result<Self, InitError> {
        let template = Self::check(&config, template)?;
        let store = PopulationStore::new(config.clone(), template, &mut session);
        Ok(Self::build(config, Some(store), session, None))
    }

    /// Create an engine. On a setup error the engine logs it and stays
    /// disabled instead of failing.
    pub fn new(config: CrowdConfig, template: Option<AgentTemplate>, mut session: SessionContext) -> Self {
        match Self::check(&config, template) {
            Ok(template) => {
                let store = PopulationStore::new(config.clone(), template, &mut session);
                Self::build(config, Some(store), session, None)
            }
            Err(err) => {
                log::error!("Crowd disabled: {}", err);
                Self::build(config, None, session, Some(err))
            }
        }
    }

    /// Default tuning, default template, no collaborators
    pub fn headless() -> Self {
        Self::new(
            CrowdConfig::default(),
            Some(AgentTemplate::default()),
            SessionContext::headless(),
        )
    }

    // ── Session lifecycle ──────────────────────────────────────────────

    /// Start a level: clear the win flag and any finish sequence left over
    /// from the last one, then make sure there is someone to lead.
    pub fn begin_session(&mut self) {
        if !self.is_enabled() {
            log::warn!("begin_session on a disabled crowd");
            return;
        }
        self.session.set_winning(false);
        self.finish.reset();
        self.finish_triggered = false;
        self.cursor.reset();
        self.last_hazard_cue = None;
        if self.count() == 0 {
            self.apply(PopulationChange::Add(1));
        }
        log::info!("Crowd session started with {} members", self.len());
    }

    /// Back to an empty crowd with every session flag cleared
    pub fn reset_session(&mut self) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        store.clear_to_pool(&mut self.session);
        self.session.set_winning(false);
        self.finish.reset();
        self.finish_triggered = false;
        self.cursor.reset();
        self.last_hazard_cue = None;
        self.damage_taken = 0;
        self.layout_mode = LayoutMode::Full;
        self.last_layout = LodStats::default();
        log::info!("Crowd session reset");
    }

    /// The leader crossed the finish line. Stops spawning and starts the
    /// drain. Works once per session.
    pub fn reach_finish_line(&mut self) -> bool {
        let Some(store) = self.store.as_mut() else {
            return false;
        };
        if self.finish_triggered {
            return false;
        }
        self.finish_triggered = true;
        self.session.set_winning(true);
        store.stop_spawning();
        self.finish.start();
        log::info!("Finish line reached with {} members", store.len());
        true
    }

    /// Stop the finish drain where it is
    pub fn cancel_finish_drain(&mut self) {
        self.finish.cancel();
    }

    // ── Tick ───────────────────────────────────────────────────────────

    /// Advance the crowd by `dt` seconds with the leader at `leader`
    pub fn tick(&mut self, dt: f32, leader: Pose) -> LodStats {
        let dt = dt.max(0.0);
        self.leader = leader;
        let Some(store) = self.store.as_mut() else {
            return LodStats::default();
        };
        self.tick += 1;

        store.advance_clock(dt);
        store.set_spawn_origin(leader);
        store.pump(dt, &mut self.session);

        let finish = self.finish.step(dt, store.len());
        if finish.remove > 0 {
            self.apply(PopulationChange::FinishDrain(finish.remove as u32));
        }
        if finish.completed {
            self.session.arbiter.finish_sequence_complete();
        }

        let Some(store) = self.store.as_mut() else {
            return LodStats::default();
        };
        let session = &mut self.session;
        let template = store.template().clone();

        let world = store.world_mut();
        vertical_system(world, &template, dt);
        cooldown_system(world, dt);
        for entity in falling_system(world, template.gravity, dt) {
            session.agents.destroyed(entity);
        }

        if self.tick % self.config.repair_interval_ticks.max(1) as u64 == 0 {
            store.force_cleanup(session);
        }

        store.recompute();
        let count = store.len();
        let mode = select_layout(count, &self.config.performance);
        if mode != self.layout_mode {
            log::debug!("Layout switched to {:?} at {} members", mode, count);
            self.layout_mode = mode;
        }

        let params = LayoutParams {
            leader,
            deformation: store.deformation(),
            columns: layout_columns(mode, count, &self.config.formation),
            rate: layout_rate(mode, &self.config.formation),
            now: store.now(),
        };
        let (world, live) = store.parts_mut();
        let stats = match mode {
            LayoutMode::Full => arrange_full(world, live, &params, session.agents.as_mut()),
            LayoutMode::Degraded => arrange_degraded(
                world,
                live,
                &params,
                &mut self.cursor,
                self.config.performance.members_per_tick as usize,
                self.config.performance.cull_distance,
                session.agents.as_mut(),
            ),
        };

        store.check_depleted(session);
        self.last_layout = stats;
        stats
    }

    // ── Agents ─────────────────────────────────────────────────────────

    /// Jump with `force`, or the template force. Plays the jump cue.
    pub fn jump(&mut self, entity: Entity, force: Option<f32>) -> bool {
        match self.store.as_mut() {
            Some(store) => store.jump(entity, force, &mut self.session),
            None => false,
        }
    }

    /// Launchpad jump, subject to the per-agent cooldown
    pub fn launch(&mut self, entity: Entity, force: Option<f32>) -> bool {
        match self.store.as_mut() {
            Some(store) => store.launch(entity, force, &mut self.session),
            None => false,
        }
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.world()
            .and_then(|world| world.get::<&Agent>(entity).ok().map(|agent| agent.alive))
            .unwrap_or(false)
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Why the engine is disabled, if it is
    pub fn init_error(&self) -> Option<&InitError> {
        self.init_error.as_ref()
    }

    /// Live count after a repair pass
    pub fn count(&mut self) -> usize {
        self.store.as_mut().map_or(0, PopulationStore::count)
    }

    /// Live count as last recorded
    pub fn len(&self) -> usize {
        self.store.as_ref().map_or(0, PopulationStore::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live agents in formation order
    pub fn live(&self) -> &[Entity] {
        self.store.as_ref().map_or(&[][..], PopulationStore::live)
    }

    pub fn world(&self) -> Option<&World> {
        self.store.as_ref().map(PopulationStore::world)
    }

    pub fn world_mut(&mut self) -> Option<&mut World> {
        self.store.as_mut().map(PopulationStore::world_mut)
    }

    pub fn store(&self) -> Option<&PopulationStore> {
        self.store.as_ref()
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn config(&self) -> &CrowdConfig {
        &self.config
    }

    pub fn deformation(&self) -> Deformation {
        self.store
            .as_ref()
            .map_or_else(|| Deformation::base(&self.config), PopulationStore::deformation)
    }

    pub fn is_winning(&self) -> bool {
        self.session.is_winning()
    }

    pub fn layout_mode(&self) -> LayoutMode {
        self.layout_mode
    }

    pub fn last_layout(&self) -> LodStats {
        self.last_layout
    }

    pub fn finish_phase(&self) -> FinishPhase {
        self.finish.phase()
    }

    pub fn damage_taken(&self) -> u64 {
        self.damage_taken
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn leader(&self) -> Pose {
        self.leader
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.store
            .as_ref()
            .map_or_else(PoolStats::default, PopulationStore::pool_stats)
    }

    pub fn pending_spawns(&self) -> usize {
        self.store
            .as_ref()
            .map_or(0, |store| store.scheduler().pending())
    }

    pub fn snapshot(&self) -> CrowdSnapshot {
        CrowdSnapshot {
            enabled: self.is_enabled(),
            tick: self.tick,
            count: self.len(),
            deformation: self.deformation(),
            layout_mode: self.layout_mode,
            last_layout: self.last_layout,
            pool: self.pool_stats(),
            pending_spawns: self.pending_spawns(),
            winning: self.is_winning(),
            finish_phase: self.finish.phase(),
            damage_taken: self.damage_taken,
        }
    }
}

impl Default for CrowdEngine {
    fn default() -> Self {
        Self::headless()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Transform, Vec3};

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_begin_session_spawns_leader_follower() {
        let mut engine = CrowdEngine::headless();
        engine.begin_session();
        assert_eq!(engine.count(), 1);
        engine.begin_session();
        assert_eq!(engine.count(), 1);
    }

    #[test]
    fn test_missing_template_disables() {
        let mut engine = CrowdEngine::new(CrowdConfig::default(), None, SessionContext::headless());
        assert!(!engine.is_enabled());
        assert!(matches!(engine.init_error(), Some(InitError::MissingTemplate)));
        engine.begin_session();
        assert_eq!(engine.add(5).after, 0);
        assert_eq!(engine.tick(DT, Pose::default()), LodStats::default());
        assert_eq!(engine.count(), 0);
    }

    #[test]
    fn test_try_new_reports_invalid_config() {
        let mut config = CrowdConfig::default();
        config.formation.columns = 0;
        let result = CrowdEngine::try_new(config, Some(AgentTemplate::default()), SessionContext::headless());
        assert!(matches!(result, Err(InitError::InvalidConfig(_))));
    }

    #[test]
    fn test_members_follow_leader() {
        let mut engine = CrowdEngine::headless();
        engine.add(4);
        let leader = Pose::at(Vec3::new(0.0, 0.0, 10.0));
        for _ in 0..240 {
            engine.tick(DT, leader);
        }
        let world = engine.world().unwrap();
        for &e in engine.live() {
            let position = world.get::<&Transform>(e).unwrap().position;
            assert!(position.distance(&leader.position) < 1.0);
            assert!(position.z <= leader.position.z + 1e-3);
        }
    }

    #[test]
    fn test_tick_switches_layout_mode() {
        let mut engine = CrowdEngine::headless();
        engine.add(5);
        engine.tick(DT, Pose::default());
        assert_eq!(engine.layout_mode(), LayoutMode::Full);

        engine.add(5);
        engine.apply_multiply(6.0);
        for _ in 0..30 {
            engine.tick(DT, Pose::default());
        }
        assert_eq!(engine.count(), 60);
        assert_eq!(engine.layout_mode(), LayoutMode::Degraded);
    }

    #[test]
    fn test_finish_line_is_one_shot() {
        let mut engine = CrowdEngine::headless();
        engine.begin_session();
        assert!(engine.reach_finish_line());
        assert!(!engine.reach_finish_line());
        assert!(engine.is_winning());
    }

    #[test]
    fn test_reset_clears_session() {
        let mut engine = CrowdEngine::headless();
        engine.add(5);
        engine.hit_obstacle(2);
        engine.reach_finish_line();
        engine.reset_session();
        assert_eq!(engine.count(), 0);
        assert_eq!(engine.damage_taken(), 0);
        assert!(!engine.is_winning());
        assert!(engine.reach_finish_line());
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut engine = CrowdEngine::headless();
        engine.add(3);
        engine.tick(DT, Pose::default());
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.count, 3);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"count\":3"));
    }
}
