//! Crowd tuning configuration and validation.
//!
//! Every knob the formation, deformation, LOD, spawn and finish-drain
//! logic reads lives here, grouped by concern. All sections deserialize
//! with defaults so a partial JSON file only needs the values it changes.
//!
//! ```
//! use crowd_logic::config::CrowdConfig;
//!
//! let mut config = CrowdConfig::default();
//! config.formation.columns = 10;
//! assert!(config.validate().is_empty());
//!
//! config.deformation.threshold = 0;
//! assert!(!config.validate().is_empty());
//! ```

use serde::{Deserialize, Serialize};

/// Full crowd configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrowdConfig {
    pub formation: FormationConfig,
    pub deformation: DeformationConfig,
    pub scaling: ScalingConfig,
    pub performance: PerformanceConfig,
    pub spawning: SpawnConfig,
    pub finish: FinishConfig,
    pub obstacles: ObstacleConfig,
    /// Ticks between forced roster repair passes.
    pub repair_interval_ticks: u32,
}

/// Grid shape, base spacing and smoothing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FormationConfig {
    /// Columns in the formation grid.
    pub columns: u32,
    /// Side-to-side spacing at full size.
    pub base_spacing_x: f32,
    /// Front-to-back spacing at full size.
    pub base_spacing_z: f32,
    /// Approach rate (per second) for members moving to their slot.
    pub member_smooth: f32,
    /// Multiplier on `member_smooth` for the degraded layout.
    pub degraded_smooth_multiplier: f32,
    /// Widen the grid (up to 2x columns) in the degraded layout.
    pub use_simple_formation: bool,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            columns: 8,
            base_spacing_x: 0.15,
            base_spacing_z: 0.2,
            member_smooth: 16.0,
            degraded_smooth_multiplier: 1.5,
            use_simple_formation: true,
        }
    }
}

/// Spacing tightening for small crowds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeformationConfig {
    pub min_spacing_x: f32,
    pub min_spacing_z: f32,
    /// How far toward the minimum spacing a near-empty crowd goes (0-1).
    pub factor: f32,
    /// Population at or below which spacing starts tightening.
    pub threshold: u32,
}

impl Default for DeformationConfig {
    fn default() -> Self {
        Self {
            min_spacing_x: 0.08,
            min_spacing_z: 0.12,
            factor: 0.7,
            threshold: 10,
        }
    }
}

/// Per-member scale shrink for large crowds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScalingConfig {
    pub base_scale: f32,
    pub min_scale: f32,
    /// Population at which shrinking starts.
    pub threshold: u32,
    /// Population at which shrinking reaches its full extent.
    pub max_crowd_size: u32,
    /// How far toward `min_scale` a maximal crowd goes (0-1).
    pub factor: f32,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            base_scale: 0.2,
            min_scale: 0.04,
            threshold: 5,
            max_crowd_size: 200,
            factor: 0.8,
        }
    }
}

/// Large-population layout budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Populations above this use the degraded layout.
    pub threshold: u32,
    /// Members refreshed per tick in the degraded layout.
    pub members_per_tick: u32,
    /// Members farther than this from the leader are deactivated.
    pub cull_distance: f32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            threshold: 50,
            members_per_tick: 10,
            cull_distance: 20.0,
        }
    }
}

/// Spawn batching and pooling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpawnConfig {
    /// Requests up to this size spawn immediately; larger ones are batched.
    pub max_spawn_per_tick: u32,
    /// Real-time seconds between spawn sub-batches.
    pub batch_delay: f32,
    /// Agents pre-created into the pool at startup.
    pub pool_size: u32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            max_spawn_per_tick: 5,
            batch_delay: 0.02,
            pool_size: 50,
        }
    }
}

/// Finish-line drain pacing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FinishConfig {
    /// Members removed per second during the drain.
    pub reduction_speed: f32,
    /// Seconds to hold after the crowd is gone before completing.
    pub celebrate_delay: f32,
}

impl Default for FinishConfig {
    fn default() -> Self {
        Self {
            reduction_speed: 10.0,
            celebrate_delay: 0.5,
        }
    }
}

/// Contact damage from obstacles and walls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObstacleConfig {
    /// Members taken from the back of the crowd when one touches a wall.
    pub wall_bite: u32,
    /// Kills per second for obstacles that hurt while touched.
    pub damage_per_second: f32,
    /// Seconds between damage cues from one obstacle.
    pub damage_cue_cooldown: f32,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            wall_bite: 5,
            damage_per_second: 5.0,
            damage_cue_cooldown: 0.3,
        }
    }
}

/// Per-agent physics template. Every spawned agent is built from one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentTemplate {
    /// Upward velocity given by a jump with no explicit force.
    pub jump_force: f32,
    /// Vertical acceleration while airborne (negative is down).
    pub gravity: f32,
    /// Height above ground still treated as touching it.
    pub ground_tolerance: f32,
    /// Seconds a falling agent lives before it is destroyed.
    pub fall_despawn_delay: f32,
    /// Seconds before the same agent can be launched again.
    pub launch_cooldown: f32,
}

impl Default for AgentTemplate {
    fn default() -> Self {
        Self {
            jump_force: 10.0,
            gravity: -20.0,
            ground_tolerance: 0.01,
            fall_despawn_delay: 2.0,
            launch_cooldown: 1.0,
        }
    }
}

impl Default for CrowdConfig {
    fn default() -> Self {
        Self {
            formation: FormationConfig::default(),
            deformation: DeformationConfig::default(),
            scaling: ScalingConfig::default(),
            performance: PerformanceConfig::default(),
            spawning: SpawnConfig::default(),
            finish: FinishConfig::default(),
            obstacles: ObstacleConfig::default(),
            repair_interval_ticks: 60,
        }
    }
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Formation needs at least one column.
    NoColumns,
    /// Deformation threshold of zero would divide by zero.
    ZeroDeformationThreshold,
    /// Scaling range is empty or inverted.
    ScalingRangeEmpty { threshold: u32, max_crowd_size: u32 },
    /// A 0-1 factor is out of range.
    FactorOutOfRange { name: &'static str, value: f32 },
    /// A spacing is negative or the minimum exceeds the base.
    InvalidSpacing { name: &'static str },
    /// Minimum scale larger than base scale.
    InvalidScale { base: f32, min: f32 },
    /// A per-tick budget of zero would stall the crowd.
    ZeroBudget { name: &'static str },
    /// Culling distance must be positive.
    InvalidCullDistance(f32),
    /// Delays cannot be negative.
    NegativeDelay { name: &'static str, value: f32 },
    /// Finish drain would never empty the crowd.
    InvalidReductionSpeed(f32),
    /// Contact damage rate must be positive.
    InvalidDamageRate(f32),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NoColumns => write!(f, "formation.columns must be at least 1"),
            ConfigError::ZeroDeformationThreshold => {
                write!(f, "deformation.threshold must be at least 1")
            }
            ConfigError::ScalingRangeEmpty {
                threshold,
                max_crowd_size,
            } => write!(
                f,
                "scaling.max_crowd_size ({}) must exceed scaling.threshold ({})",
                max_crowd_size, threshold
            ),
            ConfigError::FactorOutOfRange { name, value } => {
                write!(f, "{} must be within 0..=1, got {}", name, value)
            }
            ConfigError::InvalidSpacing { name } => write!(f, "invalid spacing: {}", name),
            ConfigError::InvalidScale { base, min } => {
                write!(f, "scaling.min_scale ({}) exceeds base_scale ({})", min, base)
            }
            ConfigError::ZeroBudget { name } => write!(f, "{} must be at least 1", name),
            ConfigError::InvalidCullDistance(d) => {
                write!(f, "performance.cull_distance must be positive, got {}", d)
            }
            ConfigError::NegativeDelay { name, value } => {
                write!(f, "{} cannot be negative, got {}", name, value)
            }
            ConfigError::InvalidReductionSpeed(s) => {
                write!(f, "finish.reduction_speed must be positive, got {}", s)
            }
            ConfigError::InvalidDamageRate(r) => {
                write!(f, "obstacles.damage_per_second must be positive, got {}", r)
            }
        }
    }
}

impl CrowdConfig {
    /// Validate the configuration, returning all errors found.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let f = &self.formation;
        let d = &self.deformation;
        let s = &self.scaling;

        if f.columns == 0 {
            errors.push(ConfigError::NoColumns);
        }
        if d.threshold == 0 {
            errors.push(ConfigError::ZeroDeformationThreshold);
        }
        if s.max_crowd_size <= s.threshold {
            errors.push(ConfigError::ScalingRangeEmpty {
                threshold: s.threshold,
                max_crowd_size: s.max_crowd_size,
            });
        }

        for (name, value) in [
            ("deformation.factor", d.factor),
            ("scaling.factor", s.factor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(ConfigError::FactorOutOfRange { name, value });
            }
        }

        if f.base_spacing_x < 0.0 || d.min_spacing_x < 0.0 || d.min_spacing_x > f.base_spacing_x {
            errors.push(ConfigError::InvalidSpacing { name: "x" });
        }
        if f.base_spacing_z < 0.0 || d.min_spacing_z < 0.0 || d.min_spacing_z > f.base_spacing_z {
            errors.push(ConfigError::InvalidSpacing { name: "z" });
        }
        if s.min_scale < 0.0 || s.min_scale > s.base_scale {
            errors.push(ConfigError::InvalidScale {
                base: s.base_scale,
                min: s.min_scale,
            });
        }

        if self.performance.members_per_tick == 0 {
            errors.push(ConfigError::ZeroBudget {
                name: "performance.members_per_tick",
            });
        }
        if self.spawning.max_spawn_per_tick == 0 {
            errors.push(ConfigError::ZeroBudget {
                name: "spawning.max_spawn_per_tick",
            });
        }
        if self.repair_interval_ticks == 0 {
            errors.push(ConfigError::ZeroBudget {
                name: "repair_interval_ticks",
            });
        }
        if self.performance.cull_distance <= 0.0 {
            errors.push(ConfigError::InvalidCullDistance(
                self.performance.cull_distance,
            ));
        }

        for (name, value) in [
            ("spawning.batch_delay", self.spawning.batch_delay),
            ("finish.celebrate_delay", self.finish.celebrate_delay),
            ("obstacles.damage_cue_cooldown", self.obstacles.damage_cue_cooldown),
        ] {
            if value < 0.0 {
                errors.push(ConfigError::NegativeDelay { name, value });
            }
        }
        if self.finish.reduction_speed <= 0.0 {
            errors.push(ConfigError::InvalidReductionSpeed(
                self.finish.reduction_speed,
            ));
        }
        if self.obstacles.damage_per_second <= 0.0 {
            errors.push(ConfigError::InvalidDamageRate(
                self.obstacles.damage_per_second,
            ));
        }

        errors
    }
}
