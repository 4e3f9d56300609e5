//! Deformation and scale model: population count to spacing and member scale.
//!
//! Small crowds pull together (spacing lerps from base toward minimum as the
//! count falls below the deformation threshold). Large crowds shrink (scale
//! lerps from base toward minimum as the count rises past the scaling
//! threshold toward `max_crowd_size`). Both are pure functions of the count.
//!
//! | Count | Spacing | Scale |
//! |-------|---------|-------|
//! | `0` | `lerp(base, min, factor)` | base |
//! | `== deformation threshold` | base | depends on scaling threshold |
//! | `>= max_crowd_size` | base | `lerp(base, min, factor)` |

use serde::{Deserialize, Serialize};

use crate::config::{CrowdConfig, DeformationConfig, FormationConfig, ScalingConfig};
use crate::math::{clamp01, lerp};

/// Current spacing and scale derived from population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Deformation {
    pub spacing_x: f32,
    pub spacing_z: f32,
    pub scale: f32,
}

impl Deformation {
    /// Values for an undeformed crowd.
    pub fn base(config: &CrowdConfig) -> Self {
        Self {
            spacing_x: config.formation.base_spacing_x,
            spacing_z: config.formation.base_spacing_z,
            scale: config.scaling.base_scale,
        }
    }
}

/// Spacing `(x, z)` for a crowd of `count` members.
pub fn spacing(count: usize, formation: &FormationConfig, cfg: &DeformationConfig) -> (f32, f32) {
    if cfg.threshold == 0 || count > cfg.threshold as usize {
        return (formation.base_spacing_x, formation.base_spacing_z);
    }

    // 0 at the threshold, 1 for an empty crowd
    let ratio = clamp01(1.0 - count as f32 / cfg.threshold as f32) * cfg.factor;
    (
        lerp(formation.base_spacing_x, cfg.min_spacing_x, ratio),
        lerp(formation.base_spacing_z, cfg.min_spacing_z, ratio),
    )
}

/// Uniform member scale for a crowd of `count` members.
pub fn scale(count: usize, cfg: &ScalingConfig) -> f32 {
    if count < cfg.threshold as usize || cfg.max_crowd_size <= cfg.threshold {
        return cfg.base_scale;
    }

    let span = (cfg.max_crowd_size - cfg.threshold) as f32;
    let ratio = clamp01((count - cfg.threshold as usize) as f32 / span) * cfg.factor;
    lerp(cfg.base_scale, cfg.min_scale, ratio)
}

/// Spacing and scale together.
pub fn compute(count: usize, config: &CrowdConfig) -> Deformation {
    let (spacing_x, spacing_z) = spacing(count, &config.formation, &config.deformation);
    Deformation {
        spacing_x,
        spacing_z,
        scale: scale(count, &config.scaling),
    }
}
