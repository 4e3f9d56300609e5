//! Common components shared by every agent.

use serde::{Deserialize, Serialize};

pub use crowd_logic::math::{Pose, Quat, Vec3};

/// World transform of an agent - position, rotation and uniform scale
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
        }
    }
}

impl Transform {
    pub fn new(position: Vec3, rotation: Quat, scale: f32) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Unrotated transform at `position`
    pub fn at(position: Vec3, scale: f32) -> Self {
        Self::new(position, Quat::IDENTITY, scale)
    }
}

/// Sim time (seconds) an agent was last moved toward its formation slot.
///
/// Smoothing uses the time since this stamp, so members refreshed only
/// every few ticks still converge at the configured rate.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Refreshed {
    pub at: f64,
}
