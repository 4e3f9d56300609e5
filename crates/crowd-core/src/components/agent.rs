//! Crowd agent components: life state, vertical motion, roster membership.

use serde::{Deserialize, Serialize};

/// Life state of a crowd agent
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Agent {
    pub alive: bool,
}

impl Agent {
    pub fn alive() -> Self {
        Self { alive: true }
    }
}

/// Marker + slot ordering for agents attached to the crowd.
///
/// `seq` increases with every spawn, so sorting members by it recovers
/// formation order after a roster rebuild.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub seq: u64,
}

/// Marker for inactive agents waiting in the pool
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Pooled;

/// Marker for members deactivated by distance culling
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Culled;

/// Present while an agent drops out of the world after falling through a gap
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Falling {
    /// Seconds until the agent is destroyed
    pub remaining: f32,
    pub velocity: f32,
}

/// Present while an agent cannot be launched again
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LaunchCooldown {
    pub remaining: f32,
}

/// Vertical motion relative to a ground reference height
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Vertical {
    pub velocity: f32,
    pub ground_y: f32,
    pub grounded: bool,
}

impl Vertical {
    /// Standing still on ground at `ground_y`
    pub fn grounded_at(ground_y: f32) -> Self {
        Self {
            velocity: 0.0,
            ground_y,
            grounded: true,
        }
    }

    /// Launch upward. Only a living, grounded agent can jump.
    pub fn jump(&mut self, alive: bool, force: f32) -> bool {
        if !alive || !self.grounded {
            return false;
        }
        self.velocity = force;
        self.grounded = false;
        true
    }

    /// Advance `y` by `dt` seconds under `gravity`.
    ///
    /// Uses the closed-form constant-acceleration step, so the arc is the
    /// same regardless of how the elapsed time is sliced. Landing snaps
    /// exactly to the ground height on the step that crosses it.
    pub fn integrate(&mut self, y: &mut f32, gravity: f32, tolerance: f32, dt: f32) {
        if self.grounded && self.velocity <= 0.0 && *y <= self.ground_y + tolerance {
            self.land(y);
            return;
        }

        self.grounded = false;
        *y += self.velocity * dt + 0.5 * gravity * dt * dt;
        self.velocity += gravity * dt;

        if self.velocity <= 0.0 && *y <= self.ground_y + tolerance {
            self.land(y);
        }
    }

    /// Snap to ground immediately
    pub fn land(&mut self, y: &mut f32) {
        *y = self.ground_y;
        self.velocity = 0.0;
        self.grounded = true;
    }

    pub fn is_airborne(&self) -> bool {
        !self.grounded
    }
}
