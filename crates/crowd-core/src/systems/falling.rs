//! Falling system - agents that dropped through a gap fall, then get destroyed

use hecs::{Entity, World};

use crate::components::{Falling, Transform};

/// Drop falling agents under `gravity` and despawn those whose delay ran out.
/// Returns the despawned handles.
pub fn falling_system(world: &mut World, gravity: f32, dt: f32) -> Vec<Entity> {
    let mut expired = Vec::new();
    for (entity, (falling, transform)) in world.query_mut::<(&mut Falling, &mut Transform)>() {
        transform.position.y += falling.velocity * dt + 0.5 * gravity * dt * dt;
        falling.velocity += gravity * dt;
        falling.remaining -= dt;
        if falling.remaining <= 0.0 {
            expired.push(entity);
        }
    }

    expired.retain(|&entity| world.despawn(entity).is_ok());
    expired
}
