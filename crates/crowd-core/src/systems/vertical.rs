//! Vertical motion - jump arcs and landing for crowd members

use hecs::{Entity, World};

use crowd_logic::config::AgentTemplate;

use crate::components::{LaunchCooldown, Member, Transform, Vertical};

/// Integrate every member's vertical motion over `dt` seconds.
/// Returns how many members are airborne afterwards.
pub fn vertical_system(world: &mut World, template: &AgentTemplate, dt: f32) -> usize {
    let mut airborne = 0;
    for (_entity, (_member, vertical, transform)) in
        world.query_mut::<(&Member, &mut Vertical, &mut Transform)>()
    {
        vertical.integrate(
            &mut transform.position.y,
            template.gravity,
            template.ground_tolerance,
            dt,
        );
        if vertical.is_airborne() {
            airborne += 1;
        }
    }
    airborne
}

/// Tick launchpad cooldowns down and drop the expired ones
pub fn cooldown_system(world: &mut World, dt: f32) {
    let mut expired: Vec<Entity> = Vec::new();
    for (entity, cooldown) in world.query_mut::<&mut LaunchCooldown>() {
        cooldown.remaining -= dt;
        if cooldown.remaining <= 0.0 {
            expired.push(entity);
        }
    }
    for entity in expired {
        let _ = world.remove_one::<LaunchCooldown>(entity);
    }
}
