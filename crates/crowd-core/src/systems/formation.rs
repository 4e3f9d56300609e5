//! Formation system - moves members toward their grid slot behind the leader
//!
//! Two passes share the per-member step:
//! - `arrange_full` refreshes every member every tick
//! - `arrange_degraded` refreshes a rolling window of members and culls the
//!   ones too far from the leader
//!
//! Members in the air are never moved. Smoothing uses the time since the
//! member was last refreshed, so a member visited every tenth tick still
//! approaches at the configured rate.

use hecs::{Entity, World};

use crowd_logic::deformation::Deformation;
use crowd_logic::formation::slot_target;
use crowd_logic::lod::{cull_decision, CullDecision, LodStats, RollingCursor};
use crowd_logic::math::{approach_factor, lerp};

use crate::components::{Culled, Pose, Refreshed, Transform, Vec3, Vertical};
use crate::session::AgentSink;

/// Inputs shared by every member this tick
#[derive(Debug, Clone, Copy)]
pub struct LayoutParams {
    pub leader: Pose,
    pub deformation: Deformation,
    /// Grid width actually used
    pub columns: usize,
    /// Approach rate per second
    pub rate: f32,
    /// Sim clock in seconds
    pub now: f64,
}

impl LayoutParams {
    fn target(&self, slot: usize) -> Vec3 {
        slot_target(
            &self.leader,
            slot,
            self.columns,
            self.deformation.spacing_x,
            self.deformation.spacing_z,
        )
    }
}

enum Settled {
    Moved,
    Airborne,
    Missing,
}

/// Move one member toward `target`. `snap` places it there outright.
fn settle(world: &mut World, entity: Entity, target: Vec3, params: &LayoutParams, snap: bool) -> Settled {
    let Ok((transform, vertical, refreshed)) =
        world.query_one_mut::<(&mut Transform, &mut Vertical, &mut Refreshed)>(entity)
    else {
        return Settled::Missing;
    };

    let elapsed = (params.now - refreshed.at) as f32;
    refreshed.at = params.now;
    if vertical.is_airborne() {
        return Settled::Airborne;
    }

    let t = if snap {
        1.0
    } else {
        approach_factor(params.rate, elapsed)
    };
    transform.position = transform.position.lerp(target, t);
    transform.rotation = transform.rotation.slerp(params.leader.rotation, t);
    transform.scale = lerp(transform.scale, params.deformation.scale, t);
    vertical.ground_y = transform.position.y;
    Settled::Moved
}

fn restore(world: &mut World, entity: Entity, sink: &mut dyn AgentSink) -> bool {
    if world.remove_one::<Culled>(entity).is_ok() {
        sink.set_active(entity, true);
        log::debug!("Member {:?} back in range", entity);
        return true;
    }
    false
}

fn tally(stats: &mut LodStats, settled: Settled) {
    match settled {
        Settled::Moved => stats.refreshed += 1,
        Settled::Airborne => stats.airborne += 1,
        Settled::Missing => {}
    }
}

/// Refresh every member. Culled members are reactivated first.
pub fn arrange_full(
    world: &mut World,
    live: &[Entity],
    params: &LayoutParams,
    sink: &mut dyn AgentSink,
) -> LodStats {
    let mut stats = LodStats::default();
    for (slot, &entity) in live.iter().enumerate() {
        let restored = restore(world, entity, sink);
        if restored {
            stats.restored += 1;
        }
        let target = params.target(slot);
        tally(&mut stats, settle(world, entity, target, params, restored));
    }
    stats
}

/// Refresh at most `budget` members starting at the cursor.
///
/// Visible members further than `cull_distance` from the leader are
/// deactivated instead of moved. A culled member is judged by where its slot
/// is, and when that is back in range it is reactivated and placed on it.
pub fn arrange_degraded(
    world: &mut World,
    live: &[Entity],
    params: &LayoutParams,
    cursor: &mut RollingCursor,
    budget: usize,
    cull_distance: f32,
    sink: &mut dyn AgentSink,
) -> LodStats {
    let mut stats = LodStats::default();
    for slot in cursor.window(live.len(), budget) {
        let entity = live[slot];
        let target = params.target(slot);
        let culled = world.get::<&Culled>(entity).is_ok();
        let judged_at = if culled {
            target
        } else {
            match world.get::<&Transform>(entity) {
                Ok(transform) => transform.position,
                Err(_) => continue,
            }
        };

        match cull_decision(judged_at.distance(&params.leader.position), cull_distance, culled) {
            CullDecision::Visible => {
                tally(&mut stats, settle(world, entity, target, params, false));
            }
            CullDecision::Restore => {
                restore(world, entity, sink);
                stats.restored += 1;
                tally(&mut stats, settle(world, entity, target, params, true));
            }
            CullDecision::Cull => {
                let _ = world.insert_one(entity, Culled);
                sink.set_active(entity, false);
                log::debug!("Member {:?} culled", entity);
                stats.culled += 1;
            }
            CullDecision::StayCulled => stats.culled += 1,
        }
    }
    stats
}
