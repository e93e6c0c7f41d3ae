//! The untie itself.
//!
//! Runs when a commit timer fires. The target is re-checked first because
//! another actor may have untied it while this timer was pending; the
//! `tied_down` flag only ever goes from `true` to `false`, so the re-check
//! makes repeated commits on the same target no-ops.

use tracing::{debug, info};
use untie_math::Vec3;

use crate::ids::TargetId;
use crate::world::World;

/// What a commit did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The target was tied down and is now free.
    Untied,
    /// The target was already free or no longer exists.
    NotEligible,
}

/// Free `target`: let it float with `buoyancy_scale` and play its freed
/// effect.
pub fn untie(world: &mut dyn World, target: TargetId, buoyancy_scale: f32) -> CommitOutcome {
    let Some(body) = world.target_mut(target).filter(|body| body.is_tied_down()) else {
        debug!(%target, "commit skipped, target no longer tied down");
        return CommitOutcome::NotEligible;
    };

    body.buoyancy.scale = buoyancy_scale;
    body.kinematic = false;
    body.buoyancy.enabled = true;
    body.tied_down = false;

    let position = body.position;
    let effect = body.valid_freed_effect().map(str::to_owned);

    world.send_network_update(target);
    if let Some(path) = effect {
        world.run_effect(&path, position, Vec3::Y);
    }

    info!(%target, buoyancy_scale, "target untied");
    CommitOutcome::Untied
}
