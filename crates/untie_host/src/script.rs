//! Scripted scenarios for the headless host.
//!
//! A script declares the actors and targets that exist, who starts with the
//! use permission, and a list of timed steps. Vectors are JSON arrays:
//!
//! ```json
//! {
//!   "actors": [{ "id": 1, "position": [0.0, -8.0, 0.0] }],
//!   "targets": [{ "id": 1, "position": [0.0, -8.0, 2.0] }],
//!   "grants": [1],
//!   "steps": [
//!     { "at": 0.0, "action": "connect", "actor": 1 },
//!     { "at": 0.5, "action": "set_water_factor", "actor": 1, "water_factor": 1.0 },
//!     { "at": 6.0, "action": "press_use", "actor": 1 }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use untie_core::{ActorId, TargetId};
use untie_math::Vec3;

const FREED_EFFECT: &str = "assets/prefabs/misc/supply drop/effects/supply_drop_freed.prefab";

/// An actor that can connect during the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSpec {
    /// The actor's ID.
    pub id: ActorId,
    /// Eye position at connect time.
    pub position: Vec3,
    /// Point to face at connect time. Defaults to straight ahead.
    #[serde(default)]
    pub look_at: Option<Vec3>,
    /// Preferred notification language.
    #[serde(default)]
    pub language: Option<String>,
}

/// A tied target placed in the world before the first tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    /// The target's ID.
    pub id: TargetId,
    /// Collider center.
    pub position: Vec3,
    /// Collider radius. Defaults to half a metre.
    #[serde(default = "default_radius")]
    pub radius: f32,
    /// Effect played when the target comes loose.
    #[serde(default)]
    pub freed_effect: Option<String>,
}

fn default_radius() -> f32 {
    0.5
}

/// Something that happens to the world or the grant table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Spawn the declared actor at its start pose.
    Connect { actor: ActorId },
    Disconnect { actor: ActorId },
    /// Set how far under water the actor is, `0.0..=1.0`.
    SetWaterFactor { actor: ActorId, water_factor: f32 },
    /// Turn the actor's eyes towards `point`.
    LookAt { actor: ActorId, point: Vec3 },
    PressUse { actor: ActorId },
    ReleaseUse { actor: ActorId },
    /// Grant the use permission directly.
    Grant { actor: ActorId },
    /// Revoke the direct use permission.
    Revoke { actor: ActorId },
    JoinGroup { actor: ActorId, group: String },
    LeaveGroup { actor: ActorId, group: String },
    /// Grant the use permission to a group.
    GrantGroup { group: String },
    /// Revoke the use permission from a group.
    RevokeGroup { group: String },
    /// Unload the module, stopping every monitor.
    Unload,
}

/// An action and the server time it happens at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Server time in seconds.
    pub at: f64,
    /// What happens.
    #[serde(flatten)]
    pub action: Action,
}

/// A full scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Actors that may connect.
    #[serde(default)]
    pub actors: Vec<ActorSpec>,
    /// Targets in the world from the start.
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
    /// Actors holding the use permission from the start.
    #[serde(default)]
    pub grants: Vec<ActorId>,
    /// Timed steps, in any order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    /// Parse a script and sort its steps by time.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, a step time is not a
    /// finite non-negative number, or a step names an undeclared actor.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut script: Self = serde_json::from_str(text).context("parsing script")?;
        script.check()?;
        script.steps.sort_by(|a, b| a.at.total_cmp(&b.at));
        Ok(script)
    }

    /// Read and parse a script file.
    ///
    /// # Errors
    ///
    /// See [`Script::from_json`].
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        Self::from_json(&text)
    }

    /// Look up an actor declaration.
    #[must_use]
    pub fn actor(&self, id: ActorId) -> Option<&ActorSpec> {
        self.actors.iter().find(|a| a.id == id)
    }

    /// Time of the last step, or zero for an empty script.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.steps.iter().map(|s| s.at).fold(0.0, f64::max)
    }

    fn check(&self) -> Result<()> {
        for step in &self.steps {
            if !step.at.is_finite() || step.at < 0.0 {
                bail!("step time {} must be a finite non-negative number", step.at);
            }
            if let Some(actor) = step.action.actor() {
                if self.actor(actor).is_none() {
                    bail!("step at {} refers to undeclared {actor}", step.at);
                }
            }
        }
        Ok(())
    }

    /// Two divers and two crates.
    ///
    /// Alice holds the permission directly and keeps the key down until her
    /// crate comes loose. Bob gets it through the `divers` group, lets go
    /// early, and tries again.
    #[must_use]
    pub fn demo() -> Self {
        let alice = ActorId(76561198000000001);
        let bob = ActorId(76561198000000002);
        let crate_a = Vec3::new(0.0, -8.0, 2.0);
        let crate_b = Vec3::new(10.0, -12.0, 2.5);

        let step = |at: f64, action: Action| Step { at, action };
        Self {
            actors: vec![
                ActorSpec {
                    id: alice,
                    position: Vec3::new(0.0, -8.0, 0.0),
                    look_at: Some(crate_a),
                    language: None,
                },
                ActorSpec {
                    id: bob,
                    position: Vec3::new(10.0, -12.0, 0.0),
                    look_at: None,
                    language: None,
                },
            ],
            targets: vec![
                TargetSpec {
                    id: TargetId(1),
                    position: crate_a,
                    radius: default_radius(),
                    freed_effect: Some(FREED_EFFECT.to_string()),
                },
                TargetSpec {
                    id: TargetId(2),
                    position: crate_b,
                    radius: default_radius(),
                    freed_effect: Some(FREED_EFFECT.to_string()),
                },
            ],
            grants: vec![alice],
            steps: vec![
                step(0.0, Action::Connect { actor: alice }),
                step(0.0, Action::Connect { actor: bob }),
                step(0.5, Action::SetWaterFactor { actor: alice, water_factor: 1.0 }),
                step(0.5, Action::SetWaterFactor { actor: bob, water_factor: 1.0 }),
                step(1.0, Action::GrantGroup { group: "divers".to_string() }),
                step(1.0, Action::JoinGroup { actor: bob, group: "divers".to_string() }),
                step(2.0, Action::LookAt { actor: bob, point: crate_b }),
                step(6.0, Action::PressUse { actor: alice }),
                step(6.0, Action::PressUse { actor: bob }),
                step(6.5, Action::ReleaseUse { actor: bob }),
                step(8.0, Action::PressUse { actor: bob }),
                step(12.0, Action::ReleaseUse { actor: alice }),
                step(12.0, Action::ReleaseUse { actor: bob }),
                step(13.0, Action::Disconnect { actor: bob }),
                step(14.0, Action::Unload),
            ],
        }
    }
}

impl Action {
    /// The actor a step acts on, if any.
    #[must_use]
    pub fn actor(&self) -> Option<ActorId> {
        match self {
            Self::Connect { actor }
            | Self::Disconnect { actor }
            | Self::SetWaterFactor { actor, .. }
            | Self::LookAt { actor, .. }
            | Self::PressUse { actor }
            | Self::ReleaseUse { actor }
            | Self::Grant { actor }
            | Self::Revoke { actor }
            | Self::JoinGroup { actor, .. }
            | Self::LeaveGroup { actor, .. } => Some(*actor),
            Self::GrantGroup { .. } | Self::RevokeGroup { .. } | Self::Unload => None,
        }
    }
}
