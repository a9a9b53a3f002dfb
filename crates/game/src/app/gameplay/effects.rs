use serde::Serialize;
use tracing::{debug, info, warn};

use super::items::{ItemCatalog, ItemRef};
use super::stage::StageRuntime;

/// Capabilities granted by held items. Owned by the gameplay state, so they survive
/// stage reloads and reset when gameplay is torn down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlayerAbilities {
    pub walk_on_lava: bool,
    pub walk_on_pink_lava: bool,
    pub push_boulders: bool,
    pub follow_enemies: bool,
}

/// Behavior attached to an item definition. Stateless: every hook works on the context it is
/// handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemEffect {
    WalkOnLava,
    WalkOnPinkLava,
    Strength,
    EnableFollowEnemies,
    PlaceTrap,
    PlaceEchoDoll { activator: String },
    ActivateEchoDoll,
}

/// Work an effect schedules for the frame after it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DeferredAction {
    PlaceActivator {
        item: ItemRef,
        slot: Option<usize>,
    },
}

pub(crate) struct EffectContext<'a> {
    pub(crate) abilities: &'a mut PlayerAbilities,
    pub(crate) stage: Option<&'a mut StageRuntime>,
    pub(crate) catalog: &'a ItemCatalog,
    pub(crate) deferred: &'a mut Vec<DeferredAction>,
}

impl ItemEffect {
    fn ability_flag<'a>(&self, abilities: &'a mut PlayerAbilities) -> Option<&'a mut bool> {
        match self {
            ItemEffect::WalkOnLava => Some(&mut abilities.walk_on_lava),
            ItemEffect::WalkOnPinkLava => Some(&mut abilities.walk_on_pink_lava),
            ItemEffect::Strength => Some(&mut abilities.push_boulders),
            ItemEffect::EnableFollowEnemies => Some(&mut abilities.follow_enemies),
            ItemEffect::PlaceTrap
            | ItemEffect::PlaceEchoDoll { .. }
            | ItemEffect::ActivateEchoDoll => None,
        }
    }

    pub(crate) fn on_pickup(&self, cx: &mut EffectContext<'_>) {
        if let Some(flag) = self.ability_flag(cx.abilities) {
            *flag = true;
            debug!(effect = ?self, "ability_granted");
        }
    }

    pub(crate) fn on_remove(&self, cx: &mut EffectContext<'_>) {
        if let Some(flag) = self.ability_flag(cx.abilities) {
            *flag = false;
            debug!(effect = ?self, "ability_revoked");
        }
    }

    /// `slot` is the inventory slot the item was used from.
    pub(crate) fn activate(&self, slot: usize, cx: &mut EffectContext<'_>) {
        match self {
            ItemEffect::PlaceTrap => {
                let Some(stage) = cx.stage.as_deref_mut() else {
                    warn!("trap_placement_without_stage");
                    return;
                };
                if let Some(cell) = stage.place_trap() {
                    info!(x = cell.x, y = cell.y, "trap_placed");
                }
            }
            ItemEffect::PlaceEchoDoll { activator } => {
                let Some(stage) = cx.stage.as_deref_mut() else {
                    warn!("echo_doll_placement_without_stage");
                    return;
                };
                let Some(cell) = stage.place_echo_doll() else {
                    return;
                };
                info!(x = cell.x, y = cell.y, "echo_doll_placed");
                match cx.catalog.get(activator) {
                    Some(item) => cx.deferred.push(DeferredAction::PlaceActivator {
                        item,
                        slot: Some(slot),
                    }),
                    None => warn!(activator = %activator, "echo_doll_activator_missing"),
                }
            }
            ItemEffect::ActivateEchoDoll => {
                let enabled = cx
                    .stage
                    .as_deref_mut()
                    .is_some_and(|stage| stage.enable_echo_doll());
                if enabled {
                    info!("echo_doll_movement_enabled");
                } else {
                    warn!("no_placed_echo_doll_to_activate");
                }
            }
            ItemEffect::WalkOnLava
            | ItemEffect::WalkOnPinkLava
            | ItemEffect::Strength
            | ItemEffect::EnableFollowEnemies => {}
        }
    }

    /// Per-turn hook. None of the shipped effects react to turns yet.
    pub(crate) fn on_turn_update(&self, _cx: &mut EffectContext<'_>) {}
}
