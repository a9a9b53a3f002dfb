use tracing::debug;

use super::effects::EffectContext;
use super::inventory::{Inventory, InventoryEvent};
use super::items::ItemRef;

/// Items that entered or left the inventory between two observations.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InventoryDiff {
    pub picked_up: Vec<ItemRef>,
    pub removed: Vec<ItemRef>,
}

/// Watches inventory mutations and fires effect hooks.
///
/// Membership is by item identity with set semantics: an item held in two slots counts once,
/// so losing one copy while keeping the other fires nothing.
#[derive(Debug, Default)]
pub struct ItemEffectEngine {
    previous: Vec<ItemRef>,
}

impl ItemEffectEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observed(&self) -> &[ItemRef] {
        &self.previous
    }

    /// Compares `slots` against the last observation and records `slots` as the new one.
    pub fn diff(&mut self, slots: &[Option<ItemRef>]) -> InventoryDiff {
        let current = unique_items(slots);
        let picked_up = current
            .iter()
            .filter(|item| !self.previous.contains(item))
            .cloned()
            .collect();
        let removed = self
            .previous
            .iter()
            .filter(|item| !current.contains(item))
            .cloned()
            .collect();
        self.previous = current;
        InventoryDiff { picked_up, removed }
    }

    /// Drains queued inventory events in order: "used" activates the item, "changed" runs the
    /// diff and fires pickup/remove hooks.
    pub(crate) fn dispatch(&mut self, inventory: &mut Inventory, cx: &mut EffectContext<'_>) {
        for event in inventory.drain_events() {
            match event {
                InventoryEvent::Used(used) => {
                    if let Some(effect) = &used.item.effect {
                        debug!(item = %used.item.def_name, slot = used.slot, "item_effect_activated");
                        effect.activate(used.slot, cx);
                    }
                }
                InventoryEvent::Changed => {
                    let diff = self.diff(inventory.slots());
                    for item in &diff.removed {
                        if let Some(effect) = &item.effect {
                            effect.on_remove(cx);
                        }
                    }
                    for item in &diff.picked_up {
                        if let Some(effect) = &item.effect {
                            effect.on_pickup(cx);
                        }
                    }
                }
            }
        }
    }

    /// Runs every held item's per-turn hook once, in slot order.
    pub(crate) fn on_turn_passed(&self, inventory: &Inventory, cx: &mut EffectContext<'_>) {
        for item in inventory.items() {
            if let Some(effect) = &item.effect {
                effect.on_turn_update(cx);
            }
        }
    }
}

fn unique_items(slots: &[Option<ItemRef>]) -> Vec<ItemRef> {
    let mut items: Vec<ItemRef> = Vec::with_capacity(slots.len());
    for item in slots.iter().flatten() {
        if !items.contains(item) {
            items.push(item.clone());
        }
    }
    items
}
