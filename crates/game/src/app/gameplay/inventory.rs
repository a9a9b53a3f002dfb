use engine::{Signal, SubscriptionId};
use tracing::{debug, info};

use super::items::ItemRef;

pub const DEFAULT_INVENTORY_CAPACITY: usize = 3;

/// Presentation view of the slots after a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryChanged {
    pub labels: Vec<Option<String>>,
    pub has_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUsed {
    pub slot: usize,
    pub item: ItemRef,
}

/// Queued for the item effect engine, in mutation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InventoryEvent {
    Changed,
    Used(ItemUsed),
}

/// Fixed-capacity slot inventory plus the stage key flag.
#[derive(Debug)]
pub struct Inventory {
    slots: Vec<Option<ItemRef>>,
    has_key: bool,
    outbox: Vec<InventoryEvent>,
    changed: Signal<InventoryChanged>,
    used: Signal<ItemUsed>,
}

impl Inventory {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            has_key: false,
            outbox: Vec::new(),
            changed: Signal::default(),
            used: Signal::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Option<ItemRef>] {
        &self.slots
    }

    pub fn item_at(&self, index: usize) -> Option<&ItemRef> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Occupied slots in slot order.
    pub fn items(&self) -> impl Iterator<Item = &ItemRef> + '_ {
        self.slots.iter().flatten()
    }

    pub fn has_key(&self) -> bool {
        self.has_key
    }

    pub fn labels(&self) -> Vec<Option<String>> {
        self.slots
            .iter()
            .map(|slot| slot.as_ref().map(|item| item.label.clone()))
            .collect()
    }

    /// Places `item` in the first empty slot. `None` when every slot is occupied.
    pub fn add_item(&mut self, item: ItemRef) -> Option<usize> {
        let Some(index) = self.slots.iter().position(Option::is_none) else {
            debug!(item = %item.def_name, "inventory_full");
            return None;
        };
        info!(item = %item.def_name, slot = index, "item_added");
        self.slots[index] = Some(item);
        self.notify_changed();
        Some(index)
    }

    /// Overwrites slot `index`. Returns `false` only when the index is out of range.
    pub fn replace_item(&mut self, index: usize, item: Option<ItemRef>) -> bool {
        let Some(slot) = self.slots.get_mut(index) else {
            debug!(slot = index, "replace_slot_out_of_range");
            return false;
        };
        info!(
            slot = index,
            item = item.as_ref().map(|item| item.def_name.as_str()).unwrap_or("none"),
            "item_replaced"
        );
        *slot = item;
        self.notify_changed();
        true
    }

    /// Clears the first slot holding `item`.
    pub fn remove_item(&mut self, item: &ItemRef) -> Option<usize> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.as_ref() == Some(item))?;
        self.slots[index] = None;
        info!(item = %item.def_name, slot = index, "item_removed");
        self.notify_changed();
        Some(index)
    }

    /// Empties every slot. The key flag is left alone.
    pub fn clear_inventory(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        info!("inventory_cleared");
        self.notify_changed();
    }

    /// Announces use of the item in slot `index`, then clears the slot when
    /// `remove_after_use` is set.
    ///
    /// `ItemUsed` subscribers run before the slot is cleared. The effect activation is queued
    /// ahead of the change, so `ItemEffectEngine::dispatch` activates the item before it runs
    /// the removal diff.
    pub fn use_item_at(&mut self, index: usize, remove_after_use: bool) -> Option<ItemRef> {
        let item = self.item_at(index)?.clone();
        let event = ItemUsed {
            slot: index,
            item: item.clone(),
        };
        self.outbox.push(InventoryEvent::Used(event.clone()));
        self.used.notify(&event);
        if remove_after_use {
            self.slots[index] = None;
            self.notify_changed();
        }
        info!(
            item = %item.def_name,
            slot = index,
            removed = remove_after_use,
            "item_used"
        );
        Some(item)
    }

    /// Bulk replace used by snapshot restore. Fires exactly one change notification.
    pub fn set_state(&mut self, items: &[Option<ItemRef>], has_key: bool) {
        let capacity = self.slots.len();
        self.slots = items.iter().take(capacity).cloned().collect();
        self.slots.resize(capacity, None);
        self.has_key = has_key;
        debug!("inventory_state_restored");
        self.notify_changed();
    }

    pub fn gain_key(&mut self) {
        self.has_key = true;
        info!("key_gained");
        self.notify_changed();
    }

    pub fn remove_key(&mut self) {
        self.has_key = false;
        info!("key_removed");
        self.notify_changed();
    }

    pub fn on_changed(&mut self) -> &mut Signal<InventoryChanged> {
        &mut self.changed
    }

    pub fn on_item_used(&mut self) -> &mut Signal<ItemUsed> {
        &mut self.used
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.changed.unsubscribe(id) || self.used.unsubscribe(id)
    }

    pub(crate) fn drain_events(&mut self) -> Vec<InventoryEvent> {
        std::mem::take(&mut self.outbox)
    }

    fn notify_changed(&mut self) {
        self.outbox.push(InventoryEvent::Changed);
        let view = InventoryChanged {
            labels: self.labels(),
            has_key: self.has_key,
        };
        self.changed.notify(&view);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use engine::content::ItemType;

    use super::*;
    use crate::app::gameplay::items::ItemData;

    fn item(name: &str) -> ItemRef {
        ItemRef::new(ItemData {
            def_name: name.to_string(),
            label: name.to_uppercase(),
            description: String::new(),
            icon: None,
            item_type: ItemType::Active,
            effect: None,
        })
    }

    fn counting(inventory: &mut Inventory) -> Rc<RefCell<usize>> {
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        inventory
            .on_changed()
            .subscribe(move |_, _| *sink.borrow_mut() += 1);
        count
    }

    #[test]
    fn add_fills_first_empty_slot_until_full() {
        let mut inventory = Inventory::new(2);
        let (a, b, c) = (item("a"), item("b"), item("c"));
        assert_eq!(inventory.add_item(a.clone()), Some(0));
        assert_eq!(inventory.add_item(b), Some(1));
        assert_eq!(inventory.add_item(c), None);

        inventory.remove_item(&a);
        assert_eq!(inventory.add_item(item("d")), Some(0));
        assert_eq!(inventory.capacity(), 2);
    }

    #[test]
    fn replace_overwrites_and_rejects_out_of_range() {
        let mut inventory = Inventory::new(3);
        let a = item("a");
        assert!(inventory.replace_item(2, Some(a.clone())));
        assert_eq!(inventory.item_at(2), Some(&a));
        assert!(!inventory.replace_item(3, Some(a)));
    }

    #[test]
    fn remove_clears_only_the_first_matching_slot() {
        let mut inventory = Inventory::new(3);
        let a = item("a");
        inventory.add_item(a.clone());
        inventory.add_item(a.clone());
        assert_eq!(inventory.remove_item(&a), Some(0));
        assert_eq!(inventory.item_at(1), Some(&a));
        assert_eq!(inventory.remove_item(&item("a")), None);
    }

    #[test]
    fn use_with_removal_queues_used_then_one_change() {
        let mut inventory = Inventory::new(3);
        let a = item("a");
        inventory.add_item(a.clone());
        inventory.drain_events();
        let changes = counting(&mut inventory);

        assert_eq!(inventory.use_item_at(0, true), Some(a.clone()));
        assert!(inventory.item_at(0).is_none());
        assert_eq!(*changes.borrow(), 1);
        assert_eq!(
            inventory.drain_events(),
            vec![
                InventoryEvent::Used(ItemUsed { slot: 0, item: a }),
                InventoryEvent::Changed
            ]
        );
    }

    #[test]
    fn used_subscribers_run_before_the_slot_empties() {
        let mut inventory = Inventory::new(3);
        inventory.add_item(item("a"));
        let log = Rc::new(RefCell::new(Vec::new()));
        let used_log = Rc::clone(&log);
        inventory
            .on_item_used()
            .subscribe(move |used: &ItemUsed, _| {
                used_log.borrow_mut().push(format!("used {}", used.item.def_name));
            });
        let changed_log = Rc::clone(&log);
        inventory
            .on_changed()
            .subscribe(move |changed: &InventoryChanged, _| {
                changed_log
                    .borrow_mut()
                    .push(format!("changed {:?}", changed.labels[0]));
            });

        inventory.use_item_at(0, true);
        assert_eq!(
            *log.borrow(),
            vec!["used a".to_string(), "changed None".to_string()]
        );
    }

    #[test]
    fn use_without_removal_keeps_item_and_fires_no_change() {
        let mut inventory = Inventory::new(3);
        inventory.add_item(item("a"));
        let changes = counting(&mut inventory);
        assert!(inventory.use_item_at(0, false).is_some());
        assert!(inventory.item_at(0).is_some());
        assert_eq!(*changes.borrow(), 0);
    }

    #[test]
    fn use_of_empty_or_missing_slot_is_rejected() {
        let mut inventory = Inventory::new(3);
        assert_eq!(inventory.use_item_at(0, true), None);
        assert_eq!(inventory.use_item_at(9, true), None);
        assert!(inventory.drain_events().is_empty());
    }

    #[test]
    fn set_state_pads_to_capacity_with_one_notification() {
        let mut inventory = Inventory::new(3);
        let changes = counting(&mut inventory);
        inventory.set_state(&[Some(item("a"))], true);
        assert_eq!(inventory.slots().len(), 3);
        assert!(inventory.has_key());
        assert_eq!(*changes.borrow(), 1);
    }

    #[test]
    fn clear_keeps_key_flag() {
        let mut inventory = Inventory::new(3);
        inventory.add_item(item("a"));
        inventory.gain_key();
        inventory.clear_inventory();
        assert_eq!(inventory.items().count(), 0);
        assert!(inventory.has_key());
    }
}
