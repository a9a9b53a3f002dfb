use std::rc::Rc;

use engine::{Direction, GameState, Signal};
use tracing::{debug, info, warn};

use super::effects::{DeferredAction, EffectContext, PlayerAbilities};
use super::inventory::Inventory;
use super::item_effects::ItemEffectEngine;
use super::items::{ItemCatalog, ItemRef};
use super::stage::StageRuntime;
use super::turns::{PlayerMoved, TurnPipeline};

/// Captured starting condition of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelSnapshot {
    pub items: Vec<Option<ItemRef>>,
    pub move_count: u32,
    pub has_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelChanged {
    pub stage_index: usize,
    pub label: String,
}

/// Per-run gameplay state: inventory, effect engine, turn counter and abilities.
///
/// Recreated whenever the session returns to the main menu or hits game over. `generation`
/// lets observers notice the swap.
#[derive(Debug)]
pub struct GameplayState {
    generation: u64,
    catalog: Rc<ItemCatalog>,
    inventory: Inventory,
    effects: ItemEffectEngine,
    turns: TurnPipeline,
    abilities: PlayerAbilities,
    level_changed: Signal<LevelChanged>,
    level: Option<LevelChanged>,
    deferred: Vec<DeferredAction>,
}

impl GameplayState {
    pub fn new(generation: u64, catalog: Rc<ItemCatalog>, inventory_capacity: usize) -> Self {
        debug!(generation, inventory_capacity, "gameplay_state_created");
        Self {
            generation,
            catalog,
            inventory: Inventory::new(inventory_capacity),
            effects: ItemEffectEngine::new(),
            turns: TurnPipeline::new(),
            abilities: PlayerAbilities::default(),
            level_changed: Signal::default(),
            level: None,
            deferred: Vec::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.inventory
    }

    pub fn turns(&self) -> &TurnPipeline {
        &self.turns
    }

    pub fn turns_mut(&mut self) -> &mut TurnPipeline {
        &mut self.turns
    }

    pub fn abilities(&self) -> PlayerAbilities {
        self.abilities
    }

    pub fn move_count(&self) -> u32 {
        self.turns.move_count()
    }

    pub fn stage_index(&self) -> Option<usize> {
        self.level.as_ref().map(|level| level.stage_index)
    }

    pub fn level(&self) -> Option<&LevelChanged> {
        self.level.as_ref()
    }

    pub fn on_level_changed(&mut self) -> &mut Signal<LevelChanged> {
        &mut self.level_changed
    }

    /// Stage-start initialization: resets the move counter and announces the level.
    pub fn start_level(&mut self, stage_index: usize, label: &str) {
        self.turns.reset_moves();
        self.deferred.clear();
        info!(stage_index, label, "level_started");
        let level = LevelChanged {
            stage_index,
            label: label.to_string(),
        };
        self.level_changed.notify(&level);
        self.level = Some(level);
    }

    pub fn capture_snapshot(&self) -> LevelSnapshot {
        LevelSnapshot {
            items: self.inventory.slots().to_vec(),
            move_count: self.turns.move_count(),
            has_key: self.inventory.has_key(),
        }
    }

    pub fn restore_snapshot(
        &mut self,
        snapshot: &LevelSnapshot,
        stage: Option<&mut StageRuntime>,
    ) {
        self.inventory.set_state(&snapshot.items, snapshot.has_key);
        self.turns.set_move_count(snapshot.move_count);
        self.dispatch_effects(stage);
        debug!(
            move_count = snapshot.move_count,
            has_key = snapshot.has_key,
            "snapshot_restored"
        );
    }

    pub fn add_item(&mut self, item: ItemRef, stage: Option<&mut StageRuntime>) -> Option<usize> {
        let slot = self.inventory.add_item(item);
        self.dispatch_effects(stage);
        slot
    }

    pub fn replace_item(
        &mut self,
        index: usize,
        item: Option<ItemRef>,
        stage: Option<&mut StageRuntime>,
    ) -> bool {
        let replaced = self.inventory.replace_item(index, item);
        self.dispatch_effects(stage);
        replaced
    }

    pub fn remove_item(
        &mut self,
        item: &ItemRef,
        stage: Option<&mut StageRuntime>,
    ) -> Option<usize> {
        let slot = self.inventory.remove_item(item);
        self.dispatch_effects(stage);
        slot
    }

    pub fn clear_inventory(&mut self, stage: Option<&mut StageRuntime>) {
        self.inventory.clear_inventory();
        self.dispatch_effects(stage);
    }

    pub fn gain_key(&mut self) {
        self.inventory.gain_key();
        self.dispatch_effects(None);
    }

    pub fn remove_key(&mut self) {
        self.inventory.remove_key();
        self.dispatch_effects(None);
    }

    /// Uses the Active item in `slot`. Passive and empty slots are rejected.
    pub fn activate_slot(&mut self, slot: usize, stage: Option<&mut StageRuntime>) -> bool {
        let Some(item) = self.inventory.item_at(slot) else {
            debug!(slot, "activate_empty_slot");
            return false;
        };
        if !item.is_active() {
            debug!(slot, item = %item.def_name, "activate_passive_item_rejected");
            return false;
        }
        if self.inventory.use_item_at(slot, true).is_none() {
            return false;
        }
        self.dispatch_effects(stage);
        true
    }

    /// Counts a turn, fans it out to followers, then runs per-turn item hooks.
    pub fn pass_turn(
        &mut self,
        state: GameState,
        direction: Direction,
        stage: &mut StageRuntime,
    ) -> Option<PlayerMoved> {
        let enemies_follow = self.abilities.follow_enemies;
        let moved = self
            .turns
            .notify_player_moved(state, direction, enemies_follow, stage)?;
        let mut cx = EffectContext {
            abilities: &mut self.abilities,
            stage: Some(stage),
            catalog: &self.catalog,
            deferred: &mut self.deferred,
        };
        self.effects.on_turn_passed(&self.inventory, &mut cx);
        Some(moved)
    }

    /// Runs work effects scheduled on an earlier frame. Returns the slots that received an
    /// item.
    pub fn run_deferred(&mut self, mut stage: Option<&mut StageRuntime>) -> Vec<usize> {
        let mut filled = Vec::new();
        for action in std::mem::take(&mut self.deferred) {
            match action {
                DeferredAction::PlaceActivator { item, slot } => {
                    let free_slot = slot.filter(|index| self.inventory.item_at(*index).is_none());
                    let placed = match free_slot {
                        Some(index) => self
                            .inventory
                            .replace_item(index, Some(item.clone()))
                            .then_some(index),
                        None => self.inventory.add_item(item.clone()),
                    };
                    match placed {
                        Some(index) => {
                            info!(item = %item.def_name, slot = index, "activator_placed");
                            filled.push(index);
                        }
                        None => warn!(item = %item.def_name, "activator_dropped_inventory_full"),
                    }
                    self.dispatch_effects(stage.as_deref_mut());
                }
            }
        }
        filled
    }

    fn dispatch_effects(&mut self, stage: Option<&mut StageRuntime>) {
        let mut cx = EffectContext {
            abilities: &mut self.abilities,
            stage,
            catalog: &self.catalog,
            deferred: &mut self.deferred,
        };
        self.effects.dispatch(&mut self.inventory, &mut cx);
    }
}

#[cfg(test)]
mod tests {
    use engine::compile_defs_from_str;

    use super::*;

    const ITEMS: &str = r#"<Defs>
        <ItemDef><defName>boots</defName><label>Boots</label><effect kind="WalkOnLava"/></ItemDef>
        <ItemDef>
            <defName>bell</defName><label>Bell</label><itemType>Active</itemType>
            <effect kind="ActivateEchoDoll"/>
        </ItemDef>
        <ItemDef><defName>gem</defName><label>Gem</label></ItemDef>
    </Defs>"#;

    fn state() -> GameplayState {
        let defs = compile_defs_from_str("items.xml", ITEMS).expect("defs");
        let catalog = ItemCatalog::from_defs(&defs).expect("catalog");
        GameplayState::new(1, Rc::new(catalog), 3)
    }

    fn item(state: &GameplayState, name: &str) -> ItemRef {
        state.catalog.require(name).expect("item")
    }

    #[test]
    fn snapshot_restore_replaces_inventory_and_counter() {
        let mut state = state();
        let boots = item(&state, "boots");
        state.start_level(0, "first");
        let snapshot = state.capture_snapshot();

        state.add_item(boots, None);
        state.gain_key();
        state.turns_mut().set_move_count(7);
        assert!(state.abilities().walk_on_lava);

        state.restore_snapshot(&snapshot, None);
        assert_eq!(state.capture_snapshot(), snapshot);
        assert!(!state.abilities().walk_on_lava);
    }

    #[test]
    fn only_active_items_can_be_activated() {
        let mut state = state();
        let gem = item(&state, "gem");
        let bell = item(&state, "bell");
        state.add_item(gem, None);
        state.add_item(bell, None);

        assert!(!state.activate_slot(0, None));
        assert!(!state.activate_slot(2, None));
        assert!(state.activate_slot(1, None));
        assert!(state.inventory().item_at(1).is_none());
        assert!(state.inventory().item_at(0).is_some());
    }

    #[test]
    fn start_level_resets_moves_and_announces() {
        let mut state = state();
        state.turns_mut().set_move_count(4);
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        state
            .on_level_changed()
            .subscribe(move |event, _| sink.borrow_mut().push(event.stage_index));

        state.start_level(2, "third");
        assert_eq!(state.move_count(), 0);
        assert_eq!(state.stage_index(), Some(2));
        assert_eq!(*seen.borrow(), vec![2]);
    }
}
