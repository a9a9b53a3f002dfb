use std::rc::Rc;

use engine::{
    DefDatabase, Direction, GameState, GameStateMachine, InputAction, InputSnapshot, StageDef,
};
use serde::Serialize;
use tracing::{debug, info};

use super::audio::{AudioSink, SoundEffect};
use super::effects::PlayerAbilities;
use super::gameplay_state::GameplayState;
use super::inventory::DEFAULT_INVENTORY_CAPACITY;
use super::items::{CatalogError, ItemCatalog};
use super::presenter::{HudModel, HudPresenter};
use super::progress::ProgressStore;
use super::stage::{StageConfig, StageDump, StageEvent, StageRuntime};
use super::stage_manager::{LoadOutcome, StageManager};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerControlConfig {
    /// Input lockout after an accepted step.
    pub move_cooldown_seconds: f32,
}

impl Default for PlayerControlConfig {
    fn default() -> Self {
        Self {
            move_cooldown_seconds: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub inventory_capacity: usize,
    pub stage: StageConfig,
    pub player: PlayerControlConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inventory_capacity: DEFAULT_INVENTORY_CAPACITY,
            stage: StageConfig::default(),
            player: PlayerControlConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageCommand {
    NewGame,
    Continue,
    Retry,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDump {
    pub state: GameState,
    pub stage_index: usize,
    pub stage_count: usize,
    pub move_count: Option<u32>,
    pub has_key: Option<bool>,
    pub slots: Vec<Option<String>>,
    pub selected_slot: Option<usize>,
    pub abilities: Option<PlayerAbilities>,
    pub snapshots: usize,
    pub stage: Option<StageDump>,
    pub hud: HudModel,
}

/// Composition root: owns every service and drives one frame at a time.
pub struct GameSession {
    config: SessionConfig,
    catalog: Rc<ItemCatalog>,
    machine: GameStateMachine,
    stages: StageManager,
    gameplay: Option<GameplayState>,
    next_generation: u64,
    presenter: HudPresenter,
    audio: Box<dyn AudioSink>,
    selected_slot: Option<usize>,
    move_cooldown_seconds: f32,
}

impl GameSession {
    pub fn new(
        config: SessionConfig,
        catalog: ItemCatalog,
        stages: Vec<StageDef>,
        progress: Box<dyn ProgressStore>,
        audio: Box<dyn AudioSink>,
    ) -> Self {
        let mut machine = GameStateMachine::default();
        let presenter = HudPresenter::new(&mut machine);
        info!(
            stages = stages.len(),
            items = catalog.len(),
            "session_created"
        );
        Self {
            config,
            catalog: Rc::new(catalog),
            machine,
            stages: StageManager::new(stages, progress, config.stage),
            gameplay: None,
            next_generation: 0,
            presenter,
            audio,
            selected_slot: None,
            move_cooldown_seconds: 0.0,
        }
    }

    pub fn from_defs(
        config: SessionConfig,
        defs: &DefDatabase,
        progress: Box<dyn ProgressStore>,
        audio: Box<dyn AudioSink>,
    ) -> Result<Self, CatalogError> {
        let catalog = ItemCatalog::from_defs(defs)?;
        let stages = defs.campaign().cloned().collect();
        Ok(Self::new(config, catalog, stages, progress, audio))
    }

    pub fn state(&self) -> GameState {
        self.machine.current()
    }

    #[cfg(test)]
    pub(crate) fn machine_mut(&mut self) -> &mut GameStateMachine {
        &mut self.machine
    }

    pub fn gameplay(&self) -> Option<&GameplayState> {
        self.gameplay.as_ref()
    }

    pub fn stages(&self) -> &StageManager {
        &self.stages
    }

    pub fn stage(&self) -> Option<&StageRuntime> {
        self.stages.current_stage()
    }

    pub fn selected_slot(&self) -> Option<usize> {
        self.selected_slot
    }

    pub fn can_continue(&self) -> bool {
        self.stages.has_saved_progress()
    }

    pub fn new_game(&mut self) -> LoadOutcome {
        self.run_stage_command(StageCommand::NewGame)
    }

    /// Offered only when persisted progress is past the first stage.
    pub fn continue_game(&mut self) -> Option<LoadOutcome> {
        if !self.can_continue() {
            debug!("continue_unavailable");
            return None;
        }
        Some(self.run_stage_command(StageCommand::Continue))
    }

    pub fn retry(&mut self) -> LoadOutcome {
        self.run_stage_command(StageCommand::Retry)
    }

    pub fn toggle_pause(&mut self) {
        match self.machine.current() {
            GameState::Playing => self.transition(GameState::Paused),
            GameState::Paused => self.transition(GameState::Playing),
            GameState::GameOver => self.transition(GameState::MainMenu),
            GameState::MainMenu => debug!("pause_ignored_in_menu"),
        }
    }

    pub fn to_main_menu(&mut self) {
        self.transition(GameState::MainMenu);
    }

    pub fn select_slot(&mut self, slot: usize) -> bool {
        if slot >= self.config.inventory_capacity {
            debug!(slot, "select_slot_out_of_range");
            return false;
        }
        self.selected_slot = Some(slot);
        true
    }

    /// Uses the selected slot's item.
    pub fn activate_selected(&mut self) -> bool {
        let Some(slot) = self.selected_slot else {
            debug!("activate_without_selection");
            return false;
        };
        let Some(gameplay) = self.gameplay.as_mut() else {
            return false;
        };
        let used = gameplay.activate_slot(slot, self.stages.current_stage_mut());
        if used {
            self.audio.play(SoundEffect::ItemUsed);
        }
        used
    }

    /// Answers an open replace offer: `Some(slot)` swaps the pickup into that slot, `None`
    /// declines it.
    pub fn resolve_replace(&mut self, choice: Option<usize>) -> bool {
        let (Some(gameplay), Some(stage)) =
            (self.gameplay.as_mut(), self.stages.current_stage_mut())
        else {
            return false;
        };
        let Some((pickup, item)) = stage.replace_offer() else {
            debug!("no_replace_offer_open");
            return false;
        };
        let Some(slot) = choice else {
            stage.cancel_replace_offer();
            return false;
        };
        if !gameplay.replace_item(slot, Some(item), Some(&mut *stage)) {
            return false;
        }
        stage.remove_entity(pickup);
        self.audio.play(SoundEffect::ItemAdded);
        true
    }

    /// Runs one frame.
    pub fn update(&mut self, input: &InputSnapshot, dt_seconds: f32) {
        if input.is_down(InputAction::Pause) {
            self.toggle_pause();
        }
        if self.machine.current() == GameState::Playing {
            self.update_playing(input, dt_seconds);
        }
        self.presenter.tick(dt_seconds, self.gameplay.as_mut());
    }

    fn update_playing(&mut self, input: &InputSnapshot, dt_seconds: f32) {
        let scaled_dt = dt_seconds * self.machine.time_scale();
        self.move_cooldown_seconds = (self.move_cooldown_seconds - scaled_dt).max(0.0);

        if let Some(gameplay) = self.gameplay.as_mut() {
            gameplay.run_deferred(self.stages.current_stage_mut());
        }

        if let Some(slot) = input.selected_slot() {
            let offer_open = self
                .stages
                .current_stage()
                .is_some_and(|stage| stage.replace_offer().is_some());
            if offer_open {
                self.resolve_replace(Some(slot));
            } else {
                self.select_slot(slot);
            }
        }

        if input.is_down(InputAction::ActivateItem) {
            let story = self.stage().is_some_and(StageRuntime::is_story);
            if story {
                self.audio.play(SoundEffect::StoryAdvance);
                self.advance_stage();
                return;
            }
            self.activate_selected();
        }

        if let Some(direction) = Direction::from_input_vector(input.move_vector()) {
            self.step(direction);
        }

        let events = match self.stages.current_stage_mut() {
            Some(stage) => {
                stage.tick(scaled_dt);
                stage.drain_events()
            }
            None => Vec::new(),
        };
        self.apply_stage_events(events);
    }

    /// One input step for the player and then the doll. Counts a single turn when either
    /// moved.
    fn step(&mut self, direction: Direction) {
        if self.move_cooldown_seconds > 0.0 {
            debug!(remaining = self.move_cooldown_seconds, "move_on_cooldown");
            return;
        }
        let state = self.machine.current();
        let (Some(gameplay), Some(stage)) =
            (self.gameplay.as_mut(), self.stages.current_stage_mut())
        else {
            return;
        };
        let can_push = gameplay.abilities().push_boulders;
        let player_moved = stage.step_player(direction, can_push);
        let doll_moved = stage.step_doll(direction, can_push);
        if player_moved || doll_moved {
            gameplay.pass_turn(state, direction, stage);
            self.move_cooldown_seconds = self.config.player.move_cooldown_seconds;
        }
    }

    fn apply_stage_events(&mut self, events: Vec<StageEvent>) {
        let stage_index = self.stages.current_index();
        for event in events {
            if self.machine.current() != GameState::Playing
                || self.stages.current_index() != stage_index
                || self.stages.current_stage().is_none()
            {
                break;
            }
            self.apply_stage_event(event);
        }
    }

    fn apply_stage_event(&mut self, event: StageEvent) {
        let (Some(gameplay), Some(stage)) =
            (self.gameplay.as_mut(), self.stages.current_stage_mut())
        else {
            return;
        };
        match event {
            StageEvent::AvatarTouchedEnemy { avatar, enemy } => {
                info!(avatar = avatar.label(), enemy = enemy.0, "avatar_killed_by_enemy");
                self.die();
            }
            StageEvent::AvatarEnteredHazard { avatar, pink } => {
                let abilities = gameplay.abilities();
                let immune = if pink {
                    abilities.walk_on_pink_lava
                } else {
                    abilities.walk_on_lava
                };
                if immune {
                    debug!(avatar = avatar.label(), pink, "hazard_ignored");
                    return;
                }
                info!(avatar = avatar.label(), pink, "avatar_burned");
                self.die();
            }
            StageEvent::KeyTouched { key } => {
                gameplay.gain_key();
                stage.remove_entity(key);
                self.audio.play(SoundEffect::KeyGained);
            }
            StageEvent::PickupTouched { pickup } => {
                let Some(item) = stage.pickup_item(pickup) else {
                    return;
                };
                match gameplay.add_item(item, Some(&mut *stage)) {
                    Some(slot) => {
                        stage.remove_entity(pickup);
                        self.audio.play(SoundEffect::ItemAdded);
                        if self.selected_slot.is_none() {
                            self.selected_slot = Some(slot);
                        }
                    }
                    None => stage.open_replace_offer(pickup),
                }
            }
            StageEvent::GatewayTouched => {
                if !gameplay.inventory().has_key() {
                    info!("gateway_locked");
                    return;
                }
                gameplay.remove_key();
                self.audio.play(SoundEffect::Gateway);
                self.advance_stage();
            }
            StageEvent::InventoryClearTouched { tile } => {
                gameplay.clear_inventory(Some(&mut *stage));
                stage.remove_entity(tile);
                self.audio.play(SoundEffect::InventoryCleared);
            }
            StageEvent::EnemyTrapped { .. } => self.audio.play(SoundEffect::TrapKill),
            StageEvent::DoorToggled { .. } => self.audio.play(SoundEffect::Door),
        }
    }

    fn die(&mut self) {
        self.audio.play(SoundEffect::Death);
        self.transition(GameState::GameOver);
    }

    fn advance_stage(&mut self) {
        let Some(gameplay) = self.gameplay.as_mut() else {
            return;
        };
        let outcome = self
            .stages
            .advance_stage(&self.catalog, gameplay, &mut self.machine);
        self.handle_load_outcome(outcome);
    }

    fn run_stage_command(&mut self, command: StageCommand) -> LoadOutcome {
        self.teardown_gameplay();
        self.ensure_gameplay();
        let Some(gameplay) = self.gameplay.as_mut() else {
            return LoadOutcome::ConfigError;
        };
        let outcome = match command {
            StageCommand::NewGame => {
                self.stages
                    .start_new_game(&self.catalog, gameplay, &mut self.machine)
            }
            StageCommand::Continue => {
                self.stages
                    .continue_game(&self.catalog, gameplay, &mut self.machine)
            }
            StageCommand::Retry => {
                self.stages
                    .restart_current_stage(&self.catalog, gameplay, &mut self.machine)
            }
        };
        self.handle_load_outcome(outcome);
        if matches!(outcome, LoadOutcome::Loaded | LoadOutcome::AlreadyLoaded) {
            self.transition(GameState::Playing);
        }
        outcome
    }

    fn handle_load_outcome(&mut self, outcome: LoadOutcome) {
        if outcome == LoadOutcome::ProgressReset {
            self.teardown_gameplay();
        }
    }

    fn transition(&mut self, next: GameState) {
        if self.machine.change_state(next) {
            self.on_state_entered(next);
        }
    }

    fn on_state_entered(&mut self, state: GameState) {
        match state {
            GameState::MainMenu | GameState::GameOver => self.teardown_gameplay(),
            GameState::Playing => {
                self.ensure_gameplay();
                let Some(gameplay) = self.gameplay.as_mut() else {
                    return;
                };
                let outcome =
                    self.stages
                        .load_current_stage(&self.catalog, gameplay, &mut self.machine);
                self.handle_load_outcome(outcome);
            }
            GameState::Paused => {}
        }
    }

    fn ensure_gameplay(&mut self) {
        if self.gameplay.is_some() {
            return;
        }
        self.next_generation += 1;
        self.gameplay = Some(GameplayState::new(
            self.next_generation,
            Rc::clone(&self.catalog),
            self.config.inventory_capacity,
        ));
    }

    fn teardown_gameplay(&mut self) {
        let turns = self.gameplay.as_mut().map(GameplayState::turns_mut);
        self.stages.unload_current_stage(turns);
        if let Some(gameplay) = self.gameplay.take() {
            debug!(generation = gameplay.generation(), "gameplay_state_torn_down");
        }
        self.selected_slot = None;
        self.move_cooldown_seconds = 0.0;
    }

    pub fn hud_line(&self) -> String {
        self.presenter.render(self.selected_slot)
    }

    pub fn dump_state(&self) -> SessionDump {
        let gameplay = self.gameplay.as_ref();
        SessionDump {
            state: self.machine.current(),
            stage_index: self.stages.current_index(),
            stage_count: self.stages.stage_count(),
            move_count: gameplay.map(GameplayState::move_count),
            has_key: gameplay.map(|gameplay| gameplay.inventory().has_key()),
            slots: gameplay
                .map(|gameplay| {
                    gameplay
                        .inventory()
                        .slots()
                        .iter()
                        .map(|slot| slot.as_ref().map(|item| item.def_name.clone()))
                        .collect()
                })
                .unwrap_or_default(),
            selected_slot: self.selected_slot,
            abilities: gameplay.map(GameplayState::abilities),
            snapshots: self.stages.snapshot_count(),
            stage: self.stages.current_stage().map(StageRuntime::dump),
            hud: self.presenter.model(),
        }
    }
}
