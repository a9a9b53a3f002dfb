use std::collections::BTreeMap;
use std::fmt;

use engine::{GameState, GameStateMachine, StageDef};
use tracing::{debug, error, info, warn};

use super::gameplay_state::{GameplayState, LevelSnapshot};
use super::items::ItemCatalog;
use super::progress::ProgressStore;
use super::stage::{StageConfig, StageRuntime};
use super::turns::TurnPipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    AlreadyLoaded,
    /// Stage index was out of range: progress reset to 0 and the session routed to the menu.
    ProgressReset,
    ConfigError,
}

/// Owns the campaign order, the one instantiated stage and the per-stage snapshots.
pub struct StageManager {
    stages: Vec<StageDef>,
    current_index: usize,
    current: Option<StageRuntime>,
    snapshots: BTreeMap<usize, LevelSnapshot>,
    progress: Box<dyn ProgressStore>,
    config: StageConfig,
}

impl fmt::Debug for StageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageManager")
            .field("stages", &self.stages.len())
            .field("current_index", &self.current_index)
            .field("loaded", &self.current.is_some())
            .field("snapshots", &self.snapshots.len())
            .finish()
    }
}

impl StageManager {
    pub fn new(
        stages: Vec<StageDef>,
        progress: Box<dyn ProgressStore>,
        config: StageConfig,
    ) -> Self {
        Self {
            stages,
            current_index: 0,
            current: None,
            snapshots: BTreeMap::new(),
            progress,
            config,
        }
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_stage(&self) -> Option<&StageRuntime> {
        self.current.as_ref()
    }

    pub fn current_stage_mut(&mut self) -> Option<&mut StageRuntime> {
        self.current.as_mut()
    }

    pub fn snapshot(&self, index: usize) -> Option<&LevelSnapshot> {
        self.snapshots.get(&index)
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn has_saved_progress(&self) -> bool {
        self.load_progress() > 0
    }

    /// Instantiates the current stage unless one already is. Only a fresh instantiation runs
    /// stage-start initialization and the snapshot capture/restore.
    pub fn load_current_stage(
        &mut self,
        catalog: &ItemCatalog,
        gameplay: &mut GameplayState,
        machine: &mut GameStateMachine,
    ) -> LoadOutcome {
        if self.stages.is_empty() {
            error!("stage_list_empty");
            return LoadOutcome::ConfigError;
        }
        if self.current_index >= self.stages.len() {
            warn!(
                index = self.current_index,
                stage_count = self.stages.len(),
                "stage_index_out_of_range_progress_reset"
            );
            self.current_index = 0;
            self.snapshots.clear();
            self.persist_progress();
            machine.change_state(GameState::MainMenu);
            return LoadOutcome::ProgressReset;
        }
        if self.current.is_some() {
            debug!(index = self.current_index, "stage_already_loaded");
            return LoadOutcome::AlreadyLoaded;
        }

        let index = self.current_index;
        let def = &self.stages[index];
        let mut stage = match StageRuntime::instantiate(index, def, catalog, &self.config) {
            Ok(stage) => stage,
            Err(err) => {
                error!(index, error = %err, "stage_instantiate_failed");
                return LoadOutcome::ConfigError;
            }
        };
        stage.attach_followers(gameplay.turns_mut());
        gameplay.start_level(index, stage.label());
        match self.snapshots.get(&index) {
            Some(snapshot) => gameplay.restore_snapshot(snapshot, Some(&mut stage)),
            None => {
                self.snapshots.insert(index, gameplay.capture_snapshot());
                debug!(index, "snapshot_captured");
            }
        }
        info!(index, stage = %stage.def_name(), "stage_loaded");
        self.current = Some(stage);
        LoadOutcome::Loaded
    }

    /// Destroys the instantiated stage, if any.
    pub fn unload_current_stage(&mut self, turns: Option<&mut TurnPipeline>) -> bool {
        let Some(mut stage) = self.current.take() else {
            return false;
        };
        if let Some(turns) = turns {
            stage.detach_followers(turns);
        }
        info!(index = stage.index(), stage = %stage.def_name(), "stage_unloaded");
        true
    }

    pub fn advance_stage(
        &mut self,
        catalog: &ItemCatalog,
        gameplay: &mut GameplayState,
        machine: &mut GameStateMachine,
    ) -> LoadOutcome {
        self.unload_current_stage(Some(gameplay.turns_mut()));
        self.current_index = self.current_index.saturating_add(1);
        self.persist_progress();
        if self.current_index >= self.stages.len() {
            info!(stage_count = self.stages.len(), "campaign_completed");
        }
        self.load_current_stage(catalog, gameplay, machine)
    }

    pub fn start_new_game(
        &mut self,
        catalog: &ItemCatalog,
        gameplay: &mut GameplayState,
        machine: &mut GameStateMachine,
    ) -> LoadOutcome {
        self.unload_current_stage(Some(gameplay.turns_mut()));
        self.current_index = 0;
        self.snapshots.clear();
        self.persist_progress();
        info!("new_game_started");
        self.load_current_stage(catalog, gameplay, machine)
    }

    pub fn continue_game(
        &mut self,
        catalog: &ItemCatalog,
        gameplay: &mut GameplayState,
        machine: &mut GameStateMachine,
    ) -> LoadOutcome {
        self.unload_current_stage(Some(gameplay.turns_mut()));
        self.current_index = self.load_progress();
        info!(index = self.current_index, "game_continued");
        self.load_current_stage(catalog, gameplay, machine)
    }

    /// Reloads the current stage from its snapshot. Progress is not written.
    pub fn restart_current_stage(
        &mut self,
        catalog: &ItemCatalog,
        gameplay: &mut GameplayState,
        machine: &mut GameStateMachine,
    ) -> LoadOutcome {
        self.unload_current_stage(Some(gameplay.turns_mut()));
        info!(index = self.current_index, "stage_restarted");
        self.load_current_stage(catalog, gameplay, machine)
    }

    pub fn save_snapshot_for_current_stage(&mut self, snapshot: LevelSnapshot) {
        debug!(index = self.current_index, "snapshot_saved");
        self.snapshots.insert(self.current_index, snapshot);
    }

    fn load_progress(&self) -> usize {
        match self.progress.load() {
            Ok(index) => index,
            Err(err) => {
                warn!(error = %err, "progress_load_failed");
                0
            }
        }
    }

    fn persist_progress(&mut self) {
        if let Err(err) = self.progress.save(self.current_index) {
            warn!(error = %err, "progress_save_failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use engine::compile_defs_from_str;

    use super::*;
    use crate::app::gameplay::progress::MemoryProgressStore;
    use crate::app::gameplay::stage::tests::snapping_config;

    const DEFS: &str = r#"<Defs>
        <ItemDef><defName>gem</defName><label>Gem</label></ItemDef>
        <StageDef>
            <defName>one</defName><label>One</label>
            <layout><row>P.</row></layout>
            <pickups><pickup x="1" y="0" item="gem"/></pickups>
        </StageDef>
        <StageDef>
            <defName>two</defName><label>Two</label>
            <layout><row>.P</row></layout>
        </StageDef>
    </Defs>"#;

    struct Fixture {
        catalog: Rc<ItemCatalog>,
        manager: StageManager,
        gameplay: GameplayState,
        machine: GameStateMachine,
        progress: MemoryProgressStore,
    }

    fn fixture(saved: usize) -> Fixture {
        let defs = compile_defs_from_str("test.xml", DEFS).expect("defs");
        let catalog = Rc::new(ItemCatalog::from_defs(&defs).expect("catalog"));
        let progress = MemoryProgressStore::with_value(saved);
        let stages = defs.campaign().cloned().collect();
        Fixture {
            manager: StageManager::new(stages, Box::new(progress.clone()), snapping_config()),
            gameplay: GameplayState::new(1, Rc::clone(&catalog), 3),
            machine: GameStateMachine::new(GameState::Playing),
            catalog,
            progress,
        }
    }

    impl Fixture {
        fn load(&mut self) -> LoadOutcome {
            self.manager
                .load_current_stage(&self.catalog, &mut self.gameplay, &mut self.machine)
        }
    }

    #[test]
    fn empty_campaign_is_a_configuration_error() {
        let mut fx = fixture(0);
        fx.manager =
            StageManager::new(Vec::new(), Box::new(fx.progress.clone()), snapping_config());
        assert_eq!(fx.load(), LoadOutcome::ConfigError);
        assert!(fx.manager.current_stage().is_none());
        assert_eq!(fx.machine.current(), GameState::Playing);
    }

    #[test]
    fn second_load_is_a_no_op() {
        let mut fx = fixture(0);
        assert_eq!(fx.load(), LoadOutcome::Loaded);
        fx.gameplay.turns_mut().set_move_count(5);
        assert_eq!(fx.load(), LoadOutcome::AlreadyLoaded);
        assert_eq!(fx.gameplay.move_count(), 5);
        assert_eq!(fx.manager.snapshot_count(), 1);
    }

    #[test]
    fn corrupt_progress_resets_and_routes_to_menu() {
        let mut fx = fixture(7);
        let outcome = fx
            .manager
            .continue_game(&fx.catalog, &mut fx.gameplay, &mut fx.machine);
        assert_eq!(outcome, LoadOutcome::ProgressReset);
        assert_eq!(fx.manager.current_index(), 0);
        assert_eq!(fx.manager.snapshot_count(), 0);
        assert_eq!(fx.progress.value(), 0);
        assert_eq!(fx.machine.current(), GameState::MainMenu);
    }

    #[test]
    fn advance_persists_but_restart_does_not() {
        let mut fx = fixture(0);
        fx.load();
        fx.manager
            .advance_stage(&fx.catalog, &mut fx.gameplay, &mut fx.machine);
        assert_eq!(fx.progress.value(), 1);
        let saves = fx.progress.save_count();

        fx.manager
            .restart_current_stage(&fx.catalog, &mut fx.gameplay, &mut fx.machine);
        assert_eq!(fx.progress.save_count(), saves);
        assert_eq!(fx.manager.current_stage().map(StageRuntime::index), Some(1));
    }

    #[test]
    fn explicit_snapshot_is_restored_on_next_load() {
        let mut fx = fixture(0);
        fx.load();
        let gem = fx.catalog.require("gem").expect("gem");
        fx.manager.save_snapshot_for_current_stage(LevelSnapshot {
            items: vec![Some(gem.clone()), None, None],
            move_count: 3,
            has_key: true,
        });

        fx.manager
            .restart_current_stage(&fx.catalog, &mut fx.gameplay, &mut fx.machine);
        assert_eq!(fx.gameplay.inventory().item_at(0), Some(&gem));
        assert_eq!(fx.gameplay.move_count(), 3);
        assert!(fx.gameplay.inventory().has_key());
    }

    #[test]
    fn unload_detaches_followers_and_clears_stage() {
        let mut fx = fixture(0);
        fx.load();
        assert!(fx.manager.unload_current_stage(Some(fx.gameplay.turns_mut())));
        assert!(!fx.manager.unload_current_stage(None));
        assert_eq!(fx.gameplay.turns().player_moved_subscribers(), 0);
    }
}
