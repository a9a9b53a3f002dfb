use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

use engine::{DependencyWait, GameState, GameStateMachine, WaitStatus};
use serde::Serialize;
use tracing::debug;

use super::gameplay_state::GameplayState;

/// Everything the HUD shows, kept current by signal subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HudModel {
    pub state: GameState,
    pub stage_index: Option<usize>,
    pub level_label: Option<String>,
    pub move_count: u32,
    pub slots: Vec<Option<String>>,
    pub has_key: bool,
    pub last_used: Option<String>,
}

/// Text presentation layer. Starts before gameplay state exists and attaches once it does.
#[derive(Debug)]
pub struct HudPresenter {
    model: Rc<RefCell<HudModel>>,
    wait: DependencyWait,
    attached_generation: Option<u64>,
}

impl HudPresenter {
    pub fn new(machine: &mut GameStateMachine) -> Self {
        let model = Rc::new(RefCell::new(HudModel {
            state: machine.current(),
            ..HudModel::default()
        }));
        let sink = Rc::clone(&model);
        machine.subscribe(move |event, _| sink.borrow_mut().state = event.current);
        Self {
            model,
            wait: DependencyWait::new("gameplay_state", None),
            attached_generation: None,
        }
    }

    pub fn model(&self) -> HudModel {
        self.model.borrow().clone()
    }

    pub fn is_attached(&self) -> bool {
        self.attached_generation.is_some()
    }

    /// Polls for gameplay state once per frame and (re)subscribes when a new one appears.
    pub fn tick(&mut self, dt_seconds: f32, gameplay: Option<&mut GameplayState>) {
        let generation = gameplay.as_ref().map(|gameplay| gameplay.generation());
        if generation.is_some() && generation == self.attached_generation {
            return;
        }
        match self.wait.poll(dt_seconds, gameplay.is_some()) {
            WaitStatus::Ready => {
                if let Some(gameplay) = gameplay {
                    self.attach(gameplay);
                }
            }
            WaitStatus::Pending | WaitStatus::TimedOut => {
                if self.attached_generation.take().is_some() {
                    debug!("hud_detached");
                    self.clear_gameplay_fields();
                }
            }
        }
    }

    fn attach(&mut self, gameplay: &mut GameplayState) {
        {
            let mut model = self.model.borrow_mut();
            model.stage_index = gameplay.stage_index();
            model.level_label = gameplay.level().map(|level| level.label.clone());
            model.move_count = gameplay.move_count();
            model.slots = gameplay.inventory().labels();
            model.has_key = gameplay.inventory().has_key();
            model.last_used = None;
        }

        let sink = Rc::clone(&self.model);
        gameplay.inventory_mut().on_changed().subscribe(move |event, _| {
            let mut model = sink.borrow_mut();
            model.slots = event.labels.clone();
            model.has_key = event.has_key;
        });
        let sink = Rc::clone(&self.model);
        gameplay.inventory_mut().on_item_used().subscribe(move |event, _| {
            sink.borrow_mut().last_used = Some(event.item.label.clone());
        });
        let sink = Rc::clone(&self.model);
        gameplay
            .turns_mut()
            .on_moves_changed()
            .subscribe(move |moves, _| sink.borrow_mut().move_count = *moves);
        let sink = Rc::clone(&self.model);
        gameplay.on_level_changed().subscribe(move |event, _| {
            let mut model = sink.borrow_mut();
            model.stage_index = Some(event.stage_index);
            model.level_label = Some(event.label.clone());
        });

        self.attached_generation = Some(gameplay.generation());
        self.wait.reset();
        debug!(generation = gameplay.generation(), "hud_attached");
    }

    fn clear_gameplay_fields(&mut self) {
        let mut model = self.model.borrow_mut();
        let state = model.state;
        *model = HudModel {
            state,
            ..HudModel::default()
        };
    }

    /// One-line HUD. `selected_slot` is marked with `*`.
    pub fn render(&self, selected_slot: Option<usize>) -> String {
        let model = self.model.borrow();
        let mut line = format!("[{}]", model.state.name());
        if let Some(label) = &model.level_label {
            let number = model.stage_index.map_or(0, |index| index + 1);
            let _ = write!(line, " stage {number}: {label}");
        }
        if model.state == GameState::MainMenu {
            return line;
        }
        let _ = write!(
            line,
            " | moves {} | key {}",
            model.move_count,
            if model.has_key { "yes" } else { "no" }
        );
        line.push_str(" |");
        for (index, slot) in model.slots.iter().enumerate() {
            let marker = if selected_slot == Some(index) { "*" } else { "" };
            let _ = write!(
                line,
                " {}:{}{}",
                index + 1,
                slot.as_deref().unwrap_or("-"),
                marker
            );
        }
        if let Some(used) = &model.last_used {
            let _ = write!(line, " | used {used}");
        }
        line
    }
}
