use serde::Serialize;
use tracing::info;

use super::signal::{Signal, SubscriptionId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum GameState {
    #[default]
    MainMenu,
    Playing,
    Paused,
    GameOver,
}

impl GameState {
    /// Multiplier applied to simulation time while in this state.
    pub fn time_scale(self) -> f32 {
        match self {
            GameState::Playing => 1.0,
            GameState::MainMenu | GameState::Paused | GameState::GameOver => 0.0,
        }
    }

    pub fn accepts_movement(self) -> bool {
        self == GameState::Playing
    }

    pub fn name(self) -> &'static str {
        match self {
            GameState::MainMenu => "main_menu",
            GameState::Playing => "playing",
            GameState::Paused => "paused",
            GameState::GameOver => "game_over",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChanged {
    pub previous: GameState,
    pub current: GameState,
}

#[derive(Debug, Default)]
pub struct GameStateMachine {
    current: GameState,
    changed: Signal<StateChanged>,
}

impl GameStateMachine {
    pub fn new(initial: GameState) -> Self {
        Self {
            current: initial,
            changed: Signal::default(),
        }
    }

    pub fn current(&self) -> GameState {
        self.current
    }

    pub fn time_scale(&self) -> f32 {
        self.current.time_scale()
    }

    /// Assigns `next` and broadcasts it. Returns `false` without broadcasting when
    /// `next` is already current.
    pub fn change_state(&mut self, next: GameState) -> bool {
        if self.current == next {
            return false;
        }
        let event = StateChanged {
            previous: self.current,
            current: next,
        };
        self.current = next;
        info!(
            from = event.previous.name(),
            to = event.current.name(),
            "game_state_changed"
        );
        self.changed.notify(&event);
        true
    }

    pub fn subscribe(
        &mut self,
        handler: impl Fn(&StateChanged, &mut ()) + 'static,
    ) -> SubscriptionId {
        self.changed.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.changed.unsubscribe(id)
    }
}
