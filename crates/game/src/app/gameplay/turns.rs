use engine::{Direction, GameState, Signal, SubscriptionId};
use tracing::debug;

use super::stage::StageRuntime;

/// Broadcast once per accepted turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerMoved {
    pub direction: Direction,
    pub move_count: u32,
    /// Whether followers without `ignore_ability` should react.
    pub enemies_follow: bool,
}

/// Move counter plus the player-moved fan-out. Subscribers receive the stage they act on as
/// the broadcast context.
#[derive(Debug)]
pub struct TurnPipeline<C = StageRuntime> {
    move_count: u32,
    player_moved: Signal<PlayerMoved, C>,
    moves_changed: Signal<u32>,
}

impl<C> Default for TurnPipeline<C> {
    fn default() -> Self {
        Self {
            move_count: 0,
            player_moved: Signal::default(),
            moves_changed: Signal::default(),
        }
    }
}

impl<C> TurnPipeline<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    /// Counts one turn and broadcasts it. Ignored outside [`GameState::Playing`].
    pub fn notify_player_moved(
        &mut self,
        state: GameState,
        direction: Direction,
        enemies_follow: bool,
        context: &mut C,
    ) -> Option<PlayerMoved> {
        if !state.accepts_movement() {
            debug!(state = state.name(), "turn_ignored_outside_play");
            return None;
        }
        self.move_count = self.move_count.saturating_add(1);
        self.moves_changed.notify(&self.move_count);
        let event = PlayerMoved {
            direction,
            move_count: self.move_count,
            enemies_follow,
        };
        let reached = self.player_moved.emit(&event, context);
        debug!(
            move_count = self.move_count,
            ?direction,
            subscribers = reached,
            "player_moved"
        );
        Some(event)
    }

    pub fn reset_moves(&mut self) {
        self.set_move_count(0);
    }

    pub fn set_move_count(&mut self, move_count: u32) {
        self.move_count = move_count;
        self.moves_changed.notify(&self.move_count);
    }

    pub fn subscribe_player_moved(
        &mut self,
        handler: impl Fn(&PlayerMoved, &mut C) + 'static,
    ) -> SubscriptionId {
        self.player_moved.subscribe(handler)
    }

    pub fn unsubscribe_player_moved(&mut self, id: SubscriptionId) -> bool {
        self.player_moved.unsubscribe(id)
    }

    pub fn player_moved_subscribers(&self) -> usize {
        self.player_moved.subscriber_count()
    }

    pub fn on_moves_changed(&mut self) -> &mut Signal<u32> {
        &mut self.moves_changed
    }
}
