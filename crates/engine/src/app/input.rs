use crate::grid::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    ActivateItem,
    SelectSlot1,
    SelectSlot2,
    SelectSlot3,
    Pause,
    Quit,
}

const ACTION_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::ActivateItem => 4,
            InputAction::SelectSlot1 => 5,
            InputAction::SelectSlot2 => 6,
            InputAction::SelectSlot3 => 7,
            InputAction::Pause => 8,
            InputAction::Quit => 9,
        }
    }
}

/// Input observed for one simulation frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSnapshot {
    actions: ActionStates,
    move_axis: Option<Vec2>,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn quit_requested(&self) -> bool {
        self.actions.is_down(InputAction::Quit)
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    /// Overrides the digital movement actions with an analog stick value.
    pub fn with_move_axis(mut self, axis: Option<Vec2>) -> Self {
        self.move_axis = axis;
        self
    }

    /// Raw movement vector: the analog override if present, else the sum of held move actions.
    pub fn move_vector(&self) -> Vec2 {
        if let Some(axis) = self.move_axis {
            return axis;
        }
        let mut vector = Vec2::ZERO;
        if self.is_down(InputAction::MoveRight) {
            vector.x += 1.0;
        }
        if self.is_down(InputAction::MoveLeft) {
            vector.x -= 1.0;
        }
        if self.is_down(InputAction::MoveUp) {
            vector.y += 1.0;
        }
        if self.is_down(InputAction::MoveDown) {
            vector.y -= 1.0;
        }
        vector
    }

    /// Zero-based slot picked this frame, lowest slot first.
    pub fn selected_slot(&self) -> Option<usize> {
        [
            InputAction::SelectSlot1,
            InputAction::SelectSlot2,
            InputAction::SelectSlot3,
        ]
        .iter()
        .position(|action| self.is_down(*action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_vector_sums_held_actions() {
        let snapshot = InputSnapshot::empty()
            .with_action_down(InputAction::MoveUp, true)
            .with_action_down(InputAction::MoveLeft, true);
        assert_eq!(snapshot.move_vector(), Vec2::new(-1.0, 1.0));
    }

    #[test]
    fn opposing_actions_cancel() {
        let snapshot = InputSnapshot::empty()
            .with_action_down(InputAction::MoveUp, true)
            .with_action_down(InputAction::MoveDown, true);
        assert_eq!(snapshot.move_vector(), Vec2::ZERO);
    }

    #[test]
    fn analog_axis_overrides_digital_actions() {
        let snapshot = InputSnapshot::empty()
            .with_action_down(InputAction::MoveUp, true)
            .with_move_axis(Some(Vec2::new(0.7, 0.1)));
        assert_eq!(snapshot.move_vector(), Vec2::new(0.7, 0.1));
    }

    #[test]
    fn selected_slot_maps_to_zero_based_index() {
        let snapshot = InputSnapshot::empty().with_action_down(InputAction::SelectSlot3, true);
        assert_eq!(snapshot.selected_slot(), Some(2));
        assert_eq!(InputSnapshot::empty().selected_slot(), None);
    }
}
