use std::collections::BTreeSet;

use engine::world::FollowAxis;
use engine::{Cell, Direction, EntityId, Vec2};

/// Enemy that mirrors the player's step along its axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Follower {
    pub id: EntityId,
    pub axis: FollowAxis,
    /// Follows even when the player lacks the follow-enemies ability.
    pub ignore_ability: bool,
}

impl Follower {
    pub fn reacts(&self, enemies_follow: bool) -> bool {
        self.ignore_ability || enemies_follow
    }
}

/// Enemy walking a fixed waypoint loop in scaled real time.
#[derive(Debug, Clone, PartialEq)]
pub struct Patrol {
    pub id: EntityId,
    points: Vec<Cell>,
    interval_seconds: f32,
    timer_seconds: f32,
    target_index: usize,
}

impl Patrol {
    pub fn new(id: EntityId, points: Vec<Cell>, speed: f32) -> Self {
        let interval_seconds = if speed > 0.0 { 1.0 / speed } else { f32::INFINITY };
        Self {
            id,
            points,
            interval_seconds,
            timer_seconds: 0.0,
            target_index: 0,
        }
    }

    pub fn target(&self) -> Option<Cell> {
        self.points.get(self.target_index).copied()
    }

    /// Number of steps owed after `dt_seconds` of scaled time.
    pub fn advance_timer(&mut self, dt_seconds: f32) -> u32 {
        if !self.interval_seconds.is_finite() {
            return 0;
        }
        self.timer_seconds += dt_seconds.max(0.0);
        let mut steps = 0;
        while self.timer_seconds >= self.interval_seconds {
            self.timer_seconds -= self.interval_seconds;
            steps += 1;
        }
        steps
    }

    /// Direction of the next step from `current`, moving on to the following waypoint first
    /// when `current` already is the target.
    pub fn next_direction(&mut self, current: Cell) -> Option<Direction> {
        if self.target() == Some(current) {
            self.target_index = (self.target_index + 1) % self.points.len().max(1);
        }
        let target = self.target()?;
        let delta = Vec2::new((target.x - current.x) as f32, (target.y - current.y) as f32);
        Direction::from_input_vector(delta)
    }
}

/// Counts the occupants standing on a plate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PressurePlate {
    pub id: EntityId,
    pub cell: Cell,
    occupants: BTreeSet<EntityId>,
}

/// What a plate asks of the doors after an occupancy refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateSignal {
    Open,
    Close,
}

impl PressurePlate {
    pub fn new(id: EntityId, cell: Cell) -> Self {
        Self {
            id,
            cell,
            occupants: BTreeSet::new(),
        }
    }

    pub fn is_pressed(&self) -> bool {
        !self.occupants.is_empty()
    }

    /// Replaces the occupant set. Reports the edge when the plate goes from empty to
    /// occupied or back.
    pub fn refresh(&mut self, occupants: BTreeSet<EntityId>) -> Option<PlateSignal> {
        let was_pressed = self.is_pressed();
        self.occupants = occupants;
        match (was_pressed, self.is_pressed()) {
            (false, true) => Some(PlateSignal::Open),
            (true, false) => Some(PlateSignal::Close),
            _ => None,
        }
    }
}

/// Door held open while at least one open request is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Door {
    pub id: EntityId,
    open_requests: u32,
}

impl Door {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            open_requests: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open_requests > 0
    }

    /// Applies one request. Returns `true` when the door changed between open and closed.
    pub fn apply(&mut self, signal: PlateSignal) -> bool {
        let was_open = self.is_open();
        self.open_requests = match signal {
            PlateSignal::Open => self.open_requests.saturating_add(1),
            PlateSignal::Close => self.open_requests.saturating_sub(1),
        };
        was_open != self.is_open()
    }
}
