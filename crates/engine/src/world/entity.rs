use serde::Serialize;

use crate::grid::{CellOffset, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub u64);

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActorKind {
    Player,
    EchoDoll,
    FollowerEnemy,
    PatrolEnemy,
    Boulder,
    Trap,
    ItemPickup,
    Key,
    Gateway,
    Lava,
    PinkLava,
    InventoryClear,
    PressurePlate,
    Door,
}

impl ActorKind {
    pub fn default_collider(self) -> ColliderKind {
        match self {
            ActorKind::Player | ActorKind::EchoDoll | ActorKind::Boulder | ActorKind::Door => {
                ColliderKind::Solid
            }
            _ => ColliderKind::Trigger,
        }
    }

    pub fn is_enemy(self) -> bool {
        matches!(self, ActorKind::FollowerEnemy | ActorKind::PatrolEnemy)
    }

    pub fn is_pushable(self) -> bool {
        matches!(self, ActorKind::Boulder)
    }

    pub fn is_avatar(self) -> bool {
        matches!(self, ActorKind::Player | ActorKind::EchoDoll)
    }

    pub fn label(self) -> &'static str {
        match self {
            ActorKind::Player => "player",
            ActorKind::EchoDoll => "echo_doll",
            ActorKind::FollowerEnemy => "follower_enemy",
            ActorKind::PatrolEnemy => "patrol_enemy",
            ActorKind::Boulder => "boulder",
            ActorKind::Trap => "trap",
            ActorKind::ItemPickup => "item_pickup",
            ActorKind::Key => "key",
            ActorKind::Gateway => "gateway",
            ActorKind::Lava => "lava",
            ActorKind::PinkLava => "pink_lava",
            ActorKind::InventoryClear => "inventory_clear",
            ActorKind::PressurePlate => "pressure_plate",
            ActorKind::Door => "door",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColliderKind {
    Solid,
    Trigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Collider {
    pub kind: ColliderKind,
    pub enabled: bool,
}

impl Collider {
    pub fn blocks(&self) -> bool {
        self.enabled && self.kind == ColliderKind::Solid
    }
}

/// Axis a follower mirrors the player's step on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum FollowAxis {
    X,
    Y,
    #[default]
    Both,
}

impl FollowAxis {
    pub fn project(self, offset: CellOffset) -> CellOffset {
        let projected = match self {
            FollowAxis::X => CellOffset::new(offset.dx, 0),
            FollowAxis::Y => CellOffset::new(0, offset.dy),
            FollowAxis::Both => offset,
        };
        projected.clamped()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveAnimation {
    pub from: Vec2,
    pub to: Vec2,
    pub elapsed_seconds: f32,
    pub duration_seconds: f32,
}

impl MoveAnimation {
    pub fn progress(&self) -> f32 {
        if self.duration_seconds <= 0.0 {
            return 1.0;
        }
        (self.elapsed_seconds / self.duration_seconds).clamp(0.0, 1.0)
    }

    pub fn sample(&self) -> Vec2 {
        self.from.lerp(self.to, self.progress())
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub kind: ActorKind,
    pub position: Vec2,
    pub collider: Collider,
    pub movement_enabled: bool,
    pub animation: Option<MoveAnimation>,
    pub(crate) applied_spawn_order: u64,
}

impl Entity {
    /// Position the entity occupies once any in-flight relocation completes.
    pub fn resting_position(&self) -> Vec2 {
        match self.animation {
            Some(animation) => animation.to,
            None => self.position,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.animation.is_some()
    }

    pub fn applied_spawn_order(&self) -> u64 {
        self.applied_spawn_order
    }
}
