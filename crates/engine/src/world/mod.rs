mod entity;
mod movement;
mod push;
mod scene_world;

pub use entity::{
    ActorKind, Collider, ColliderKind, Entity, EntityId, EntityIdAllocator, FollowAxis,
    MoveAnimation,
};
pub use movement::{GridMover, MotionConfig, MoveRejection};
pub use push::PushRejection;
pub use scene_world::{Occupant, OccupantClass, SceneWorld};
