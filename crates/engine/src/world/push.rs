use tracing::debug;

use crate::grid::{CellOffset, Direction, Terrain};

use super::entity::EntityId;
use super::movement::{check_terrain, GridMover, MoveRejection};
use super::scene_world::SceneWorld;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushRejection {
    NotPushable,
    Move(MoveRejection),
    Boulder(EntityId),
    Enemy(EntityId),
    Blocked(EntityId),
}

impl GridMover {
    /// Validates a push of `id` one cell along `offset`. Never mutates the world.
    pub fn check_push(
        &self,
        world: &SceneWorld,
        terrain: &impl Terrain,
        id: EntityId,
        offset: CellOffset,
    ) -> Result<(), PushRejection> {
        let direction = Direction::from_offset(offset)
            .ok_or(PushRejection::Move(MoveRejection::NotCardinal))?;
        let entity = world
            .find_entity(id)
            .ok_or(PushRejection::Move(MoveRejection::UnknownEntity))?;
        if !entity.kind.is_pushable() {
            return Err(PushRejection::NotPushable);
        }
        if !entity.movement_enabled {
            return Err(PushRejection::Move(MoveRejection::MovementDisabled));
        }
        let target = terrain
            .world_to_cell(entity.resting_position())
            .step(direction);
        check_terrain(terrain, target).map_err(PushRejection::Move)?;

        for other in world.entities_at(target, terrain) {
            if other.id == id {
                continue;
            }
            if other.kind.is_pushable() {
                return Err(PushRejection::Boulder(other.id));
            }
            if other.kind.is_enemy() {
                return Err(PushRejection::Enemy(other.id));
            }
            if other.collider.blocks() {
                return Err(PushRejection::Blocked(other.id));
            }
        }
        Ok(())
    }

    /// Pushes a boulder one cell. Its collider stays disabled until the relocation settles,
    /// so the pusher can step into the vacated cell on the same turn.
    pub fn try_push(
        &self,
        world: &mut SceneWorld,
        terrain: &impl Terrain,
        id: EntityId,
        offset: CellOffset,
    ) -> bool {
        world.finish_settle(id);
        if let Err(reason) = self.check_push(world, terrain, id, offset) {
            debug!(entity = id.0, ?reason, "push_rejected");
            return false;
        }
        let Some(origin) = world.resolved_cell(id, terrain) else {
            return false;
        };
        let target = terrain.cell_to_world(origin + offset);
        if let Some(entity) = world.find_entity_mut(id) {
            entity.collider.enabled = false;
        }
        world.start_move(id, target, self.config().move_duration_seconds);
        world.begin_settle(id, target);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Cell, GridLayout, TerrainGrid, Tilemap, Vec2};
    use crate::world::{ActorKind, MotionConfig};

    fn open_row(width: u32) -> TerrainGrid {
        TerrainGrid::new(
            GridLayout::default(),
            Tilemap::filled(width, 1, 1),
            Tilemap::filled(width, 1, 0),
        )
        .expect("grid")
    }

    fn setup(width: u32) -> (TerrainGrid, SceneWorld, EntityId, EntityId) {
        let grid = open_row(width);
        let mut world = SceneWorld::default();
        let player = world.spawn_at_cell(ActorKind::Player, Cell::new(0, 0), &grid);
        let boulder = world.spawn_at_cell(ActorKind::Boulder, Cell::new(1, 0), &grid);
        world.apply_pending();
        (grid, world, player, boulder)
    }

    fn positions(world: &SceneWorld, ids: &[EntityId]) -> Vec<Vec2> {
        ids.iter()
            .map(|id| world.find_entity(*id).expect("entity").resting_position())
            .collect()
    }

    #[test]
    fn push_then_move_into_vacated_cell() {
        let (grid, mut world, player, boulder) = setup(4);
        let mover = GridMover::default();
        let right = Direction::Right.offset();

        assert!(mover.try_push(&mut world, &grid, boulder, right));
        assert!(!world.find_entity(boulder).expect("boulder").collider.enabled);
        assert!(mover.try_move(&mut world, &grid, player, right));

        assert_eq!(world.resolved_cell(boulder, &grid), Some(Cell::new(2, 0)));
        assert_eq!(world.resolved_cell(player, &grid), Some(Cell::new(1, 0)));

        world.tick_motion(0.5, &MotionConfig::default());
        let entity = world.find_entity(boulder).expect("boulder");
        assert!(entity.collider.enabled);
        assert_eq!(entity.position, Vec2::new(2.5, 0.5));
    }

    #[test]
    fn push_into_void_is_atomic() {
        let (grid, mut world, player, boulder) = setup(2);
        let before = positions(&world, &[player, boulder]);

        let pushed =
            GridMover::default().try_push(&mut world, &grid, boulder, Direction::Right.offset());
        assert!(!pushed);
        assert_eq!(positions(&world, &[player, boulder]), before);
        assert!(world.find_entity(boulder).expect("boulder").collider.enabled);
    }

    #[test]
    fn push_against_boulder_or_enemy_fails() {
        let (grid, mut world, _player, boulder) = setup(4);
        let second = world.spawn_at_cell(ActorKind::Boulder, Cell::new(2, 0), &grid);
        world.apply_pending();
        let mover = GridMover::default();
        assert_eq!(
            mover.check_push(&world, &grid, boulder, Direction::Right.offset()),
            Err(PushRejection::Boulder(second))
        );

        world.despawn(second);
        let enemy = world.spawn_at_cell(ActorKind::PatrolEnemy, Cell::new(2, 0), &grid);
        world.apply_pending();
        assert_eq!(
            mover.check_push(&world, &grid, boulder, Direction::Right.offset()),
            Err(PushRejection::Enemy(enemy))
        );
    }

    #[test]
    fn push_against_closed_door_fails_and_open_door_passes() {
        let (grid, mut world, _player, boulder) = setup(4);
        let door = world.spawn_at_cell(ActorKind::Door, Cell::new(2, 0), &grid);
        world.apply_pending();
        let mover = GridMover::default();
        assert_eq!(
            mover.check_push(&world, &grid, boulder, Direction::Right.offset()),
            Err(PushRejection::Blocked(door))
        );

        world.find_entity_mut(door).expect("door").collider.enabled = false;
        assert!(mover.try_push(&mut world, &grid, boulder, Direction::Right.offset()));
    }

    #[test]
    fn only_boulders_are_pushable() {
        let (grid, mut world, player, _boulder) = setup(4);
        assert!(!GridMover::default().try_push(
            &mut world,
            &grid,
            player,
            Direction::Left.offset()
        ));
    }

    #[test]
    fn consecutive_pushes_commit_previous_settle() {
        let (grid, mut world, _player, boulder) = setup(5);
        let mover = GridMover::default();
        let right = Direction::Right.offset();

        assert!(mover.try_push(&mut world, &grid, boulder, right));
        assert!(mover.try_push(&mut world, &grid, boulder, right));
        assert_eq!(world.resolved_cell(boulder, &grid), Some(Cell::new(3, 0)));
        assert!(world.is_settling(boulder));
    }
}
