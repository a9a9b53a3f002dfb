use tracing::debug;

use crate::grid::{Cell, CellOffset, Direction, Terrain};

use super::entity::EntityId;
use super::scene_world::{Occupant, OccupantClass, SceneWorld};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionConfig {
    pub move_duration_seconds: f32,
    pub settle_tolerance: f32,
    pub settle_timeout_seconds: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            move_duration_seconds: 0.15,
            settle_tolerance: 0.01,
            settle_timeout_seconds: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejection {
    NotCardinal,
    UnknownEntity,
    MovementDisabled,
    NoGround,
    StaticCollision,
    Occupied(EntityId),
}

/// One-cell stepping shared by every grid actor.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridMover {
    config: MotionConfig,
}

impl GridMover {
    pub fn new(config: MotionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Resolves the cell `id` would land in, without mutating anything.
    pub fn check_move(
        &self,
        world: &SceneWorld,
        terrain: &impl Terrain,
        id: EntityId,
        offset: CellOffset,
    ) -> Result<Cell, MoveRejection> {
        self.check_move_ignoring(world, terrain, id, offset, |_| false)
    }

    /// Like [`GridMover::check_move`], but occupants matched by `ignore` do not block.
    pub fn check_move_ignoring(
        &self,
        world: &SceneWorld,
        terrain: &impl Terrain,
        id: EntityId,
        offset: CellOffset,
        ignore: impl Fn(&Occupant) -> bool,
    ) -> Result<Cell, MoveRejection> {
        let direction = Direction::from_offset(offset).ok_or(MoveRejection::NotCardinal)?;
        let entity = world.find_entity(id).ok_or(MoveRejection::UnknownEntity)?;
        if !entity.movement_enabled {
            return Err(MoveRejection::MovementDisabled);
        }
        let target = terrain
            .world_to_cell(entity.resting_position())
            .step(direction);
        check_terrain(terrain, target)?;

        let blocker = world
            .occupants_at(target, terrain)
            .into_iter()
            .find(|occupant| {
                occupant.id != id
                    && occupant.class != OccupantClass::Passable
                    && !ignore(occupant)
            });
        if let Some(blocker) = blocker {
            return Err(MoveRejection::Occupied(blocker.id));
        }
        Ok(target)
    }

    pub fn can_move(
        &self,
        world: &SceneWorld,
        terrain: &impl Terrain,
        id: EntityId,
        offset: CellOffset,
    ) -> bool {
        self.check_move(world, terrain, id, offset).is_ok()
    }

    /// Steps `id` one cell. Returns `true` iff a relocation was started.
    pub fn try_move(
        &self,
        world: &mut SceneWorld,
        terrain: &impl Terrain,
        id: EntityId,
        offset: CellOffset,
    ) -> bool {
        self.try_move_ignoring(world, terrain, id, offset, |_| false)
    }

    /// Steps `id` one cell, letting it share a cell with occupants matched by `ignore`.
    pub fn try_move_ignoring(
        &self,
        world: &mut SceneWorld,
        terrain: &impl Terrain,
        id: EntityId,
        offset: CellOffset,
        ignore: impl Fn(&Occupant) -> bool,
    ) -> bool {
        match self.check_move_ignoring(world, terrain, id, offset, ignore) {
            Ok(target) => {
                world.start_move(
                    id,
                    terrain.cell_to_world(target),
                    self.config.move_duration_seconds,
                );
                true
            }
            Err(reason) => {
                debug!(entity = id.0, ?reason, "move_rejected");
                false
            }
        }
    }
}

pub(crate) fn check_terrain(terrain: &impl Terrain, target: Cell) -> Result<(), MoveRejection> {
    if !terrain.has_ground(target) {
        return Err(MoveRejection::NoGround);
    }
    if terrain.has_static_collision(target) {
        return Err(MoveRejection::StaticCollision);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridLayout, TerrainGrid, Tilemap, Vec2};
    use crate::world::ActorKind;

    // 5x1 corridor: ground everywhere except x=4, wall at x=3.
    fn corridor() -> TerrainGrid {
        let ground = Tilemap::new(5, 1, vec![1, 1, 1, 1, 0]).expect("ground");
        let collision = Tilemap::new(5, 1, vec![0, 0, 0, 1, 0]).expect("collision");
        TerrainGrid::new(GridLayout::default(), ground, collision).expect("grid")
    }

    fn snapping_mover() -> GridMover {
        GridMover::new(MotionConfig {
            move_duration_seconds: 0.0,
            ..MotionConfig::default()
        })
    }

    #[test]
    fn diagonal_and_zero_offsets_are_rejected() {
        let grid = corridor();
        let mut world = SceneWorld::default();
        let id = world.spawn_at_cell(ActorKind::Player, Cell::new(1, 0), &grid);
        world.apply_pending();
        let mover = snapping_mover();

        assert!(!mover.can_move(&world, &grid, id, CellOffset::new(1, 1)));
        assert!(!mover.can_move(&world, &grid, id, CellOffset::ZERO));
        assert_eq!(
            mover.check_move(&world, &grid, id, CellOffset::new(-1, 1)),
            Err(MoveRejection::NotCardinal)
        );
        assert!(!mover.try_move(&mut world, &grid, id, CellOffset::new(1, 1)));
        assert_eq!(world.resolved_cell(id, &grid), Some(Cell::new(1, 0)));
    }

    #[test]
    fn missing_ground_and_walls_reject() {
        let grid = corridor();
        let mut world = SceneWorld::default();
        let id = world.spawn_at_cell(ActorKind::Player, Cell::new(2, 0), &grid);
        let edge = world.spawn_at_cell(ActorKind::Player, Cell::new(0, 0), &grid);
        world.apply_pending();
        let mover = snapping_mover();

        assert_eq!(
            mover.check_move(&world, &grid, id, Direction::Right.offset()),
            Err(MoveRejection::StaticCollision)
        );
        assert_eq!(
            mover.check_move(&world, &grid, edge, Direction::Left.offset()),
            Err(MoveRejection::NoGround)
        );
    }

    #[test]
    fn trigger_occupants_never_block() {
        let grid = corridor();
        let mut world = SceneWorld::default();
        let id = world.spawn_at_cell(ActorKind::Player, Cell::new(0, 0), &grid);
        world.spawn_at_cell(ActorKind::Key, Cell::new(1, 0), &grid);
        world.spawn_at_cell(ActorKind::Lava, Cell::new(1, 0), &grid);
        world.apply_pending();
        let mover = snapping_mover();

        assert!(mover.try_move(&mut world, &grid, id, Direction::Right.offset()));
        assert_eq!(
            world.find_entity(id).expect("player").position,
            Vec2::new(1.5, 0.5)
        );
    }

    #[test]
    fn solid_occupant_blocks() {
        let grid = corridor();
        let mut world = SceneWorld::default();
        let id = world.spawn_at_cell(ActorKind::Player, Cell::new(0, 0), &grid);
        let doll = world.spawn_at_cell(ActorKind::EchoDoll, Cell::new(1, 0), &grid);
        world.apply_pending();
        let mover = snapping_mover();

        assert_eq!(
            mover.check_move(&world, &grid, id, Direction::Right.offset()),
            Err(MoveRejection::Occupied(doll))
        );
        assert!(!mover.try_move(&mut world, &grid, id, Direction::Right.offset()));
    }

    #[test]
    fn ignored_occupants_do_not_block() {
        let grid = corridor();
        let mut world = SceneWorld::default();
        let player = world.spawn_at_cell(ActorKind::Player, Cell::new(0, 0), &grid);
        let patrol = world.spawn_at_cell(ActorKind::PatrolEnemy, Cell::new(1, 0), &grid);
        let boulder = world.spawn_at_cell(ActorKind::Boulder, Cell::new(2, 0), &grid);
        world.apply_pending();
        let mover = snapping_mover();
        let avatars = |occupant: &Occupant| occupant.kind.is_avatar();

        assert_eq!(
            mover.check_move_ignoring(&world, &grid, patrol, Direction::Right.offset(), avatars),
            Err(MoveRejection::Occupied(boulder))
        );
        assert!(mover.try_move_ignoring(
            &mut world,
            &grid,
            patrol,
            Direction::Left.offset(),
            avatars
        ));
        assert_eq!(world.resolved_cell(patrol, &grid), Some(Cell::new(0, 0)));
        assert_eq!(world.resolved_cell(player, &grid), Some(Cell::new(0, 0)));
    }

    #[test]
    fn disabled_movement_rejects() {
        let grid = corridor();
        let mut world = SceneWorld::default();
        let id = world.spawn_at_cell(ActorKind::EchoDoll, Cell::new(0, 0), &grid);
        world.apply_pending();
        world.find_entity_mut(id).expect("doll").movement_enabled = false;

        assert_eq!(
            snapping_mover().check_move(&world, &grid, id, Direction::Right.offset()),
            Err(MoveRejection::MovementDisabled)
        );
    }

    #[test]
    fn animated_move_starts_from_logical_target() {
        let grid = corridor();
        let mut world = SceneWorld::default();
        let id = world.spawn_at_cell(ActorKind::Player, Cell::new(0, 0), &grid);
        world.apply_pending();
        let mover = GridMover::default();

        assert!(mover.try_move(&mut world, &grid, id, Direction::Right.offset()));
        assert!(mover.try_move(&mut world, &grid, id, Direction::Right.offset()));
        let entity = world.find_entity(id).expect("player");
        assert_eq!(entity.position, Vec2::new(1.5, 0.5));
        assert_eq!(entity.resting_position(), Vec2::new(2.5, 0.5));
    }

    #[test]
    fn accepted_move_lands_on_ground_without_collision() {
        let grid = corridor();
        let mut world = SceneWorld::default();
        let id = world.spawn_at_cell(ActorKind::Player, Cell::new(0, 0), &grid);
        world.apply_pending();
        let mover = snapping_mover();

        for _ in 0..6 {
            let accepted = mover.try_move(&mut world, &grid, id, Direction::Right.offset());
            let cell = world.resolved_cell(id, &grid).expect("cell");
            if accepted {
                assert!(grid.has_ground(cell));
                assert!(!grid.has_static_collision(cell));
            }
        }
        assert_eq!(world.resolved_cell(id, &grid), Some(Cell::new(2, 0)));
    }
}
