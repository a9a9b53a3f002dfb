use serde::Serialize;
use tracing::debug;

use crate::grid::{Cell, Terrain, Vec2};

use super::entity::{ActorKind, Collider, Entity, EntityId, EntityIdAllocator, MoveAnimation};
use super::movement::MotionConfig;

/// How an occupant of a cell affects an actor trying to enter it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OccupantClass {
    Pushable,
    Blocking,
    Passable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupant {
    pub id: EntityId,
    pub kind: ActorKind,
    pub class: OccupantClass,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SettleWatch {
    id: EntityId,
    target: Vec2,
    elapsed_seconds: f32,
}

#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
    pending_despawns: Vec<EntityId>,
    next_applied_spawn_order: u64,
    settle_watches: Vec<SettleWatch>,
}

impl SceneWorld {
    /// Queues an entity snapped to the center of the cell containing `position`.
    pub fn spawn(
        &mut self,
        kind: ActorKind,
        position: Vec2,
        terrain: &impl Terrain,
    ) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Entity {
            id,
            kind,
            position: terrain.snap(position),
            collider: Collider {
                kind: kind.default_collider(),
                enabled: true,
            },
            movement_enabled: true,
            animation: None,
            applied_spawn_order: 0,
        });
        id
    }

    pub fn spawn_at_cell(
        &mut self,
        kind: ActorKind,
        cell: Cell,
        terrain: &impl Terrain,
    ) -> EntityId {
        self.spawn(kind, terrain.cell_to_world(cell), terrain)
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let exists_now = self.entities.iter().any(|entity| entity.id == id);
        let pending_spawn = self.pending_spawns.iter().any(|entity| entity.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort_by_key(|id| id.0);
            self.pending_despawns.dedup();
            let pending = &self.pending_despawns;
            self.entities.retain(|entity| {
                pending
                    .binary_search_by_key(&entity.id.0, |id| id.0)
                    .is_err()
            });
            self.pending_spawns.retain(|entity| {
                pending
                    .binary_search_by_key(&entity.id.0, |id| id.0)
                    .is_err()
            });
            self.settle_watches.retain(|watch| {
                pending
                    .binary_search_by_key(&watch.id.0, |id| id.0)
                    .is_err()
            });
            self.pending_despawns.clear();
        }

        if !self.pending_spawns.is_empty() {
            for mut entity in self.pending_spawns.drain(..) {
                entity.applied_spawn_order = self.next_applied_spawn_order;
                self.next_applied_spawn_order = self.next_applied_spawn_order.saturating_add(1);
                self.entities.push(entity);
            }
        }
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.settle_watches.clear();
        self.next_applied_spawn_order = 0;
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn is_pending_despawn(&self, id: EntityId) -> bool {
        self.pending_despawns.contains(&id)
    }

    /// Cell an entity logically occupies, using the target of any in-flight move.
    pub fn resolved_cell(&self, id: EntityId, terrain: &impl Terrain) -> Option<Cell> {
        self.find_entity(id)
            .map(|entity| terrain.world_to_cell(entity.resting_position()))
    }

    /// Every applied entity resolved to `cell`, regardless of collider state.
    pub fn entities_at(&self, cell: Cell, terrain: &impl Terrain) -> Vec<&Entity> {
        self.entities
            .iter()
            .filter(|entity| {
                !self.pending_despawns.contains(&entity.id)
                    && terrain.world_to_cell(entity.resting_position()) == cell
            })
            .collect()
    }

    /// Occupants of `cell` with an enabled collider, classified for movement resolution.
    pub fn occupants_at(&self, cell: Cell, terrain: &impl Terrain) -> Vec<Occupant> {
        self.entities_at(cell, terrain)
            .into_iter()
            .filter(|entity| entity.collider.enabled)
            .map(|entity| Occupant {
                id: entity.id,
                kind: entity.kind,
                class: classify(entity),
            })
            .collect()
    }

    pub fn snap_to(&mut self, id: EntityId, position: Vec2) -> bool {
        let Some(entity) = self.find_entity_mut(id) else {
            return false;
        };
        entity.position = position;
        entity.animation = None;
        true
    }

    /// Starts a relocation, snapping any in-flight one to its target first.
    pub(crate) fn start_move(
        &mut self,
        id: EntityId,
        target: Vec2,
        duration_seconds: f32,
    ) -> bool {
        let Some(entity) = self.find_entity_mut(id) else {
            return false;
        };
        if let Some(in_flight) = entity.animation.take() {
            entity.position = in_flight.to;
        }
        if duration_seconds <= 0.0 {
            entity.position = target;
            return true;
        }
        entity.animation = Some(MoveAnimation {
            from: entity.position,
            to: target,
            elapsed_seconds: 0.0,
            duration_seconds,
        });
        true
    }

    pub(crate) fn begin_settle(&mut self, id: EntityId, target: Vec2) {
        self.settle_watches.retain(|watch| watch.id != id);
        self.settle_watches.push(SettleWatch {
            id,
            target,
            elapsed_seconds: 0.0,
        });
    }

    pub fn is_settling(&self, id: EntityId) -> bool {
        self.settle_watches.iter().any(|watch| watch.id == id)
    }

    /// Force-commits a pending settle: snap to target and restore blocking.
    pub fn finish_settle(&mut self, id: EntityId) -> bool {
        let Some(index) = self.settle_watches.iter().position(|watch| watch.id == id) else {
            return false;
        };
        let watch = self.settle_watches.remove(index);
        self.commit_settle(watch);
        true
    }

    /// Advances move animations, then resolves settle watches that converged or timed out.
    pub fn tick_motion(&mut self, dt_seconds: f32, config: &MotionConfig) {
        for entity in &mut self.entities {
            let Some(animation) = entity.animation.as_mut() else {
                continue;
            };
            animation.elapsed_seconds += dt_seconds;
            entity.position = animation.sample();
            if animation.progress() >= 1.0 {
                entity.position = animation.to;
                entity.animation = None;
            }
        }

        if self.settle_watches.is_empty() {
            return;
        }
        let mut ready = Vec::new();
        for watch in &mut self.settle_watches {
            watch.elapsed_seconds += dt_seconds;
            let converged = self
                .entities
                .iter()
                .find(|entity| entity.id == watch.id)
                .map(|entity| entity.position.distance(watch.target) < config.settle_tolerance)
                .unwrap_or(true);
            if converged || watch.elapsed_seconds >= config.settle_timeout_seconds {
                if !converged {
                    debug!(entity = watch.id.0, "settle_timeout_forced_snap");
                }
                ready.push(*watch);
            }
        }
        if ready.is_empty() {
            return;
        }
        self.settle_watches
            .retain(|watch| !ready.iter().any(|done| done.id == watch.id));
        for watch in ready {
            self.commit_settle(watch);
        }
    }

    fn commit_settle(&mut self, watch: SettleWatch) {
        if let Some(entity) = self.find_entity_mut(watch.id) {
            entity.position = watch.target;
            entity.animation = None;
            entity.collider.enabled = true;
        }
    }
}

fn classify(entity: &Entity) -> OccupantClass {
    if entity.kind.is_pushable() {
        OccupantClass::Pushable
    } else if entity.collider.blocks() {
        OccupantClass::Blocking
    } else {
        OccupantClass::Passable
    }
}
