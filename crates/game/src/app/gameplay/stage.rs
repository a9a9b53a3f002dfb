use std::collections::{BTreeMap, BTreeSet};

use engine::grid::TilemapError;
use engine::world::Entity;
use engine::{
    ActorKind, Cell, CellOffset, Direction, EntityId, GridLayout, GridMover, MotionConfig,
    SceneWorld, StageDef, SubscriptionId, Terrain, TerrainGrid,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use super::actors::{Door, Follower, Patrol, PressurePlate};
use super::items::{CatalogError, ItemCatalog, ItemRef};
use super::turns::{PlayerMoved, TurnPipeline};

#[derive(Debug, Error)]
pub enum StageBuildError {
    #[error("stage '{stage}' has an invalid layout: {source}")]
    Layout {
        stage: String,
        #[source]
        source: TilemapError,
    },
    #[error("stage '{stage}' references a missing item: {source}")]
    Item {
        stage: String,
        #[source]
        source: CatalogError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StageConfig {
    pub grid: GridLayout,
    pub motion: MotionConfig,
}

/// Something the session has to react to. Queued in the order it was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent {
    AvatarTouchedEnemy { avatar: ActorKind, enemy: EntityId },
    AvatarEnteredHazard { avatar: ActorKind, pink: bool },
    KeyTouched { key: EntityId },
    PickupTouched { pickup: EntityId },
    GatewayTouched,
    InventoryClearTouched { tile: EntityId },
    EnemyTrapped { enemy: EntityId },
    DoorToggled { door: EntityId, open: bool },
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityDump {
    pub id: EntityId,
    pub kind: ActorKind,
    pub cell: Cell,
    pub collider_enabled: bool,
    pub movement_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageDump {
    pub index: usize,
    pub def_name: String,
    pub label: String,
    pub story: bool,
    pub replace_offer: Option<String>,
    pub entities: Vec<EntityDump>,
}

#[derive(Debug, Default)]
struct FollowerLink {
    subscriptions: Vec<SubscriptionId>,
    attached: bool,
}

/// World content of the one instantiated stage.
#[derive(Debug)]
pub struct StageRuntime {
    index: usize,
    def_name: String,
    label: String,
    story: bool,
    terrain: TerrainGrid,
    world: SceneWorld,
    mover: GridMover,
    player: EntityId,
    doll: Option<EntityId>,
    pickups: BTreeMap<EntityId, ItemRef>,
    followers: Vec<Follower>,
    patrols: Vec<Patrol>,
    plates: Vec<PressurePlate>,
    doors: Vec<Door>,
    follower_link: FollowerLink,
    replace_offer: Option<EntityId>,
    avatar_cells: BTreeMap<EntityId, Cell>,
    events: Vec<StageEvent>,
}

impl StageRuntime {
    pub fn instantiate(
        index: usize,
        def: &StageDef,
        catalog: &ItemCatalog,
        config: &StageConfig,
    ) -> Result<Self, StageBuildError> {
        let terrain =
            def.layout
                .build_terrain(config.grid)
                .map_err(|source| StageBuildError::Layout {
                    stage: def.def_name.clone(),
                    source,
                })?;
        let mut world = SceneWorld::default();
        let player = world.spawn_at_cell(ActorKind::Player, def.layout.player_spawn, &terrain);

        let mut plates = Vec::new();
        let mut doors = Vec::new();
        for placement in &def.layout.placements {
            let id = world.spawn_at_cell(placement.kind, placement.cell, &terrain);
            match placement.kind {
                ActorKind::PressurePlate => plates.push(PressurePlate::new(id, placement.cell)),
                ActorKind::Door => doors.push(Door::new(id)),
                _ => {}
            }
        }

        let mut pickups = BTreeMap::new();
        for spawn in &def.pickups {
            let item = catalog
                .require(&spawn.item)
                .map_err(|source| StageBuildError::Item {
                    stage: def.def_name.clone(),
                    source,
                })?;
            let id = world.spawn_at_cell(ActorKind::ItemPickup, spawn.cell, &terrain);
            pickups.insert(id, item);
        }

        let followers = def
            .followers
            .iter()
            .map(|spawn| Follower {
                id: world.spawn_at_cell(ActorKind::FollowerEnemy, spawn.cell, &terrain),
                axis: spawn.axis,
                ignore_ability: spawn.ignore_ability,
            })
            .collect::<Vec<_>>();

        let mut patrols = Vec::new();
        for route in &def.patrols {
            let Some(start) = route.points.first() else {
                continue;
            };
            let id = world.spawn_at_cell(ActorKind::PatrolEnemy, *start, &terrain);
            patrols.push(Patrol::new(id, route.points.clone(), route.speed));
        }
        world.apply_pending();

        let mut stage = Self {
            index,
            def_name: def.def_name.clone(),
            label: def.label.clone(),
            story: def.story,
            terrain,
            world,
            mover: GridMover::new(config.motion),
            player,
            doll: None,
            pickups,
            followers,
            patrols,
            plates,
            doors,
            follower_link: FollowerLink::default(),
            replace_offer: None,
            avatar_cells: BTreeMap::new(),
            events: Vec::new(),
        };
        stage.avatar_cells.insert(player, def.layout.player_spawn);
        stage.refresh_plates();
        stage.events.clear();
        info!(
            stage = %stage.def_name,
            index,
            entities = stage.world.entity_count(),
            "stage_instantiated"
        );
        Ok(stage)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn def_name(&self) -> &str {
        &self.def_name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_story(&self) -> bool {
        self.story
    }

    pub fn terrain(&self) -> &TerrainGrid {
        &self.terrain
    }

    pub fn world(&self) -> &SceneWorld {
        &self.world
    }

    pub fn player(&self) -> EntityId {
        self.player
    }

    pub fn player_cell(&self) -> Option<Cell> {
        self.world.resolved_cell(self.player, &self.terrain)
    }

    pub fn doll(&self) -> Option<EntityId> {
        self.doll
    }

    pub fn cell_of(&self, id: EntityId) -> Option<Cell> {
        self.world.resolved_cell(id, &self.terrain)
    }

    pub fn entities_of(&self, kind: ActorKind) -> Vec<&Entity> {
        self.world
            .entities()
            .iter()
            .filter(|entity| entity.kind == kind)
            .collect()
    }

    /// Subscribes every follower to `pipeline`.
    pub fn attach_followers(&mut self, pipeline: &mut TurnPipeline) {
        if self.follower_link.attached {
            return;
        }
        for follower in self.followers.clone() {
            let id = pipeline.subscribe_player_moved(move |event, stage: &mut StageRuntime| {
                stage.follow_player(follower, event);
            });
            self.follower_link.subscriptions.push(id);
        }
        self.follower_link.attached = true;
        debug!(
            stage = %self.def_name,
            followers = self.followers.len(),
            "followers_attached"
        );
    }

    pub fn detach_followers(&mut self, pipeline: &mut TurnPipeline) {
        for id in self.follower_link.subscriptions.drain(..) {
            pipeline.unsubscribe_player_moved(id);
        }
        self.follower_link.attached = false;
    }

    pub fn followers_attached(&self) -> bool {
        self.follower_link.attached
    }

    fn follow_player(&mut self, follower: Follower, event: &PlayerMoved) {
        if !follower.reacts(event.enemies_follow) {
            return;
        }
        if self.world.find_entity(follower.id).is_none() {
            return;
        }
        let offset = follower.axis.project(event.direction.offset());
        if offset.is_zero() {
            return;
        }
        if !self.step_enemy(follower.id, offset) {
            debug!(entity = follower.id.0, "follower_step_blocked");
        }
    }

    /// Enemies walk into avatar cells; the contact pass turns that into a kill.
    fn step_enemy(&mut self, id: EntityId, offset: CellOffset) -> bool {
        self.mover.try_move_ignoring(
            &mut self.world,
            &self.terrain,
            id,
            offset,
            |occupant| occupant.kind.is_avatar(),
        )
    }

    /// Steps the player, pushing a boulder first when one sits in the target cell.
    pub fn step_player(&mut self, direction: Direction, can_push: bool) -> bool {
        self.step_avatar(self.player, direction, can_push)
    }

    /// Steps the echo doll when it exists and has been activated.
    pub fn step_doll(&mut self, direction: Direction, can_push: bool) -> bool {
        let Some(doll) = self.doll else {
            return false;
        };
        let enabled = self
            .world
            .find_entity(doll)
            .is_some_and(|entity| entity.movement_enabled);
        enabled && self.step_avatar(doll, direction, can_push)
    }

    fn step_avatar(&mut self, id: EntityId, direction: Direction, can_push: bool) -> bool {
        let offset = direction.offset();
        let Some(origin) = self.world.resolved_cell(id, &self.terrain) else {
            return false;
        };
        let boulder = self
            .world
            .entities_at(origin + offset, &self.terrain)
            .into_iter()
            .find(|entity| entity.kind.is_pushable())
            .map(|entity| entity.id);
        if let Some(boulder) = boulder {
            if !can_push {
                debug!(entity = id.0, "push_requires_strength");
                return false;
            }
            if !self
                .mover
                .try_push(&mut self.world, &self.terrain, boulder, offset)
            {
                return false;
            }
        }
        self.mover
            .try_move(&mut self.world, &self.terrain, id, offset)
    }

    /// Drops a single-use trap on the player's cell.
    pub fn place_trap(&mut self) -> Option<Cell> {
        let cell = self.player_cell()?;
        self.world.spawn_at_cell(ActorKind::Trap, cell, &self.terrain);
        self.world.apply_pending();
        Some(cell)
    }

    /// Spawns the echo doll on the player's cell with movement disabled, replacing any
    /// earlier doll.
    pub fn place_echo_doll(&mut self) -> Option<Cell> {
        let cell = self.player_cell()?;
        if let Some(previous) = self.doll.take() {
            self.world.despawn(previous);
            self.avatar_cells.remove(&previous);
        }
        let doll = self
            .world
            .spawn_at_cell(ActorKind::EchoDoll, cell, &self.terrain);
        self.world.apply_pending();
        if let Some(entity) = self.world.find_entity_mut(doll) {
            entity.movement_enabled = false;
        }
        self.avatar_cells.insert(doll, cell);
        self.doll = Some(doll);
        Some(cell)
    }

    pub fn enable_echo_doll(&mut self) -> bool {
        let Some(doll) = self.doll else {
            return false;
        };
        match self.world.find_entity_mut(doll) {
            Some(entity) => {
                entity.movement_enabled = true;
                true
            }
            None => false,
        }
    }

    pub fn pickup_item(&self, pickup: EntityId) -> Option<ItemRef> {
        self.pickups.get(&pickup).cloned()
    }

    /// Destroys a trigger or actor immediately.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        if !self.world.despawn(id) {
            return false;
        }
        self.world.apply_pending();
        self.pickups.remove(&id);
        self.avatar_cells.remove(&id);
        if self.replace_offer == Some(id) {
            self.replace_offer = None;
        }
        if self.doll == Some(id) {
            self.doll = None;
        }
        true
    }

    pub fn open_replace_offer(&mut self, pickup: EntityId) {
        if self.pickups.contains_key(&pickup) {
            self.replace_offer = Some(pickup);
            info!(pickup = pickup.0, "replace_offer_opened");
        }
    }

    pub fn replace_offer(&self) -> Option<(EntityId, ItemRef)> {
        let pickup = self.replace_offer?;
        self.pickup_item(pickup).map(|item| (pickup, item))
    }

    pub fn cancel_replace_offer(&mut self) -> bool {
        let cancelled = self.replace_offer.take().is_some();
        if cancelled {
            debug!("replace_offer_cancelled");
        }
        cancelled
    }

    /// Advances motion and patrols by `dt_seconds` of scaled time, then resolves contacts.
    pub fn tick(&mut self, dt_seconds: f32) {
        self.world.tick_motion(dt_seconds, self.mover.config());
        self.tick_patrols(dt_seconds);
        self.resolve_contacts();
    }

    fn tick_patrols(&mut self, dt_seconds: f32) {
        for index in 0..self.patrols.len() {
            let id = self.patrols[index].id;
            let steps = self.patrols[index].advance_timer(dt_seconds);
            for _ in 0..steps {
                let Some(current) = self.world.resolved_cell(id, &self.terrain) else {
                    break;
                };
                let Some(direction) = self.patrols[index].next_direction(current) else {
                    break;
                };
                if !self.step_enemy(id, direction.offset()) {
                    debug!(entity = id.0, "patrol_step_blocked");
                }
            }
        }
    }

    /// Runs trap, enemy, trigger and plate checks against current positions.
    pub fn resolve_contacts(&mut self) {
        self.resolve_traps();
        self.resolve_enemy_contacts();
        self.resolve_avatar_entries();
        self.refresh_plates();
    }

    fn resolve_traps(&mut self) {
        let traps = self
            .entities_of(ActorKind::Trap)
            .into_iter()
            .map(|trap| trap.id)
            .collect::<Vec<_>>();
        for trap in traps {
            let Some(cell) = self.cell_of(trap) else {
                continue;
            };
            let enemy = self
                .world
                .entities_at(cell, &self.terrain)
                .into_iter()
                .find(|entity| entity.kind.is_enemy())
                .map(|entity| entity.id);
            if let Some(enemy) = enemy {
                self.world.despawn(enemy);
                self.world.despawn(trap);
                self.world.apply_pending();
                self.followers.retain(|follower| follower.id != enemy);
                self.patrols.retain(|patrol| patrol.id != enemy);
                info!(enemy = enemy.0, x = cell.x, y = cell.y, "enemy_trapped");
                self.events.push(StageEvent::EnemyTrapped { enemy });
            }
        }
    }

    fn resolve_enemy_contacts(&mut self) {
        let avatars = std::iter::once(self.player).chain(self.doll);
        let mut touches = Vec::new();
        for avatar in avatars {
            let Some(entity) = self.world.find_entity(avatar) else {
                continue;
            };
            let Some(cell) = self.cell_of(avatar) else {
                continue;
            };
            let enemy = self
                .world
                .entities_at(cell, &self.terrain)
                .into_iter()
                .find(|other| other.kind.is_enemy())
                .map(|other| other.id);
            if let Some(enemy) = enemy {
                touches.push(StageEvent::AvatarTouchedEnemy {
                    avatar: entity.kind,
                    enemy,
                });
            }
        }
        self.events.extend(touches);
    }

    /// Fires enter-style triggers for avatars whose resolved cell changed.
    fn resolve_avatar_entries(&mut self) {
        let avatars = std::iter::once(self.player).chain(self.doll).collect::<Vec<_>>();
        for avatar in avatars {
            let Some(cell) = self.cell_of(avatar) else {
                continue;
            };
            if self.avatar_cells.insert(avatar, cell) == Some(cell) {
                continue;
            }
            let is_player = avatar == self.player;
            let kind = if is_player {
                ActorKind::Player
            } else {
                ActorKind::EchoDoll
            };
            if is_player {
                if let Some(pickup) = self.replace_offer {
                    if self.cell_of(pickup) != Some(cell) {
                        self.cancel_replace_offer();
                    }
                }
            }
            let triggers = self
                .world
                .entities_at(cell, &self.terrain)
                .into_iter()
                .map(|entity| (entity.id, entity.kind))
                .collect::<Vec<_>>();
            for (id, trigger) in triggers {
                let event = match trigger {
                    ActorKind::Lava => Some(StageEvent::AvatarEnteredHazard {
                        avatar: kind,
                        pink: false,
                    }),
                    ActorKind::PinkLava => Some(StageEvent::AvatarEnteredHazard {
                        avatar: kind,
                        pink: true,
                    }),
                    ActorKind::Key if is_player => Some(StageEvent::KeyTouched { key: id }),
                    ActorKind::ItemPickup if is_player => {
                        Some(StageEvent::PickupTouched { pickup: id })
                    }
                    ActorKind::Gateway if is_player => Some(StageEvent::GatewayTouched),
                    ActorKind::InventoryClear if is_player => {
                        Some(StageEvent::InventoryClearTouched { tile: id })
                    }
                    _ => None,
                };
                if let Some(event) = event {
                    self.events.push(event);
                }
            }
        }
    }

    fn refresh_plates(&mut self) {
        let mut signals = Vec::new();
        for index in 0..self.plates.len() {
            let cell = self.plates[index].cell;
            let occupants = self
                .world
                .entities_at(cell, &self.terrain)
                .into_iter()
                .filter(|entity| presses_plates(entity.kind))
                .map(|entity| entity.id)
                .collect::<BTreeSet<_>>();
            if let Some(signal) = self.plates[index].refresh(occupants) {
                debug!(plate = self.plates[index].id.0, ?signal, "pressure_plate_changed");
                signals.push(signal);
            }
        }
        for signal in signals {
            for index in 0..self.doors.len() {
                if !self.doors[index].apply(signal) {
                    continue;
                }
                let door = self.doors[index];
                let open = door.is_open();
                if let Some(entity) = self.world.find_entity_mut(door.id) {
                    entity.collider.enabled = !open;
                }
                info!(door = door.id.0, open, "door_toggled");
                self.events.push(StageEvent::DoorToggled { door: door.id, open });
            }
        }
    }

    pub fn drain_events(&mut self) -> Vec<StageEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn dump(&self) -> StageDump {
        StageDump {
            index: self.index,
            def_name: self.def_name.clone(),
            label: self.label.clone(),
            story: self.story,
            replace_offer: self
                .replace_offer()
                .map(|(_, item)| item.def_name.clone()),
            entities: self
                .world
                .entities()
                .iter()
                .map(|entity| EntityDump {
                    id: entity.id,
                    kind: entity.kind,
                    cell: self.terrain.world_to_cell(entity.resting_position()),
                    collider_enabled: entity.collider.enabled,
                    movement_enabled: entity.movement_enabled,
                })
                .collect(),
        }
    }
}

fn presses_plates(kind: ActorKind) -> bool {
    kind.is_avatar() || kind.is_enemy() || kind.is_pushable()
}

#[cfg(test)]
pub(crate) mod tests {
    use engine::compile_defs_from_str;

    use super::*;
    use crate::app::gameplay::items::ItemCatalog;

    pub(crate) fn snapping_config() -> StageConfig {
        StageConfig {
            motion: MotionConfig {
                move_duration_seconds: 0.0,
                ..MotionConfig::default()
            },
            ..StageConfig::default()
        }
    }

    pub(crate) fn build(xml_body: &str) -> (StageRuntime, ItemCatalog) {
        let xml = format!(
            r#"<Defs>
                <ItemDef><defName>gem</defName><label>Gem</label></ItemDef>
                {xml_body}
            </Defs>"#
        );
        let defs = compile_defs_from_str("test.xml", &xml).expect("defs");
        let catalog = ItemCatalog::from_defs(&defs).expect("catalog");
        let def = defs.stage_defs().first().expect("stage").clone();
        let stage = StageRuntime::instantiate(0, &def, &catalog, &snapping_config()).expect("stage");
        (stage, catalog)
    }

    fn stage_with_rows(rows: &[&str]) -> StageRuntime {
        let rows = rows
            .iter()
            .map(|row| format!("<row>{row}</row>"))
            .collect::<String>();
        build(&format!(
            "<StageDef><defName>s</defName><label>S</label><layout>{rows}</layout></StageDef>"
        ))
        .0
    }

    #[test]
    fn player_spawns_at_layout_marker() {
        let mut stage = stage_with_rows(&["....", ".P..", "...."]);
        assert_eq!(stage.player_cell(), Some(Cell::new(1, 1)));
        assert!(stage.drain_events().is_empty());
    }

    #[test]
    fn walls_and_void_reject_steps() {
        let mut stage = stage_with_rows(&["#P. "]);
        assert!(!stage.step_player(Direction::Left, false));
        assert!(stage.step_player(Direction::Right, false));
        assert!(!stage.step_player(Direction::Right, false));
        assert_eq!(stage.player_cell(), Some(Cell::new(2, 0)));
    }

    #[test]
    fn boulder_needs_strength_and_free_cell_behind() {
        let mut stage = stage_with_rows(&["PB.#"]);
        assert!(!stage.step_player(Direction::Right, false));
        assert_eq!(stage.player_cell(), Some(Cell::new(0, 0)));

        assert!(stage.step_player(Direction::Right, true));
        assert_eq!(stage.player_cell(), Some(Cell::new(1, 0)));
        let boulder = stage.entities_of(ActorKind::Boulder)[0].id;
        assert_eq!(stage.cell_of(boulder), Some(Cell::new(2, 0)));

        stage.tick(0.0);
        assert!(!stage.step_player(Direction::Right, true));
        assert_eq!(stage.player_cell(), Some(Cell::new(1, 0)));
        assert_eq!(stage.cell_of(boulder), Some(Cell::new(2, 0)));
    }

    #[test]
    fn key_gateway_and_lava_report_entries_once() {
        let mut stage = stage_with_rows(&["PKLG"]);
        stage.step_player(Direction::Right, false);
        stage.resolve_contacts();
        stage.resolve_contacts();
        let key = stage.entities_of(ActorKind::Key)[0].id;
        assert_eq!(stage.drain_events(), vec![StageEvent::KeyTouched { key }]);

        stage.step_player(Direction::Right, false);
        stage.resolve_contacts();
        assert_eq!(
            stage.drain_events(),
            vec![StageEvent::AvatarEnteredHazard {
                avatar: ActorKind::Player,
                pink: false
            }]
        );
    }

    #[test]
    fn plate_opens_every_door_while_pressed() {
        let mut stage = stage_with_rows(&["P_.D"]);
        let door = stage.entities_of(ActorKind::Door)[0].id;
        assert!(stage.world().find_entity(door).expect("door").collider.enabled);

        stage.step_player(Direction::Right, false);
        stage.resolve_contacts();
        assert_eq!(
            stage.drain_events(),
            vec![StageEvent::DoorToggled { door, open: true }]
        );
        assert!(!stage.world().find_entity(door).expect("door").collider.enabled);

        stage.step_player(Direction::Right, false);
        stage.resolve_contacts();
        assert_eq!(
            stage.drain_events(),
            vec![StageEvent::DoorToggled { door, open: false }]
        );
    }

    #[test]
    fn trap_destroys_the_enemy_that_enters_it() {
        let (mut stage, _) = build(
            r#"<StageDef><defName>s</defName><label>S</label>
                <layout><row>P..</row></layout>
                <patrols><patrol speed="1"><point x="2" y="0"/><point x="1" y="0"/></patrol></patrols>
            </StageDef>"#,
        );
        stage.step_player(Direction::Right, false);
        stage.place_trap();
        stage.step_player(Direction::Left, false);
        stage.resolve_contacts();
        stage.drain_events();

        stage.tick(1.0);
        let events = stage.drain_events();
        assert!(matches!(events.as_slice(), [StageEvent::EnemyTrapped { .. }]));
        assert!(stage.entities_of(ActorKind::PatrolEnemy).is_empty());
        assert!(stage.entities_of(ActorKind::Trap).is_empty());
    }

    #[test]
    fn echo_doll_waits_for_activation() {
        let mut stage = stage_with_rows(&["P.."]);
        assert_eq!(stage.place_echo_doll(), Some(Cell::new(0, 0)));
        assert!(stage.step_player(Direction::Right, false));
        assert!(!stage.step_doll(Direction::Right, false));

        assert!(stage.enable_echo_doll());
        assert!(stage.step_player(Direction::Right, false));
        assert!(stage.step_doll(Direction::Right, false));
        let doll = stage.doll().expect("doll");
        assert_eq!(stage.cell_of(doll), Some(Cell::new(1, 0)));
    }

    #[test]
    fn followers_mirror_the_broadcast_move() {
        let (mut stage, _) = build(
            r#"<StageDef><defName>s</defName><label>S</label>
                <layout><row>P...</row><row>....</row></layout>
                <followers>
                    <follower x="3" y="1" axis="X" ignoreAbility="true"/>
                    <follower x="3" y="0" axis="Both"/>
                </followers>
            </StageDef>"#,
        );
        let mut pipeline = TurnPipeline::new();
        stage.attach_followers(&mut pipeline);
        assert_eq!(pipeline.player_moved_subscribers(), 2);

        assert!(stage.step_player(Direction::Down, false));
        pipeline.notify_player_moved(engine::GameState::Playing, Direction::Left, false, &mut stage);
        let cells = stage
            .entities_of(ActorKind::FollowerEnemy)
            .iter()
            .map(|entity| entity.id)
            .collect::<Vec<_>>();
        assert_eq!(stage.cell_of(cells[0]), Some(Cell::new(2, 1)));
        assert_eq!(stage.cell_of(cells[1]), Some(Cell::new(3, 0)));

        stage.detach_followers(&mut pipeline);
        assert_eq!(pipeline.player_moved_subscribers(), 0);
    }
}
