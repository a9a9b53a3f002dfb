use crate::grid::{Cell, GridLayout, TerrainGrid, Tilemap, TilemapError};
use crate::world::{ActorKind, FollowAxis};

const GROUND_TILE: u16 = 1;
const WALL_TILE: u16 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ItemType {
    Active,
    #[default]
    Passive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    WalkOnLava,
    WalkOnPinkLava,
    Strength,
    EnableFollowEnemies,
    PlaceTrap,
    PlaceEchoDoll,
    ActivateEchoDoll,
}

impl EffectKind {
    pub fn parse(raw: &str) -> Option<EffectKind> {
        match raw {
            "WalkOnLava" => Some(EffectKind::WalkOnLava),
            "WalkOnPinkLava" => Some(EffectKind::WalkOnPinkLava),
            "Strength" => Some(EffectKind::Strength),
            "EnableFollowEnemies" => Some(EffectKind::EnableFollowEnemies),
            "PlaceTrap" => Some(EffectKind::PlaceTrap),
            "PlaceEchoDoll" => Some(EffectKind::PlaceEchoDoll),
            "ActivateEchoDoll" => Some(EffectKind::ActivateEchoDoll),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectSpec {
    pub kind: EffectKind,
    /// Item defName handed back to the inventory by `PlaceEchoDoll`.
    pub activator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDef {
    pub def_name: String,
    pub label: String,
    pub description: String,
    pub icon: Option<String>,
    pub item_type: ItemType,
    pub effect: Option<EffectSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutTile {
    Void,
    Floor,
    Wall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutPlacement {
    pub kind: ActorKind,
    pub cell: Cell,
}

/// Parsed `<layout>` rows. Cell (0,0) is the bottom-left tile; the first row is the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageLayout {
    pub width: u32,
    pub height: u32,
    pub tiles: Vec<LayoutTile>,
    pub player_spawn: Cell,
    pub placements: Vec<LayoutPlacement>,
}

impl StageLayout {
    pub fn tile_at(&self, cell: Cell) -> LayoutTile {
        if cell.x < 0 || cell.y < 0 || cell.x as u32 >= self.width || cell.y as u32 >= self.height
        {
            return LayoutTile::Void;
        }
        let index = cell.y as usize * self.width as usize + cell.x as usize;
        self.tiles.get(index).copied().unwrap_or(LayoutTile::Void)
    }

    pub fn is_walkable(&self, cell: Cell) -> bool {
        self.tile_at(cell) == LayoutTile::Floor
    }

    pub fn build_terrain(&self, grid: GridLayout) -> Result<TerrainGrid, TilemapError> {
        let ground = self
            .tiles
            .iter()
            .map(|tile| match tile {
                LayoutTile::Void => 0,
                LayoutTile::Floor | LayoutTile::Wall => GROUND_TILE,
            })
            .collect::<Vec<_>>();
        let collision = self
            .tiles
            .iter()
            .map(|tile| match tile {
                LayoutTile::Wall => WALL_TILE,
                LayoutTile::Void | LayoutTile::Floor => 0,
            })
            .collect::<Vec<_>>();
        TerrainGrid::new(
            grid,
            Tilemap::new(self.width, self.height, ground)?,
            Tilemap::new(self.width, self.height, collision)?,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickupSpawn {
    pub cell: Cell,
    pub item: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowerSpawn {
    pub cell: Cell,
    pub axis: FollowAxis,
    pub ignore_ability: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatrolRoute {
    /// Cells per second of scaled time.
    pub speed: f32,
    pub points: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageDef {
    pub def_name: String,
    pub label: String,
    pub story: bool,
    pub layout: StageLayout,
    pub pickups: Vec<PickupSpawn>,
    pub followers: Vec<FollowerSpawn>,
    pub patrols: Vec<PatrolRoute>,
}
