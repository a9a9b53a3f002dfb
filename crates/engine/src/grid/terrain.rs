use thiserror::Error;

use super::geometry::{Cell, Vec2};

pub const EMPTY_TILE: u16 = 0;

/// Terrain collaborator queried by movement and push resolution.
pub trait Terrain {
    fn has_ground(&self, cell: Cell) -> bool;
    fn has_static_collision(&self, cell: Cell) -> bool;
    fn cell_to_world(&self, cell: Cell) -> Vec2;
    fn world_to_cell(&self, position: Vec2) -> Cell;

    fn snap(&self, position: Vec2) -> Vec2 {
        self.cell_to_world(self.world_to_cell(position))
    }
}

/// Grid origin convention:
/// - `origin` is the world position of cell (0,0) bottom-left corner.
/// - The center of cell (x,y) is `origin + (x + 0.5, y + 0.5) * cell_size`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub origin: Vec2,
    pub cell_size: f32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            origin: Vec2::ZERO,
            cell_size: 1.0,
        }
    }
}

impl GridLayout {
    pub fn cell_to_world(&self, cell: Cell) -> Vec2 {
        Vec2 {
            x: self.origin.x + (cell.x as f32 + 0.5) * self.cell_size,
            y: self.origin.y + (cell.y as f32 + 0.5) * self.cell_size,
        }
    }

    pub fn world_to_cell(&self, position: Vec2) -> Cell {
        let size = if self.cell_size > 0.0 {
            self.cell_size
        } else {
            1.0
        };
        Cell {
            x: ((position.x - self.origin.x) / size).floor() as i32,
            y: ((position.y - self.origin.y) / size).floor() as i32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tilemap {
    width: u32,
    height: u32,
    tiles: Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TilemapError {
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
    #[error("layer size mismatch: ground is {ground_width}x{ground_height}, collision is {collision_width}x{collision_height}")]
    LayerSizeMismatch {
        ground_width: u32,
        ground_height: u32,
        collision_width: u32,
        collision_height: u32,
    },
}

impl Tilemap {
    pub fn new(width: u32, height: u32, tiles: Vec<u16>) -> Result<Self, TilemapError> {
        let expected = width as usize * height as usize;
        let actual = tiles.len();
        if expected != actual {
            return Err(TilemapError::TileCountMismatch { expected, actual });
        }
        Ok(Self {
            width,
            height,
            tiles,
        })
    }

    pub fn filled(width: u32, height: u32, tile: u16) -> Self {
        Self {
            width,
            height,
            tiles: vec![tile; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index_of(&self, cell: Cell) -> Option<usize> {
        if cell.x < 0 || cell.y < 0 {
            return None;
        }
        let (x, y) = (cell.x as u32, cell.y as u32);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn tile_at(&self, cell: Cell) -> Option<u16> {
        self.index_of(cell)
            .and_then(|index| self.tiles.get(index).copied())
    }

    pub fn has_tile(&self, cell: Cell) -> bool {
        self.tile_at(cell).is_some_and(|tile| tile != EMPTY_TILE)
    }

    pub fn set_tile(&mut self, cell: Cell, tile: u16) -> bool {
        match self.index_of(cell) {
            Some(index) => {
                self.tiles[index] = tile;
                true
            }
            None => false,
        }
    }
}

/// Ground and static collision layers sharing one layout.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainGrid {
    layout: GridLayout,
    ground: Tilemap,
    collision: Tilemap,
}

impl TerrainGrid {
    pub fn new(
        layout: GridLayout,
        ground: Tilemap,
        collision: Tilemap,
    ) -> Result<Self, TilemapError> {
        if ground.width() != collision.width() || ground.height() != collision.height() {
            return Err(TilemapError::LayerSizeMismatch {
                ground_width: ground.width(),
                ground_height: ground.height(),
                collision_width: collision.width(),
                collision_height: collision.height(),
            });
        }
        Ok(Self {
            layout,
            ground,
            collision,
        })
    }

    pub fn layout(&self) -> GridLayout {
        self.layout
    }

    pub fn width(&self) -> u32 {
        self.ground.width()
    }

    pub fn height(&self) -> u32 {
        self.ground.height()
    }

    pub fn ground(&self) -> &Tilemap {
        &self.ground
    }

    pub fn collision(&self) -> &Tilemap {
        &self.collision
    }
}

impl Terrain for TerrainGrid {
    fn has_ground(&self, cell: Cell) -> bool {
        self.ground.has_tile(cell)
    }

    fn has_static_collision(&self, cell: Cell) -> bool {
        self.collision.has_tile(cell)
    }

    fn cell_to_world(&self, cell: Cell) -> Vec2 {
        self.layout.cell_to_world(cell)
    }

    fn world_to_cell(&self, position: Vec2) -> Cell {
        self.layout.world_to_cell(position)
    }
}
