mod geometry;
mod terrain;

pub use geometry::{Cell, CellOffset, Direction, Vec2};
pub use terrain::{GridLayout, Terrain, TerrainGrid, Tilemap, TilemapError, EMPTY_TILE};
