mod atomic_io;
mod compiler;
mod database;
mod types;

pub use atomic_io::{write_bytes_atomic, write_text_atomic};
pub use compiler::{
    compile_def_database, compile_defs_from_str, ContentCompileError, ContentErrorCode,
    SourceLocation,
};
pub use database::{DefDatabase, ItemDefId, StageDefId};
pub use types::{
    EffectKind, EffectSpec, FollowerSpawn, ItemDef, ItemType, LayoutPlacement, LayoutTile,
    PatrolRoute, PickupSpawn, StageDef, StageLayout,
};
