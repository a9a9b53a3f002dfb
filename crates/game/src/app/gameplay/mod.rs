pub(crate) mod actors;
pub(crate) mod audio;
pub(crate) mod effects;
pub(crate) mod gameplay_state;
pub(crate) mod inventory;
pub(crate) mod item_effects;
pub(crate) mod items;
pub(crate) mod presenter;
pub(crate) mod progress;
pub(crate) mod session;
pub(crate) mod stage;
pub(crate) mod stage_manager;
pub(crate) mod turns;

pub(crate) use audio::LogAudioSink;
pub(crate) use items::CatalogError;
pub(crate) use progress::JsonProgressStore;
pub(crate) use session::{GameSession, SessionConfig};
