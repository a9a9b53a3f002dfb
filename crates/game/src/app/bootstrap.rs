use engine::{
    compile_def_database, resolve_app_paths, ContentCompileError, LoopConfig, StartupError,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::gameplay::{CatalogError, GameSession, JsonProgressStore, LogAudioSink, SessionConfig};

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Content(#[from] ContentCompileError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) session: GameSession,
}

pub(crate) fn build_app() -> Result<AppWiring, AppError> {
    init_tracing();
    info!("=== Gridstep Startup ===");

    let paths = resolve_app_paths()?;
    info!(
        root = %paths.root.display(),
        content = %paths.base_content_dir.display(),
        saves = %paths.save_dir.display(),
        "app_paths_resolved"
    );
    let defs = compile_def_database(&paths.base_content_dir)?;
    let progress = JsonProgressStore::in_dir(&paths.save_dir);
    let session = GameSession::from_defs(
        SessionConfig::default(),
        &defs,
        Box::new(progress),
        Box::new(LogAudioSink),
    )?;

    Ok(AppWiring {
        config: LoopConfig::default(),
        session,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
