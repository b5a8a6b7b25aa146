use std::sync::Arc;

use rtd_domain::config::{Config, TurnConfig};
use rtd_orchestrator::GeneratorSet;
use rtd_session::registry::SessionRegistry;

/// Shared application state passed to every handler.
///
/// Fields are grouped by concern:
/// - **Core services** — config, generator stage set
/// - **Session management** — the in-memory session registry
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub turn_config: TurnConfig,
    pub generators: Arc<GeneratorSet>,

    // ── Session management ────────────────────────────────────────────
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Arc<Config>, generators: Arc<GeneratorSet>) -> Self {
        let turn_config = config.turn.clone();
        Self {
            config,
            turn_config,
            generators,
            registry: Arc::new(SessionRegistry::new()),
        }
    }
}
