use std::sync::Arc;

use conductor_core::{CompletionWatcher, Config, LifecycleEngine, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    engine: Arc<LifecycleEngine>,
    watcher: Arc<CompletionWatcher>,
}

impl AppState {
    pub fn new(
        config: Config,
        engine: Arc<LifecycleEngine>,
        watcher: Arc<CompletionWatcher>,
    ) -> Self {
        Self {
            config,
            engine,
            watcher,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn engine(&self) -> &LifecycleEngine {
        &self.engine
    }

    pub fn watcher(&self) -> &CompletionWatcher {
        &self.watcher
    }
}
