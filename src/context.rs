use crate::config::AppConfig;
use crate::core::executor::CommandExecutor;
use crate::core::notifications::Notifier;
use std::sync::Arc;

/// Shared handles the orchestrator and its tasks operate through. All
/// capabilities are injected so tests can substitute fakes.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub notifier: Arc<dyn Notifier>,
    pub executor: Arc<dyn CommandExecutor>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        notifier: Arc<dyn Notifier>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            notifier,
            executor,
        }
    }
}
