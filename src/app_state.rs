use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{backgrounds::BackgroundCatalog, job_manager::JobManager};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub manager: Arc<JobManager>,
    pub backgrounds: Arc<BackgroundCatalog>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        manager: Arc<JobManager>,
        backgrounds: Arc<BackgroundCatalog>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            manager,
            backgrounds,
        }
    }
}
