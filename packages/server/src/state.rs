use std::sync::Arc;

use common::storage::BlobStore;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::hooks::HookRegistry;
use crate::importer::{ChallengeImporter, ExtractLimits};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub blobs: Arc<dyn BlobStore>,
    pub hooks: HookRegistry,
}

impl AppState {
    pub fn importer(&self) -> ChallengeImporter {
        ChallengeImporter::new(
            self.blobs.clone(),
            self.hooks.clone(),
            ExtractLimits::from(&self.config.import),
            self.config.queue.environment.clone(),
        )
    }
}
