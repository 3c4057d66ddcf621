//! Challenge bundle import.
//!
//! A bundle flows through four stages:
//! [`archive`] unpacks the zip into scratch space, [`manifest`] parses the
//! YAML and loads the files it names, [`assembler`] validates the result and
//! checks cross references, and [`gateway`] writes the rows inside the
//! caller's transaction. Post-commit hooks run once the transaction commits.

pub mod archive;
pub mod assembler;
pub mod error;
pub mod gateway;
pub mod manifest;

use std::sync::Arc;

use common::storage::BlobStore;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use tracing::{info, instrument};

use crate::config::ImportConfig;
use crate::entity::challenge_host_team;
use crate::hooks::{ChallengeChange, HookRegistry};

pub use archive::ExtractLimits;
pub use assembler::ImportPlan;
pub use error::ImportError;
pub use gateway::{PersistedChallenge, StoredFiles};

impl From<&ImportConfig> for ExtractLimits {
    fn from(config: &ImportConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            max_total_size: config.max_total_size,
        }
    }
}

/// A validated bundle whose files are already in the blob store.
#[derive(Debug, Clone)]
pub struct PreparedImport {
    pub plan: ImportPlan,
    pub files: StoredFiles,
}

#[derive(Clone)]
pub struct ChallengeImporter {
    blobs: Arc<dyn BlobStore>,
    hooks: HookRegistry,
    limits: ExtractLimits,
    environment: String,
}

impl ChallengeImporter {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        hooks: HookRegistry,
        limits: ExtractLimits,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            blobs,
            hooks,
            limits,
            environment: environment.into(),
        }
    }

    /// Unpack, parse and validate `archive`, then store its files.
    ///
    /// The scratch directory is gone by the time this returns, on success or
    /// failure.
    pub async fn prepare(&self, archive: Vec<u8>) -> Result<PreparedImport, ImportError> {
        let resolved = {
            let bundle = archive::extract(archive, self.limits).await?;
            manifest::load(&bundle).await?
        };
        let plan = assembler::assemble(resolved)?;
        let files = gateway::store_files(self.blobs.as_ref(), &plan.bundle).await?;
        Ok(PreparedImport { plan, files })
    }

    /// Write a prepared import on `db`, typically an open transaction.
    ///
    /// Hooks are not run; call [`ChallengeImporter::notify`] after commit.
    pub async fn persist<C: ConnectionTrait>(
        &self,
        db: &C,
        prepared: &PreparedImport,
        host_team: &challenge_host_team::Model,
    ) -> Result<PersistedChallenge, ImportError> {
        gateway::persist(
            db,
            &prepared.plan,
            &prepared.files,
            host_team,
            &self.environment,
        )
        .await
    }

    pub async fn notify(&self, persisted: &PersistedChallenge) {
        let change = ChallengeChange::created(persisted.challenge.clone(), persisted.phases.clone());
        self.hooks.run(&change).await;
    }

    /// Import a bundle for `host_team` in its own transaction.
    #[instrument(skip(self, db, archive, host_team), fields(host_team_id = host_team.id, size = archive.len()))]
    pub async fn import(
        &self,
        db: &DatabaseConnection,
        archive: Vec<u8>,
        host_team: &challenge_host_team::Model,
    ) -> Result<PersistedChallenge, ImportError> {
        let prepared = self.prepare(archive).await?;

        let txn = db.begin().await?;
        let persisted = self.persist(&txn, &prepared, host_team).await?;
        txn.commit().await?;

        info!(
            challenge_id = persisted.challenge.id,
            title = %persisted.challenge.title,
            "Imported challenge bundle"
        );
        self.notify(&persisted).await;
        Ok(persisted)
    }
}
