use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use common::storage::filesystem::FilesystemBlobStore;
use tracing::info;

use server::config::AppConfig;
use server::hooks::HookRegistry;
use server::importer::{ChallengeImporter, ExtractLimits};
use server::provision::{ProvisionOptions, provision};

/// Create the G2Net host account and import its challenge bundle.
///
/// Database and storage settings come from the server configuration
/// (`config/config.toml`, `PODIUM__*` variables).
#[derive(Parser, Debug)]
#[command(name = "podium-provision", version)]
struct Args {
    /// Directory holding the bundle at `g2net_challenge/challenge_config.zip`.
    #[arg(long, env = "PODIUM_BASE_DIR", default_value = ".")]
    base_dir: PathBuf,

    /// Bundle path. Overrides the location derived from `--base-dir`.
    #[arg(long, env = "PODIUM_PROVISION_ARCHIVE")]
    archive: Option<PathBuf>,

    #[arg(long, env = "PODIUM_PROVISION_EMAIL")]
    email: Option<String>,

    #[arg(long, env = "PODIUM_PROVISION_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "PODIUM_PROVISION_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long, env = "PODIUM_PROVISION_TEAM")]
    team_name: Option<String>,
}

impl Args {
    fn options(self) -> ProvisionOptions {
        let mut options = ProvisionOptions::with_base_dir(&self.base_dir);
        if let Some(archive) = self.archive {
            options.archive = archive;
        }
        if let Some(email) = self.email {
            options.email = email;
        }
        if let Some(username) = self.username {
            options.username = username;
        }
        if let Some(password) = self.password {
            options.password = password;
        }
        if let Some(team_name) = self.team_name {
            options.team_name = team_name;
        }
        options
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let options = Args::parse().options();
    let config = AppConfig::load().context("Failed to load config")?;

    let db = server::database::init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;
    server::seed::seed_role_permissions(&db)
        .await
        .context("Failed to seed roles")?;

    let blobs = FilesystemBlobStore::new(&config.storage.blob_dir, config.storage.max_blob_size)
        .await
        .context("Failed to open blob store")?;
    let importer = ChallengeImporter::new(
        Arc::new(blobs),
        HookRegistry::with_defaults(),
        ExtractLimits::from(&config.import),
        config.queue.environment.clone(),
    );

    info!(archive = %options.archive.display(), "Provisioning");
    let provisioned = provision(&db, &importer, &options)
        .await
        .context("Provisioning failed")?;

    info!(
        user_id = provisioned.user.id,
        host_team_id = provisioned.host_team.id,
        challenge_id = provisioned.challenge.challenge.id,
        slug = provisioned.challenge.challenge.slug.as_deref().unwrap_or_default(),
        "Challenge provisioned"
    );
    Ok(())
}
