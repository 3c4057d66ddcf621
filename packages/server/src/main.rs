use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use common::storage::filesystem::FilesystemBlobStore;
use tracing::info;

use server::config::AppConfig;
use server::hooks::HookRegistry;
use server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = AppConfig::load().context("Failed to load config")?;

    let db = server::database::init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;
    server::seed::seed_role_permissions(&db)
        .await
        .context("Failed to seed roles")?;
    server::seed::ensure_indexes(&db)
        .await
        .context("Failed to create indexes")?;

    let blobs = FilesystemBlobStore::new(&config.storage.blob_dir, config.storage.max_blob_size)
        .await
        .context("Failed to open blob store")?;
    info!(root = %blobs.root().display(), "Blob store ready");

    let hooks = HookRegistry::with_defaults();
    info!(hooks = hooks.len(), "Post-commit hooks registered");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = AppState {
        db,
        config,
        blobs: Arc::new(blobs),
        hooks,
    };
    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running at http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
