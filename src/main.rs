use lan_drop::config::Config;
use lan_drop::create_router;
use lan_drop::handlers::AppState;
use lan_drop::storage::create_storage;
use std::io::ErrorKind;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lan_drop=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting file drop service");
    tracing::info!("Storage directory: {}", config.storage_path.display());
    tracing::info!("Max file size: {} bytes", config.max_file_size);

    // Initialize storage
    let storage = create_storage(&config);
    storage
        .prepare()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to prepare storage directory: {}", e))?;

    let state = AppState {
        storage,
        config: config.clone(),
    };
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::AddrInUse => anyhow::anyhow!(
                "Port {} is already in use; stop the program using it and retry",
                config.server_port
            ),
            _ => anyhow::anyhow!("Failed to bind {}: {}", addr, e),
        })?;

    tracing::info!("Server listening on http://localhost:{}", config.server_port);
    axum::serve(listener, app).await?;

    Ok(())
}
