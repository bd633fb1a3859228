use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use mercado_gateway::catalog::LocalCatalog;
use mercado_gateway::{api, AppState, Config, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mercado_gateway=info,tower_http=info".into()),
        )
        .init();

    // Load config
    let config = Config::from_env()?;
    info!("mercado-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}:{}", config.host, config.port);

    if config.ml_client_id.is_none() {
        warn!("MERCADO_LIVRE_CLIENT_ID not set — OAuth endpoints will answer 503");
    }

    // Load the fallback dataset once; the process serves without it, at the
    // cost of empty policy-block fallbacks.
    let catalog = match &config.local_parts_path {
        Some(path) => match LocalCatalog::load(path) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("Local parts dataset unavailable: {e}");
                LocalCatalog::empty()
            }
        },
        None => {
            warn!("LOCAL_PARTS_PATH not set — policy-block fallback will serve empty results");
            LocalCatalog::empty()
        }
    };

    // Build shared state
    let addr = format!("{}:{}", config.host, config.port);
    let state: SharedState = Arc::new(AppState::new(config, catalog));

    // Build router and serve
    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server ready");
    axum::serve(listener, app).await?;

    Ok(())
}
