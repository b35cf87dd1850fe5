use anyhow::Result;
use receipt_drop::{
    config::AppConfig, routes::routes::routes, services::storage_service::UploadStore,
    state::AppState,
};
use std::{io::ErrorKind, net::SocketAddr};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting receipt-drop with config: {:?}", cfg);

    // --- Ensure upload directory exists ---
    let store = UploadStore::new(cfg.uploads_dir.clone());
    store.init().await?;

    if !cfg.public_dir.join("index.html").exists() {
        tracing::warn!(
            "No index.html under {}; front-end requests will 404",
            cfg.public_dir.display()
        );
    }
    tracing::info!("Serving frontend from {}", cfg.public_dir.display());
    tracing::info!("Storing uploads in {}", cfg.uploads_dir.display());

    // --- Build router ---
    let state = AppState::new(store, cfg.policy, cfg.public_dir.clone());
    let app = routes(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
