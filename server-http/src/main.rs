use keeper::auth::IndexCredentialDirectory;
use keeper::ports::{StorageFactory, SystemClock};
use server_http::{AppState, build_router, scheduler};
use shared::config::Config;
use std::sync::Arc;
use storage_engine::UnifiedStorageFactory;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if exists) before the filter reads RUST_LOG
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting keeper HTTP server...");
    match dotenv {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let config = Config::from_env();

    let stores = match UnifiedStorageFactory.create_from_config(&config) {
        Ok(stores) => stores,
        Err(e) => {
            error!("Failed to initialize storage: {}", e);
            std::process::exit(1);
        }
    };

    info!("Provisioning admin credential...");
    if let Err(e) = IndexCredentialDirectory::new(stores.index.clone())
        .provision(&config.admin_username, &config.admin_password)
        .await
    {
        error!("Failed to provision admin credential: {}", e);
        std::process::exit(1);
    }

    let state = AppState::new(stores, &config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reclamation = scheduler::spawn(
        state.coordinator.clone(),
        Arc::new(SystemClock),
        config.reclamation.sweep_interval,
        shutdown_rx,
    );

    let router = build_router(state, &config);

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .expect("Failed to bind HTTP listener");

    info!("HTTP Server listening on http://{}", bind_address);
    info!(
        "Try: curl -u {}:<password> -T ./file http://localhost:{}/my-object-key",
        config.admin_username, config.http_port
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server failed");

    let _ = shutdown_tx.send(true);
    if let Err(e) = reclamation.await {
        warn!("Reclamation scheduler ended abnormally: {}", e);
    }

    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
