use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crm_api::catalog::FieldCatalog;
use crm_api::config::{env_required, ConfigError, ServerConfig};
use crm_api::state::AppState;
use crm_api::{background, build_app};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crm_api=debug,crm_db=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = env_required("DATABASE_URL")?;
    let pool = crm_db::create_pool(&database_url).await?;
    crm_db::health_check(&pool).await?;
    tracing::info!("Database connection pool created");

    crm_db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    // --- Field catalog ---
    let catalog = Arc::new(FieldCatalog::new());
    let snapshot = catalog.refresh(&pool).await?;
    tracing::info!(
        fields = snapshot.fields.len(),
        active_rules = snapshot.active_rules.len(),
        "Field catalog loaded"
    );

    let cancel = CancellationToken::new();
    let refresh_handle = tokio::spawn(background::catalog_refresh::run(
        pool.clone(),
        Arc::clone(&catalog),
        config.catalog_refresh_secs,
        cancel.clone(),
    ));

    // --- Router ---
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let host: IpAddr = config.host.parse().map_err(|_| ConfigError::Invalid {
        key: "HOST",
        value: config.host.clone(),
    })?;
    let addr = SocketAddr::new(host, config.port);

    let state = AppState {
        pool,
        config: Arc::new(config),
        catalog,
    };
    let app = build_app(state)?;

    // --- Serve ---
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped accepting connections, cleaning up");
    cancel.cancel();
    if tokio::time::timeout(shutdown_timeout, refresh_handle)
        .await
        .is_err()
    {
        tracing::warn!("Catalog refresh job did not stop in time");
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
