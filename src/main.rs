use film_catalog::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database, then the HTTP server until a
/// shutdown signal arrives.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins over the per-environment default.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.env.default_log_filter().into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Dev | Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database Initialization (Postgres)
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_with(config.database.connect_options())
        .await
        .expect("FATAL: Failed to connect to Postgres. Check the DB_* variables.");

    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("FATAL: Failed to apply migrations.");
        tracing::info!("Migrations applied.");
    }

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. Router and Server Startup
    let addr = config.server_addr.clone();
    let app = create_router(AppState::new(repo, config));

    let listener = TcpListener::bind(&addr)
        .await
        .expect("FATAL: Failed to bind SERVER_ADDR.");

    tracing::info!("Listening on {}", addr);
    tracing::info!("OpenAPI document available at: http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("FATAL: HTTP server error.");

    tracing::info!("Server stopped.");
}

/// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
async fn shutdown_signal() {
    let ctrl_c = until_signal(signal::ctrl_c(), "Ctrl-C");

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received.");
}

/// Waits for `listener`. A handler that failed to install never fires, so it parks
/// instead of resolving and stopping the server.
async fn until_signal<F>(listener: F, name: &str)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = listener.await {
        tracing::error!(error = %e, "failed to listen for {name}");
        std::future::pending::<()>().await;
    }
}
