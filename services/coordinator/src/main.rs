//! jury coordinator
//!
//! Serves the judging API: judges ask for batches of teams, enter scores
//! and submit them. Scores persist to Postgres when `DATABASE_URL` is set
//! and to memory otherwise.

use std::sync::Arc;

use anyhow::Result;
use jury_allocator::{random_source, Allocator, InMemoryStore, JudgeRegistry, ScoreStore};
use jury_coordinator::{api, config, db::Database, state::AppState};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to JURY_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting jury coordinator");
    info!(
        listen_addr = %config.listen_addr,
        team_start = config.allocator.team_range.start(),
        team_end = config.allocator.team_range.end(),
        batch_size = config.allocator.batch_size,
        max_teams = config.allocator.max_teams,
        "Configuration loaded"
    );

    // Pick the score backend
    let (db, scores, judges): (Option<Database>, Arc<dyn ScoreStore>, Arc<dyn JudgeRegistry>) =
        match &config.database {
            Some(db_config) => {
                let db = match Database::connect(db_config).await {
                    Ok(db) => {
                        info!("Database connection established");
                        db
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to connect to database");
                        return Err(e.into());
                    }
                };

                // Run migrations in dev mode
                if config.dev_mode {
                    info!("Running database migrations (dev mode)");
                    if let Err(e) = db.run_migrations().await {
                        error!(error = %e, "Failed to run migrations");
                        return Err(e.into());
                    }
                }

                let store = Arc::new(db.score_store());
                let scores: Arc<dyn ScoreStore> = store.clone();
                let judges: Arc<dyn JudgeRegistry> = store;
                (Some(db), scores, judges)
            }
            None => {
                warn!("DATABASE_URL not set; scores are kept in memory only");
                let store = Arc::new(InMemoryStore::new());
                let scores: Arc<dyn ScoreStore> = store.clone();
                let judges: Arc<dyn JudgeRegistry> = store;
                (None, scores, judges)
            }
        };

    // Rebuild coverage from stored history
    let allocator = Allocator::bootstrap(
        config.allocator.clone(),
        scores,
        judges,
        random_source(config.rng_seed),
    )
    .await?;

    // Create application state
    let state = AppState::new(Arc::new(allocator), db);

    // Build and run the server
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn the server with graceful shutdown
    let mut server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    // Wait for shutdown signal (Ctrl+C)
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);

            let shutdown_timeout = std::time::Duration::from_secs(10);
            if tokio::time::timeout(shutdown_timeout, &mut server_handle).await.is_err() {
                warn!("HTTP server did not shut down in time");
            }
        }
        result = &mut server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    info!("Coordinator shutdown complete");
    Ok(())
}
