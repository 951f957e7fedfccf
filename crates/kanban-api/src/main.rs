//! Kanban API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use kanban_api::config::ServerConfig;
use kanban_api::error::AppError;
use kanban_api::state::AppState;
use kanban_board::domain::repository::BoardStore;
use kanban_core::clock::SystemClock;
use kanban_store::in_memory::InMemoryBoardStore;
use kanban_store::pg_board_store::PgBoardStore;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting kanban API server");

    let config = ServerConfig::from_env()?;

    let store: Arc<dyn BoardStore> = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await?;
            let store = PgBoardStore::new(pool);
            store.migrate().await?;
            tracing::info!("Using PostgreSQL board store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, boards are kept in memory only");
            Arc::new(InMemoryBoardStore::new())
        }
    };

    let app_state = AppState::new(
        store,
        Arc::new(SystemClock),
        config.mutator.clone(),
        config.channel_capacity,
    );

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = kanban_api::app(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
