use moneycard::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresCardRepository, RepositoryState},
    InMemoryUserStore, UserStoreState,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// The asynchronous entry point: initializes configuration, logging, the
/// database pool, the user store, and the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (fail-fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // Prioritizes RUST_LOG, falling back to sensible defaults for development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "moneycard=debug,tower_http=info,axum=trace".into());

    // 3. Initialize logging based on environment: pretty output locally, JSON
    // in production for log aggregators.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let repo = Arc::new(PostgresCardRepository::new(pool)) as RepositoryState;

    // 5. User Store Initialization
    // CARD_USERS (username:role:salt:sha256hex, comma-separated) when
    // configured; otherwise the seeded development users, local mode only.
    let users: UserStoreState = match &config.user_spec {
        Some(spec) => Arc::new(
            InMemoryUserStore::from_spec(spec).expect("FATAL: CARD_USERS is malformed"),
        ),
        None => {
            tracing::warn!("CARD_USERS not set; using seeded development users");
            Arc::new(InMemoryUserStore::seeded())
        }
    };

    // 6. Unified State Assembly
    let app_state = AppState {
        repo,
        users,
        config: config.clone(),
    };

    // 7. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .expect("FATAL: Failed to bind listen address");

    tracing::info!("HTTP server bound successfully.");
    tracing::info!("Listening on {}", config.bind_addr);
    tracing::info!("API documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app).await.expect("server error");
}
