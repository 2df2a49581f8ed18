//! Survey Engine - Main Entry Point
//!
//! This module initializes and starts the Axum web server: configuration,
//! database pool, migrations, definition snapshot, and the HTTP router.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{middleware as axum_middleware, Router};
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

use survey_engine::{
    config::{Environment, Settings},
    db,
    middleware::cors::{cors_layer, cors_layer_multiple_origins},
    middleware::rate_limit::{default_rate_limit_layer, rate_limit_middleware},
    routes,
    services::definition_store::DefinitionSnapshot,
    state::AppState,
    utils::logging::{create_trace_layer, init_tracing},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let config = match Settings::new() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(anyhow::anyhow!("Configuration error: {}", e));
        }
    };

    init_tracing(Some(match config.environment {
        Environment::Production => survey_engine::utils::logging::Environment::Production,
        _ => survey_engine::utils::logging::Environment::Development,
    }));

    info!("Starting survey engine");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        environment = %config.environment,
        port = config.server.port,
        log_level = %config.server.log_level,
        "Configuration loaded"
    );

    info!("Connecting to PostgreSQL...");
    let db_config = db::DbConfig {
        max_connections: config.database.max_connections,
        min_connections: config.database.min_connections,
        acquire_timeout: Duration::from_secs(config.database.connection_timeout_secs),
        idle_timeout: Duration::from_secs(600),
    };
    let db = match db::init_pool_with_url(&config.database.url, Some(db_config)).await {
        Ok(db) => {
            info!("PostgreSQL connection established");
            db
        }
        Err(e) => {
            error!("Failed to connect to PostgreSQL: {}", e);
            return Err(anyhow::anyhow!("Database connection error: {}", e));
        }
    };

    info!("Running migrations...");
    if let Err(e) = db::migrations::run_migrations(db.pool()).await {
        error!("Failed to run migrations: {}", e);
        return Err(anyhow::anyhow!("Migration error: {}", e));
    }

    info!("Seeding sample survey...");
    if let Err(e) = db::seed::seed_sample_survey(db.pool()).await {
        error!("Failed to seed sample survey: {}", e);
    }

    info!(
        survey_id = config.engine.default_survey_id,
        "Loading survey definition snapshot..."
    );
    let definitions =
        match DefinitionSnapshot::load(db.pool(), config.engine.default_survey_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Failed to load survey definition: {}", e);
                return Err(anyhow::anyhow!("Definition load error: {}", e));
            }
        };

    let state = AppState::new(db.pool().clone(), config.clone(), definitions);

    let app = create_app(state, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;
    info!(
        "Server is ready to accept connections on port {}",
        config.server.port
    );

    log_startup_info(&config);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Log startup information about configured features
fn log_startup_info(config: &Settings) {
    info!("=== Server Configuration ===");
    info!("  Environment: {}", config.environment);
    info!("  Port: {}", config.server.port);
    info!("  Frontend URL: {}", config.server.frontend_url);
    info!("  Default survey id: {}", config.engine.default_survey_id);
    info!(
        "  Max repeat instances: {}",
        config.engine.max_repeat_instances
    );
    info!("============================");
}

/// Creates the main application with all routes and middleware
///
/// Routes are organized under /api:
/// - /api/health - health check endpoints
/// - /api/respondents - the public façade (init, navigate, saveAnswer, finalize, removeDeleted)
/// - /api/docs, /api/openapi.json - Swagger UI / OpenAPI spec
fn create_app(state: AppState, config: &Settings) -> Router {
    let app = routes::create_router(state);
    let rate_limiter = default_rate_limit_layer();

    app.layer(axum_middleware::from_fn_with_state(
        rate_limiter,
        rate_limit_middleware,
    ))
    .layer(CompressionLayer::new())
    .layer(TimeoutLayer::new(Duration::from_secs(
        config.server.request_timeout_secs,
    )))
    .layer(create_trace_layer())
    .layer(build_cors_layer(config))
}

/// Build CORS layer based on configuration
fn build_cors_layer(config: &Settings) -> tower_http::cors::CorsLayer {
    if config.is_development() {
        let origins = config.cors_origins();
        let origin_strs: Vec<&str> = origins.iter().map(|s| s.as_str()).collect();
        cors_layer_multiple_origins(origin_strs)
    } else {
        cors_layer()
    }
}
