mod config;
mod errors;
mod handlers;
mod models;
mod query;
mod store;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::store::ApplicationStore;

/// Main entry point for the application.
///
/// Initializes tracing, loads configuration, establishes the store pool, and
/// serves the HTTP routes with CORS, request tracing, a body-size cap, and
/// per-IP rate limiting (health check exempt).
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "credit_apps_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Establish the store pool and probe it once
    let store = ApplicationStore::connect(&config).await?;
    tracing::info!("Store connection pool established");

    let app_state = Arc::new(handlers::AppState {
        store,
        config: config.clone(),
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // API routes behind the protection layers
    let api_routes = Router::new()
        .route("/api/db2/test", get(handlers::db_test))
        .route("/api/db2/info", get(handlers::db_info))
        .route("/api/applications", get(handlers::list_applications))
        .route("/api/application", post(handlers::create_application))
        .route(
            "/api/application/:app_ref",
            get(handlers::get_application)
                .put(handlers::update_application)
                .delete(handlers::delete_application),
        )
        .route(
            "/api/application/:app_ref/status",
            patch(handlers::update_status),
        )
        .route(
            "/api/customer/:cis_number/applications",
            get(handlers::customer_applications),
        )
        .route(
            "/api/customer/:cis_number/summary",
            get(handlers::customer_summary),
        )
        .route("/api/search", get(handlers::search_applications))
        .route("/api/stats/overview", get(handlers::stats_overview))
        .route("/api/stats/by-status", get(handlers::stats_by_status))
        .route("/api/stats/by-product", get(handlers::stats_by_product))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 5MB max payload
                .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting; unmatched routes get structured JSON
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(api_routes)
        .fallback(handlers::not_found_fallback)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
