mod config;
mod db;
mod routes;
mod handlers;
mod models;
mod error;
mod middleware;
mod services;

use std::sync::Arc;
use tower_http::{ compression::CompressionLayer, trace::TraceLayer };
use tracing_subscriber::{ layer::SubscriberExt, util::SubscriberInitExt };

use config::Config;
use db::AppState;
use services::{ analysis::AnalysisService, gemini::GeminiClient };

#[tokio::main]
async fn main() {
    tracing_subscriber
        ::registry()
        .with(
            tracing_subscriber::EnvFilter
                ::try_from_default_env()
                .unwrap_or_else(|_|
                    "nutriscan=debug,tower_http=debug,axum::rejection=trace".into()
                )
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    tracing::info!("Environment: {:?}", config.server.environment);
    tracing::info!("CORS enabled: {}", config.security.cors_enabled);

    let db = db::setup_database(&config).await.expect("Failed to connect to MongoDB");

    let redis = db::setup_redis(&config).await.expect("Failed to connect to Redis");

    let gemini = GeminiClient::new(config.gemini.clone()).expect("Failed to build Gemini client");
    let analysis = Arc::new(AnalysisService::new(Arc::new(gemini)));
    tracing::info!("Initialized analysis service (model: {})", config.gemini.model);

    let state = AppState {
        db,
        redis,
        config: config.clone(),
        analysis,
    };

    let app = routes
        ::create_routes(state)
        .layer(middleware::cors::setup_cors(&config))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Nutriscan API server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.expect("Failed to bind to address");

    axum::serve(listener, app).await.expect("Failed to start server");
}
