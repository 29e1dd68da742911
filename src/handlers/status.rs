use axum::{ http::StatusCode, Json };
use serde_json::{ json, Value };

pub async fn health_check() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(
            json!({
            "success": true,
            "status": "healthy",
            "service": "Nutriscan API",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "environment": std::env::var("NODE_ENV").unwrap_or_else(|_| "development".to_string()),
        })
        ),
    )
}
