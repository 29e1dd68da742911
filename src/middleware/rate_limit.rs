use axum::{
    extract::{ Request, State },
    http::{ HeaderMap, StatusCode },
    middleware::Next,
    response::{ IntoResponse, Response },
    Json,
};
use redis::AsyncCommands;
use serde_json::json;

use crate::{ config::RateLimitConfig, db::AppState };

struct Scope {
    name: &'static str,
    limit: i64,
    window_secs: u64,
    message: &'static str,
}

fn scope_for(limits: &RateLimitConfig, path: &str) -> Option<Scope> {
    if path.starts_with("/api/auth/") {
        Some(Scope {
            name: "auth",
            limit: limits.auth_max_requests,
            window_secs: limits.window_secs,
            message: "Too many authentication attempts, please try again later.",
        })
    } else if path.starts_with("/api/search") {
        Some(Scope {
            name: "search",
            limit: limits.search_max_requests,
            window_secs: limits.search_window_secs,
            message: "Too many search requests, please try again later.",
        })
    } else if path.starts_with("/api/") {
        Some(Scope {
            name: "api",
            limit: limits.max_requests,
            window_secs: limits.window_secs,
            message: "Too many requests from this IP, please try again later.",
        })
    } else {
        None
    }
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|ip| ip.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Fixed-window counter per client IP and route scope, backed by Redis.
/// Fails open when Redis is unreachable.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next
) -> Result<Response, Response> {
    let Some(scope) = scope_for(&state.config.rate_limit, request.uri().path()) else {
        return Ok(next.run(request).await);
    };

    let ip = client_ip(request.headers());
    let key = format!("rate:{}:{}", scope.name, ip);

    let mut conn = state.redis.clone();

    let count: i64 = match conn.incr(&key, 1).await {
        Ok(count) => count,
        Err(error) => {
            tracing::warn!(%error, "Rate limiter unavailable, allowing request");
            return Ok(next.run(request).await);
        }
    };

    if count == 1 {
        if let Err(error) = conn.expire::<_, ()>(&key, scope.window_secs as i64).await {
            tracing::warn!(%error, key, "Failed to set rate limit window expiry");
        }
    }

    if count > scope.limit {
        tracing::debug!(key, count, limit = scope.limit, "Rate limit exceeded");
        return Err(
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "success": false,
                    "message": scope.message,
                })),
            ).into_response()
        );
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn limits() -> RateLimitConfig {
        RateLimitConfig {
            window_secs: 900,
            max_requests: 100,
            auth_max_requests: 10,
            search_window_secs: 60,
            search_max_requests: 10,
        }
    }

    #[test]
    fn paths_map_to_their_rate_limit_scope() {
        let limits = limits();

        let auth = scope_for(&limits, "/api/auth/login").unwrap();
        assert_eq!(auth.name, "auth");
        assert_eq!(auth.limit, 10);
        assert_eq!(auth.window_secs, 900);

        let search = scope_for(&limits, "/api/search/history").unwrap();
        assert_eq!(search.name, "search");
        assert_eq!(search.limit, 10);
        assert_eq!(search.window_secs, 60);

        let api = scope_for(&limits, "/api/health-profile").unwrap();
        assert_eq!(api.name, "api");
        assert_eq!(api.limit, 100);

        assert!(scope_for(&limits, "/health").is_none());
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers), "203.0.113.9");
    }

    #[test]
    fn client_ip_falls_back_to_real_ip_then_unknown() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers), "10.0.0.2");

        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
