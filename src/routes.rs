use axum::{ middleware, routing::{ get, post }, Router };

use crate::{ db::AppState, handlers, middleware as mw };

pub fn create_routes(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route(
            "/api/health-profile",
            post(handlers::health_profile::upsert_profile)
                .get(handlers::health_profile::get_profile)
                .put(handlers::health_profile::update_profile)
                .delete(handlers::health_profile::delete_profile)
        )
        .route("/api/health-profile/summary", get(handlers::health_profile::get_summary))
        .route("/api/search", post(handlers::search::search))
        .route("/api/search/history", get(handlers::search::get_history))
        .route("/api/search/analytics", get(handlers::search::get_analytics))
        .route_layer(middleware::from_fn_with_state(state.clone(), mw::auth::auth_middleware));

    let public_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/search/trending", get(handlers::search::get_trending));

    Router::new()
        .route("/health", get(handlers::status::health_check))
        .merge(protected_routes)
        .merge(public_routes)
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, mw::rate_limit::rate_limit_middleware))
}
