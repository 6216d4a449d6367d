use crate::handlers;
use crate::middleware::auth_middleware;
use crate::state::AppState;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{any, get},
};
use shared::config::Config;
use tower_http::trace::TraceLayer;

/// Build and configure the application router.
///
/// The whole path after `/` is the object key, slashes included, so no path
/// normalization is applied.
pub fn build_router(state: AppState, config: &Config) -> Router {
    let auth = middleware::from_fn_with_state(state.auth_service.clone(), auth_middleware);

    Router::new()
        .route("/", any(handlers::missing_key))
        .route(
            "/{*key}",
            get(handlers::get_object)
                .put(handlers::put_object)
                .fallback(handlers::method_not_allowed),
        )
        // Middleware
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(auth)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
