pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    services::ServeDir,
    trace::TraceLayer,
};

use state::AppState;

/// The whole application: JSON API, HTML pages, static and media files,
/// plus the host and CSRF checks every request passes through.
pub fn create_app(app_state: AppState) -> Router {
    let static_dir = app_state.settings.server.static_dir.clone();
    let media_dir = app_state.settings.server.media_dir.clone();

    Router::new()
        // Health and API info
        .route("/health", get(handlers::root::health_check))
        .route("/api", get(handlers::root::api_info))

        // Staff-only JSON views over the member store
        .nest("/api/members", member_routes(app_state.clone()))

        // HTML pages
        .merge(crate::web::create_web_routes(app_state.clone()))

        // Files
        .nest_service("/static", ServeDir::new(static_dir))
        .nest_service("/media", ServeDir::new(media_dir))

        .fallback(crate::web::not_found)

        // Runs after the host check
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            middleware::csrf::csrf_protect,
        ))
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            middleware::hosts::require_allowed_host,
        ))

        .with_state(app_state)

        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

fn member_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::members::list))
        .route("/:id", get(handlers::members::get))
        .route("/:id/activate", post(handlers::members::activate))
        .route("/:id/deactivate", post(handlers::members::deactivate))
        .route_layer(axum::middleware::from_fn(middleware::auth::require_staff))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}
