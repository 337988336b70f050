use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{downloads, handlers, middleware::metrics_middleware, rows, update};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Result window
        .route("/rows", get(rows::list_rows))
        .route("/rows/fetch-more", post(rows::fetch_more))
        .route("/rows/{row}", get(rows::get_row))
        .route("/rows/{row}/url", get(rows::get_row_url))
        .route("/query", get(rows::get_query).put(rows::set_query))
        .route("/sort/{column}", post(rows::sort_by_column))
        .route("/channels", get(rows::list_channels))
        .route("/topics", get(rows::list_topics))
        // Settings
        .route(
            "/settings/preferred-url",
            get(handlers::get_preferred_url).put(handlers::set_preferred_url),
        )
        // Catalog updates
        .route("/update", post(update::trigger_update))
        .route("/update/status", get(update::get_status))
        // Downloads
        .route(
            "/downloads",
            get(downloads::list_downloads).post(downloads::start_download),
        )
        .route(
            "/downloads/{id}",
            get(downloads::get_download).delete(downloads::cancel_download),
        )
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
