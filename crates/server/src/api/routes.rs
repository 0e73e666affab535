use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{
    access, handlers,
    middleware::{admin_key_middleware, metrics_middleware},
    submissions,
};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Submissions
        .route("/submissions", post(submissions::submit))
        .route("/submitters/{id}/jobs", delete(submissions::cancel_jobs))
        .route("/submitters/{id}/position", get(submissions::get_position))
        // Queue
        .route("/queue", get(submissions::get_queue));

    // Allow list management, guarded by the admin key
    let admin_routes = Router::new()
        .route("/access/submitters", get(access::list_submitters))
        .route(
            "/access/submitters/{id}",
            put(access::allow_submitter).delete(access::remove_submitter),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_key_middleware,
        ));

    Router::new()
        .nest("/api/v1", api_routes.merge(admin_routes))
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
