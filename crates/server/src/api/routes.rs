use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::{handlers, middleware::metrics_middleware, tickets};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/sessions", get(handlers::list_sessions))
        // Queues
        .route("/pending-tickets", get(tickets::list_pending))
        .route("/active-sessions", get(tickets::list_active))
        .route("/completed-tickets", get(tickets::list_completed))
        // Lifecycle operations
        .route("/tickets", post(tickets::add_pending))
        .route("/tickets/{id}", delete(tickets::delete_ticket))
        .route("/tickets/{id}/complete", post(tickets::mark_completed))
        .route("/tickets/{id}/completion", get(tickets::check_completion))
        .route("/approve/{id}", post(tickets::approve))
        .route("/update-tracker/{id}", post(tickets::publish))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
