use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    deliver_broadcast, deliver_exchange, get_status, verify_ban, verify_commit, AppState,
};

/// Create the HTTP router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/status", get(get_status))
        .route("/consensus/broadcast/{seq}", post(deliver_broadcast))
        .route("/consensus/exchange/{seq}", post(deliver_exchange))
        .route("/certificate/commit", post(verify_commit))
        .route("/certificate/ban", post(verify_ban))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
