//! Route table.

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use super::middleware;
use super::state::AppState;

/// Build the application router.
///
/// `/health` is open; everything under the configured prefix requires a
/// signed request.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/inbound/create", post(handlers::create_inbound))
        .route("/order/status", post(handlers::order_status))
        .route_layer(from_fn_with_state(state.clone(), middleware::authenticate));

    Router::new()
        .route("/health", get(handlers::health))
        .nest(&state.api_prefix, protected)
        .layer(from_fn(middleware::assign_request_id))
        .with_state(state)
}
