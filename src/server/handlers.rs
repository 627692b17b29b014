//! Route handlers.
//!
//! Protected handlers run behind the authentication middleware and receive
//! the verified body bytes.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Response;
use axum::{Extension, Json};
use serde_json::{json, Value};
use tracing::info;

use crate::auth::Credential;
use crate::error::GateResult;
use crate::protocol::{
    parse_body, CreateInboundData, CreateInboundRequest, OrderStatusData, OrderStatusRequest,
};

use super::reply;
use super::state::AppState;

/// Liveness check.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST {prefix}/inbound/create`
pub async fn create_inbound(
    State(state): State<AppState>,
    Extension(credential): Extension<Credential>,
    body: Bytes,
) -> Response {
    reply::from_result(
        "Inbound created successfully",
        create(&state, &credential, &body).await,
    )
}

async fn create(state: &AppState, credential: &Credential, body: &[u8]) -> GateResult<Value> {
    let request: CreateInboundRequest = parse_body(body)?;
    let inbound = state.provisioner.create_inbound(&request).await?;

    info!(
        key = %credential.key,
        order_id = %request.order_id,
        inbound_id = inbound.id,
        port = inbound.port,
        protocol = %inbound.protocol,
        "Inbound provisioned"
    );

    Ok(serde_json::to_value(CreateInboundData { inbound })?)
}

/// `POST {prefix}/order/status`
pub async fn order_status(State(state): State<AppState>, body: Bytes) -> Response {
    reply::from_result("ok", status(&state, &body).await)
}

async fn status(state: &AppState, body: &[u8]) -> GateResult<Value> {
    let request: OrderStatusRequest = parse_body(body)?;
    let order = state.ledger.status(&request.order_id).await?;
    Ok(serde_json::to_value(OrderStatusData::from(&order))?)
}
