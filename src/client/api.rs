//! HTTP client for the gate API.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tracing::debug;

use crate::error::{GateError, GateResult};
use crate::protocol::{CreateInboundRequest, Envelope, OrderStatusRequest};

use super::signer::SignedHeaders;

/// Timeout applied to every outbound call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_API_PREFIX: &str = "/api/v1";

fn client_error(context: &str, err: impl std::fmt::Display) -> GateError {
    GateError::Client {
        message: format!("{}: {}", context, err),
    }
}

/// Sends signed requests to a gate.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_prefix: String,
    api_key: String,
    secret: String,
}

impl ApiClient {
    /// Create a client for the gate at `base_url` (e.g. `http://127.0.0.1:8080`).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        secret: impl Into<String>,
    ) -> GateResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| client_error("Failed to build HTTP client", e))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            api_key: api_key.into(),
            secret: secret.into(),
        })
    }

    /// Use a non-default API prefix (builder pattern).
    pub fn with_api_prefix(mut self, api_prefix: impl Into<String>) -> Self {
        self.api_prefix = api_prefix.into();
        self
    }

    /// Authentication headers for a body this caller will send itself.
    pub fn signed_headers(&self, body: &[u8]) -> SignedHeaders {
        SignedHeaders::new(&self.api_key, self.secret.as_bytes(), body)
    }

    pub async fn create_inbound(&self, request: &CreateInboundRequest) -> GateResult<Envelope> {
        self.post("/inbound/create", request).await
    }

    pub async fn order_status(&self, order_id: &str) -> GateResult<Envelope> {
        self.post("/order/status", &OrderStatusRequest::new(order_id))
            .await
    }

    /// Sign and POST a payload under the API prefix.
    ///
    /// Failures reported by the gate come back as an envelope with
    /// `success: false`; only transport and decoding problems are errors.
    pub async fn post<T: Serialize>(&self, path: &str, payload: &T) -> GateResult<Envelope> {
        let body = serde_json::to_vec(payload)?;
        let headers = self.signed_headers(&body).to_header_map()?;
        self.send(path, headers, body).await
    }

    /// POST pre-serialized bytes with caller-provided headers.
    pub async fn send(
        &self,
        path: &str,
        headers: reqwest::header::HeaderMap,
        body: Vec<u8>,
    ) -> GateResult<Envelope> {
        let url = format!("{}{}{}", self.base_url, self.api_prefix, path);
        debug!(url = %url, "Sending signed request");

        let response = self
            .http
            .post(&url)
            .headers(headers)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| client_error("Request failed", e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| client_error("Failed to read response", e))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| client_error(&format!("Unexpected response (HTTP {})", status), e))
    }
}
