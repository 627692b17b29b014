//! Request id and authentication middleware.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{sanitize_params, AuditEntry};
use crate::auth::Authenticated;
use crate::error::{GateResult, ProtocolErrorKind};
use crate::protocol::{HEADER_API_KEY, HEADER_REQUEST_ID};

use super::reply::{self, FailureNote};
use super::state::AppState;

const HEADER_REAL_IP: &str = "x-real-ip";
const HEADER_FORWARDED_FOR: &str = "x-forwarded-for";

/// Identifier assigned to each request and echoed in `X-Request-Id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(pub Uuid);

/// Assign a request id and echo it on the response.
pub async fn assign_request_id(mut req: Request, next: Next) -> Response {
    let id = Uuid::new_v4();
    req.extensions_mut().insert(RequestId(id));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(HEADER_REQUEST_ID, value);
    }
    response
}

/// Authenticate a protected call, forward it, and audit the outcome.
///
/// The handler receives the verified body bytes and the [`Credential`]
/// as an extension.
///
/// [`Credential`]: crate::auth::Credential
pub async fn authenticate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let _permit = state.permits.clone().acquire_owned().await.ok();
    let started = Instant::now();

    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0)
        .unwrap_or_else(Uuid::new_v4);
    let source_ip = source_ip(&req, state.trust_proxy_headers);
    let api_key = req
        .headers()
        .get(HEADER_API_KEY)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let entry = AuditEntry::new(request_id, req.uri().path(), source_ip.to_string()).with_api_key(api_key);

    let (mut parts, body) = req.into_parts();
    let limit = state.max_body_size;
    let outcome = state
        .gate
        .authenticate(&parts.headers, source_ip, || read_body(body, limit))
        .await;

    let (response, entry) = match outcome {
        Ok(Authenticated { credential, body }) => {
            let entry = entry.with_params(audit_params(&body));
            parts.extensions.insert(credential);

            let response = next.run(Request::from_parts(parts, Body::from(body))).await;
            let entry = match response.extensions().get::<FailureNote>() {
                Some(note) => entry.failed(note.code, note.message.clone()),
                None => entry,
            };
            (response, entry)
        }
        Err(err) => {
            info!(
                request_id = %request_id,
                ip = %source_ip,
                error = %err,
                "Request rejected"
            );
            let entry = entry.failed(err.code(), err.to_string());
            (reply::failure(&err), entry)
        }
    };

    state.record(&entry.with_duration_ms(started.elapsed().as_millis() as u64));
    response
}

async fn read_body(body: Body, limit: usize) -> GateResult<Bytes> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        debug!(error = %e, limit, "Failed to read request body");
        ProtocolErrorKind::BodyTooLarge { max: limit }.into()
    })
}

fn audit_params(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body)
        .map(|params| sanitize_params(&params))
        .unwrap_or(serde_json::Value::Null)
}

/// Address a request is attributed to.
///
/// IPv4-mapped IPv6 addresses (a dual-stack listener on `[::]`) are reported
/// as plain IPv4 so they match allow-list entries.
fn source_ip(req: &Request, trust_proxy_headers: bool) -> IpAddr {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(req.headers()) {
            return ip;
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_canonical())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// `X-Real-IP`, else the first `X-Forwarded-For` hop.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    header(HEADER_REAL_IP)
        .and_then(|raw| raw.trim().parse::<IpAddr>().ok())
        .or_else(|| {
            header(HEADER_FORWARDED_FOR)
                .and_then(|raw| raw.split(',').next())
                .and_then(|first| first.trim().parse::<IpAddr>().ok())
        })
        .map(|ip| ip.to_canonical())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(headers: &[(&'static str, &'static str)], peer: Option<SocketAddr>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/api/v1/order/status");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        if let Some(addr) = peer {
            req.extensions_mut().insert(ConnectInfo(addr));
        }
        req
    }

    #[test]
    fn test_source_ip_from_peer() {
        let peer: SocketAddr = "192.0.2.10:40000".parse().unwrap();
        let req = request_with(&[(HEADER_REAL_IP, "198.51.100.1")], Some(peer));

        assert_eq!(source_ip(&req, false), peer.ip());
    }

    #[test]
    fn test_source_ip_from_proxy_headers() {
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();

        let req = request_with(&[(HEADER_REAL_IP, "198.51.100.1")], Some(peer));
        assert_eq!(source_ip(&req, true).to_string(), "198.51.100.1");

        let req = request_with(
            &[(HEADER_FORWARDED_FOR, "203.0.113.5, 10.0.0.1")],
            Some(peer),
        );
        assert_eq!(source_ip(&req, true).to_string(), "203.0.113.5");

        let req = request_with(&[(HEADER_REAL_IP, "not-an-ip")], Some(peer));
        assert_eq!(source_ip(&req, true), peer.ip());
    }

    #[test]
    fn test_mapped_ipv4_peer_is_canonical() {
        let peer: SocketAddr = "[::ffff:10.0.0.1]:40000".parse().unwrap();
        let req = request_with(&[], Some(peer));
        assert_eq!(source_ip(&req, false).to_string(), "10.0.0.1");

        let req = request_with(&[(HEADER_REAL_IP, "::ffff:198.51.100.1")], Some(peer));
        assert_eq!(source_ip(&req, true).to_string(), "198.51.100.1");

        let peer: SocketAddr = "[2001:db8::1]:40000".parse().unwrap();
        let req = request_with(&[], Some(peer));
        assert_eq!(source_ip(&req, false).to_string(), "2001:db8::1");
    }

    #[test]
    fn test_source_ip_without_peer() {
        let req = request_with(&[], None);
        assert_eq!(source_ip(&req, false), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn test_audit_params_are_sanitized() {
        let params = audit_params(br#"{"orderId":"O1","settings":"{\"clients\":[]}"}"#);
        assert_eq!(params["orderId"], "O1");
        assert_eq!(params["settings"], "[REDACTED]");

        assert!(audit_params(b"not json").is_null());
    }
}
