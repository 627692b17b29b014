//! Request authentication entry point.
//!
//! Every protected call passes through [`AuthGate::authenticate`]. Checks run
//! cheapest first and stop at the first failure; the body is only read once
//! the headers have passed.

use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::HeaderMap;
use tracing::{debug, warn};

use crate::auth::credentials::{Credential, CredentialStore};
use crate::auth::hmac;
use crate::auth::nonce::ReplayGuard;
use crate::auth::rate_limit::RateLimiter;
use crate::clock;
use crate::config::SecurityConfig;
use crate::error::{AuthErrorKind, GateResult};
use crate::protocol::{HEADER_API_KEY, HEADER_NONCE, HEADER_SIGNATURE, HEADER_TIMESTAMP};

/// A request that passed every check.
#[derive(Debug)]
pub struct Authenticated {
    pub credential: Credential,
    /// The exact bytes the signature was verified over.
    pub body: Bytes,
}

/// Accepts or rejects signed API requests.
pub struct AuthGate {
    credentials: CredentialStore,
    replay: Arc<ReplayGuard>,
    limiter: Arc<RateLimiter>,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl AuthGate {
    pub fn new(credentials: CredentialStore, replay: Arc<ReplayGuard>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            credentials,
            replay,
            limiter,
        }
    }

    /// Build a gate with replay and rate windows taken from configuration.
    pub fn from_config(credentials: CredentialStore, config: &SecurityConfig) -> Self {
        let replay = ReplayGuard::new(
            Duration::from_secs(config.max_request_age_seconds),
            Duration::from_secs(config.max_clock_skew_seconds),
        );
        let limiter = RateLimiter::new(
            config.default_rate_limit,
            Duration::from_secs(config.rate_limit_window_seconds),
        );
        Self::new(credentials, Arc::new(replay), Arc::new(limiter))
    }

    /// Spawn the nonce and rate-window cleanup tasks.
    pub fn start_cleanup_tasks(&self, interval: Duration) {
        self.replay.start_cleanup_task(interval);
        self.limiter.start_cleanup_task(interval);
    }

    /// Authenticate a request.
    ///
    /// `read_body` is only invoked after every header check has passed.
    pub async fn authenticate<F, Fut>(
        &self,
        headers: &HeaderMap,
        source_ip: IpAddr,
        read_body: F,
    ) -> GateResult<Authenticated>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GateResult<Bytes>>,
    {
        self.authenticate_at(headers, source_ip, read_body, clock::now_secs())
            .await
    }

    pub(crate) async fn authenticate_at<F, Fut>(
        &self,
        headers: &HeaderMap,
        source_ip: IpAddr,
        read_body: F,
        now: i64,
    ) -> GateResult<Authenticated>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GateResult<Bytes>>,
    {
        let key = header(headers, HEADER_API_KEY).ok_or(AuthErrorKind::MissingKey)?;

        let credential = self
            .credentials
            .find(key)
            .await?
            .ok_or(AuthErrorKind::InvalidKey)?;
        if !credential.is_active() {
            return Err(AuthErrorKind::KeyDisabled.into());
        }

        let ip = source_ip.to_canonical().to_string();
        if !credential.allows_ip(&ip) {
            warn!(key = %credential.key, ip = %ip, "Request from IP outside allow-list");
            return Err(AuthErrorKind::IpNotAllowed { ip }.into());
        }

        if !self.limiter.allow(&credential.key, credential.rate_limit) {
            warn!(key = %credential.key, "Rate limit exceeded");
            return Err(AuthErrorKind::RateLimited.into());
        }

        let (nonce, signature) = match (header(headers, HEADER_NONCE), header(headers, HEADER_SIGNATURE)) {
            (Some(nonce), Some(signature)) => (nonce, signature),
            _ => return Err(AuthErrorKind::MissingSignatureHeaders.into()),
        };

        let timestamp = header(headers, HEADER_TIMESTAMP)
            .filter(|raw| raw.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|raw| raw.parse::<i64>().ok())
            .ok_or(AuthErrorKind::BadTimestamp)?;

        if let Err(kind) = self.replay.accept_at(&credential.key, timestamp, nonce, now) {
            warn!(key = %credential.key, error = %kind, "Replay check failed");
            return Err(kind.into());
        }

        let body = read_body().await?;

        if !hmac::verify(signature, timestamp, nonce, &body, credential.secret()) {
            warn!(key = %credential.key, "Signature mismatch");
            return Err(AuthErrorKind::BadSignature.into());
        }

        let store = self.credentials.clone();
        let id = credential.id;
        tokio::spawn(async move {
            if let Err(e) = store.touch_last_used(id, clock::now_millis()).await {
                warn!(error = %e, credential_id = id, "Failed to update last_used_at");
            }
        });

        debug!(key = %credential.key, "Request authenticated");
        Ok(Authenticated { credential, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::{CredentialStatus, IssuedKey};
    use crate::error::{GateError, ProtocolErrorKind};
    use crate::store::Database;
    use axum::http::HeaderValue;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicBool, Ordering};

    const NOW: i64 = 1_700_000_000;
    const BODY: &[u8] = br#"{"orderId":"O1"}"#;
    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    async fn setup(rate_limit: u32, allowed_ips: &[String]) -> (AuthGate, CredentialStore, IssuedKey) {
        let db = Database::open_in_memory().await.unwrap();
        let store = CredentialStore::new(db);
        let issued = store.create("test", rate_limit, allowed_ips).await.unwrap();
        let gate = AuthGate::from_config(store.clone(), &SecurityConfig::default());
        (gate, store, issued)
    }

    fn signed_headers(issued: &IssuedKey, timestamp: i64, nonce: &str, body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let signature = hmac::sign(timestamp, nonce, body, issued.secret.as_bytes());
        headers.insert(HEADER_API_KEY, HeaderValue::from_str(&issued.key).unwrap());
        headers.insert(HEADER_TIMESTAMP, HeaderValue::from_str(&timestamp.to_string()).unwrap());
        headers.insert(HEADER_NONCE, HeaderValue::from_str(nonce).unwrap());
        headers.insert(HEADER_SIGNATURE, HeaderValue::from_str(&signature).unwrap());
        headers
    }

    async fn body() -> GateResult<Bytes> {
        Ok(Bytes::from_static(BODY))
    }

    fn auth_kind(result: GateResult<Authenticated>) -> AuthErrorKind {
        match result {
            Err(GateError::Auth { kind }) => kind,
            other => panic!("expected auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_valid_request_accepted() {
        let (gate, _, issued) = setup(10, &[]).await;
        let headers = signed_headers(&issued, NOW, "n1", BODY);

        let authenticated = gate.authenticate_at(&headers, LOCALHOST, body, NOW).await.unwrap();
        assert_eq!(authenticated.credential.key, issued.key);
        assert_eq!(&authenticated.body[..], BODY);
    }

    #[tokio::test]
    async fn test_missing_and_unknown_key() {
        let (gate, _, issued) = setup(10, &[]).await;

        let mut headers = signed_headers(&issued, NOW, "n1", BODY);
        headers.remove(HEADER_API_KEY);
        assert_eq!(
            auth_kind(gate.authenticate_at(&headers, LOCALHOST, body, NOW).await),
            AuthErrorKind::MissingKey
        );

        headers.insert(HEADER_API_KEY, HeaderValue::from_static("xui_unknown"));
        assert_eq!(
            auth_kind(gate.authenticate_at(&headers, LOCALHOST, body, NOW).await),
            AuthErrorKind::InvalidKey
        );
    }

    #[tokio::test]
    async fn test_disabled_key_rejected() {
        let (gate, store, issued) = setup(10, &[]).await;
        store.set_status(&issued.key, CredentialStatus::Inactive).await.unwrap();

        let headers = signed_headers(&issued, NOW, "n1", BODY);
        assert_eq!(
            auth_kind(gate.authenticate_at(&headers, LOCALHOST, body, NOW).await),
            AuthErrorKind::KeyDisabled
        );
    }

    #[tokio::test]
    async fn test_ip_allow_list() {
        let (gate, _, issued) = setup(10, &["10.0.0.1".to_string()]).await;
        let headers = signed_headers(&issued, NOW, "n1", BODY);

        assert!(matches!(
            auth_kind(gate.authenticate_at(&headers, LOCALHOST, body, NOW).await),
            AuthErrorKind::IpNotAllowed { .. }
        ));

        let allowed: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(gate.authenticate_at(&headers, allowed, body, NOW).await.is_ok());

        // Same client seen through a dual-stack listener.
        let mapped: IpAddr = "::ffff:10.0.0.1".parse().unwrap();
        let headers = signed_headers(&issued, NOW, "n2", BODY);
        assert!(gate.authenticate_at(&headers, mapped, body, NOW).await.is_ok());
    }

    #[tokio::test]
    async fn test_rate_limit_counts_rejected_requests() {
        let (gate, _, issued) = setup(2, &[]).await;

        // Bad signatures still consume budget.
        let mut headers = signed_headers(&issued, NOW, "n1", BODY);
        headers.insert(HEADER_SIGNATURE, HeaderValue::from_static("00"));
        assert_eq!(
            auth_kind(gate.authenticate_at(&headers, LOCALHOST, body, NOW).await),
            AuthErrorKind::BadSignature
        );

        let headers = signed_headers(&issued, NOW, "n2", BODY);
        assert!(gate.authenticate_at(&headers, LOCALHOST, body, NOW).await.is_ok());

        let headers = signed_headers(&issued, NOW, "n3", BODY);
        assert_eq!(
            auth_kind(gate.authenticate_at(&headers, LOCALHOST, body, NOW).await),
            AuthErrorKind::RateLimited
        );
    }

    #[tokio::test]
    async fn test_missing_signature_headers_and_bad_timestamp() {
        let (gate, _, issued) = setup(10, &[]).await;

        let mut headers = signed_headers(&issued, NOW, "n1", BODY);
        headers.remove(HEADER_NONCE);
        assert_eq!(
            auth_kind(gate.authenticate_at(&headers, LOCALHOST, body, NOW).await),
            AuthErrorKind::MissingSignatureHeaders
        );

        let mut headers = signed_headers(&issued, NOW, "n2", BODY);
        headers.insert(HEADER_TIMESTAMP, HeaderValue::from_static("yesterday"));
        assert_eq!(
            auth_kind(gate.authenticate_at(&headers, LOCALHOST, body, NOW).await),
            AuthErrorKind::BadTimestamp
        );
    }

    #[tokio::test]
    async fn test_stale_and_replayed_requests() {
        let (gate, _, issued) = setup(10, &[]).await;

        let headers = signed_headers(&issued, NOW - 310, "n1", BODY);
        assert!(matches!(
            auth_kind(gate.authenticate_at(&headers, LOCALHOST, body, NOW).await),
            AuthErrorKind::Expired { .. }
        ));

        let headers = signed_headers(&issued, NOW, "n2", BODY);
        assert!(gate.authenticate_at(&headers, LOCALHOST, body, NOW).await.is_ok());
        assert_eq!(
            auth_kind(gate.authenticate_at(&headers, LOCALHOST, body, NOW + 5).await),
            AuthErrorKind::Replayed
        );
    }

    #[tokio::test]
    async fn test_tampered_body_rejected() {
        let (gate, _, issued) = setup(10, &[]).await;
        let headers = signed_headers(&issued, NOW, "n1", BODY);

        let tampered = || async { Ok::<_, GateError>(Bytes::from_static(br#"{"orderId":"O2"}"#)) };
        assert_eq!(
            auth_kind(gate.authenticate_at(&headers, LOCALHOST, tampered, NOW).await),
            AuthErrorKind::BadSignature
        );
    }

    #[tokio::test]
    async fn test_body_not_read_when_headers_fail() {
        let (gate, _, issued) = setup(10, &[]).await;
        let mut headers = signed_headers(&issued, NOW, "n1", BODY);
        headers.remove(HEADER_SIGNATURE);

        let read = AtomicBool::new(false);
        let flag = &read;
        let reader = move || async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<_, GateError>(Bytes::from_static(BODY))
        };
        assert!(gate.authenticate_at(&headers, LOCALHOST, reader, NOW).await.is_err());
        assert!(!read.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_body_read_error_propagates() {
        let (gate, _, issued) = setup(10, &[]).await;
        let headers = signed_headers(&issued, NOW, "n1", BODY);

        let too_large =
            || async { Err::<Bytes, GateError>(ProtocolErrorKind::BodyTooLarge { max: 16 }.into()) };
        assert!(matches!(
            gate.authenticate_at(&headers, LOCALHOST, too_large, NOW).await,
            Err(GateError::Protocol { .. })
        ));
    }
}
