//! Error types for the inbound gate.

use thiserror::Error;

/// Main error type for the gate.
#[derive(Error, Debug)]
pub enum GateError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// HTTP listener errors.
    #[error("Server error: {message}")]
    Server { message: String },

    /// Request authentication errors.
    #[error("Authentication error: {kind}")]
    Auth { kind: AuthErrorKind },

    /// Order ledger errors.
    #[error("Order error: {kind}")]
    Order { kind: OrderErrorKind },

    /// Inbound provisioning errors.
    #[error("Provision error: {kind}")]
    Provision { kind: ProvisionErrorKind },

    /// Malformed requests.
    #[error("Protocol error: {kind}")]
    Protocol { kind: ProtocolErrorKind },

    /// Outbound signing client errors.
    #[error("Client error: {message}")]
    Client { message: String },

    /// Database errors.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Authentication error kinds, in the order the gate checks them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthErrorKind {
    #[error("Missing API key")]
    MissingKey,

    #[error("Invalid API key")]
    InvalidKey,

    #[error("API key is disabled")]
    KeyDisabled,

    #[error("Source IP {ip} is not in the allow-list")]
    IpNotAllowed { ip: String },

    #[error("Too many requests, retry later")]
    RateLimited,

    #[error("Missing nonce or signature header")]
    MissingSignatureHeaders,

    #[error("Invalid timestamp format")]
    BadTimestamp,

    #[error("Request expired or timestamp out of range (skew {skew_seconds}s)")]
    Expired { skew_seconds: i64 },

    #[error("Nonce already used (replay detected)")]
    Replayed,

    #[error("Invalid signature")]
    BadSignature,
}

/// Order ledger error kinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderErrorKind {
    #[error("Order {order_id} not found")]
    NotFound { order_id: String },

    #[error("Order has not been paid (status: {status})")]
    NotPaid { status: String },

    #[error("Order has already been used")]
    AlreadyUsed,

    #[error("Order has expired")]
    Expired,

    #[error("Order does not belong to this user")]
    UserMismatch,

    #[error("Order {order_id} already exists")]
    AlreadyExists { order_id: String },
}

/// Provisioning error kinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionErrorKind {
    #[error("Unsupported protocol: {protocol}")]
    UnsupportedProtocol { protocol: String },

    #[error("No free port in range {low}-{high}")]
    PortExhausted { low: u16, high: u16 },

    #[error("Port {port} is already in use")]
    PortConflict { port: u16 },

    #[error("Invalid port: {port}")]
    InvalidPort { port: i64 },

    #[error("Failed to persist inbound: {message}")]
    PersistFailure { message: String },
}

/// Request-shape error kinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    #[error("Malformed request body: {message}")]
    MalformedBody { message: String },

    #[error("Request body exceeds {max} bytes")]
    BodyTooLarge { max: usize },

    #[error("Missing required field: {field}")]
    MissingField { field: String },
}

impl GateError {
    /// Stable error code reported alongside failures.
    pub fn code(&self) -> &'static str {
        match self {
            GateError::Auth { kind } => match kind {
                AuthErrorKind::RateLimited => "RATE_LIMITED",
                _ => "AUTH_ERROR",
            },
            GateError::Order { .. } => "ORDER_ERROR",
            GateError::Provision { .. } => "PROVISION_ERROR",
            GateError::Protocol { .. } => "BAD_REQUEST",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure is caused by the request shape rather than its content.
    ///
    /// Only these map to a non-200 HTTP status.
    pub fn is_malformed_request(&self) -> bool {
        matches!(self, GateError::Protocol { .. })
    }

    /// Message safe to return to a client.
    ///
    /// Auth, order and provision failures are descriptive; internal failures
    /// are replaced with a generic message and must be logged by the caller.
    pub fn client_message(&self) -> String {
        match self {
            GateError::Auth { kind } => format!("API authentication failed: {}", kind),
            GateError::Order { kind } => format!("Order verification failed: {}", kind),
            GateError::Provision { kind } => match kind {
                ProvisionErrorKind::PersistFailure { .. } => {
                    "Failed to create inbound, order left unused".to_string()
                }
                other => other.to_string(),
            },
            GateError::Protocol { kind } => format!("Invalid request: {}", kind),
            _ => "Internal server error".to_string(),
        }
    }
}

impl From<AuthErrorKind> for GateError {
    fn from(kind: AuthErrorKind) -> Self {
        GateError::Auth { kind }
    }
}

impl From<OrderErrorKind> for GateError {
    fn from(kind: OrderErrorKind) -> Self {
        GateError::Order { kind }
    }
}

impl From<ProvisionErrorKind> for GateError {
    fn from(kind: ProvisionErrorKind) -> Self {
        GateError::Provision { kind }
    }
}

impl From<ProtocolErrorKind> for GateError {
    fn from(kind: ProtocolErrorKind) -> Self {
        GateError::Protocol { kind }
    }
}

/// Result type alias for gate operations.
pub type GateResult<T> = Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err: GateError = AuthErrorKind::BadSignature.into();
        assert_eq!(err.code(), "AUTH_ERROR");

        let err: GateError = AuthErrorKind::RateLimited.into();
        assert_eq!(err.code(), "RATE_LIMITED");

        let err: GateError = OrderErrorKind::AlreadyUsed.into();
        assert_eq!(err.code(), "ORDER_ERROR");

        let err = GateError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_internal_errors_are_sanitized() {
        let err = GateError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.client_message(), "Internal server error");

        let err: GateError = ProvisionErrorKind::PersistFailure {
            message: "disk I/O error at /var/lib/gate.db".to_string(),
        }
        .into();
        assert!(!err.client_message().contains("/var/lib"));
    }

    #[test]
    fn test_only_protocol_errors_are_malformed() {
        let err: GateError = ProtocolErrorKind::MissingField {
            field: "orderId".to_string(),
        }
        .into();
        assert!(err.is_malformed_request());

        let err: GateError = AuthErrorKind::MissingKey.into();
        assert!(!err.is_malformed_request());
    }
}
