//! HTTP API protocol module.
//!
//! Defines the authentication headers, request bodies and the response
//! envelope shared by the server and the signing client.
//!
//! ## Envelope
//!
//! Every response body has the same shape:
//! ```text
//! {"success": bool, "msg": string, "data": object?}
//! ```

mod request;
mod response;

pub use request::{
    parse_body, CreateInboundRequest, OrderStatusRequest, RequestBody, HEADER_API_KEY, HEADER_NONCE,
    HEADER_REQUEST_ID, HEADER_SIGNATURE, HEADER_TIMESTAMP,
};
pub use response::{CreateInboundData, Envelope, OrderStatusData};
