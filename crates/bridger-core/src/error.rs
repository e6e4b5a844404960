//! Error taxonomy for the bridge (see spec §7).
//!
//! Transport and authorization failures are handled by callers via retry/log
//! policy; these types only carry what a handler needs to decide that policy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeIdError {
    #[error("node id must be exactly 8 hex characters, got {0}")]
    WrongLength(usize),
    #[error("node id is not valid hex: {0}")]
    NotHex(String),
}

/// Strict protobuf envelope decode failed.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to decode ServiceEnvelope: {0}")]
    Envelope(#[from] prost::DecodeError),
}

/// Surfaced by the codec when a packet cannot be turned into a point: unknown
/// port, PKI channel, or a decryption/parse failure. Carries the port number
/// when one was available, matching `PacketProcessorError` in the source.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProcessingError {
    pub message: String,
    pub portnum: Option<i32>,
}

impl ProcessingError {
    pub fn new(message: impl Into<String>, portnum: Option<i32>) -> Self {
        Self {
            message: message.into(),
            portnum,
        }
    }
}

/// Raised by the gateway manager on a broker-side conflict (HTTP 400 family
/// from user creation); carries the record so the caller can report "already
/// exists" without a second lookup.
#[derive(Debug, Error)]
#[error("gateway error: {message}")]
pub struct GatewayError {
    pub message: String,
    pub record: crate::gateway::GatewayRecord,
}

impl GatewayError {
    pub fn new(message: impl Into<String>, record: crate::gateway::GatewayRecord) -> Self {
        Self {
            message: message.into(),
            record,
        }
    }
}

/// Errors from the EMQX broker admin API client.
#[derive(Debug, Error)]
pub enum AdminApiError {
    #[error("request to broker admin API failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("broker admin API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("gateway not found: {0}")]
    NotFound(String),
}

impl AdminApiError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, AdminApiError::Status { status, .. } if (400..500).contains(status))
    }
}

/// Errors from the time-series writer.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("influxdb credentials are missing or incorrect")]
    Unauthorized,
    #[error("influxdb write failed: {0}")]
    Other(String),
    #[error("annotation end_time must be after start_time")]
    InvalidAnnotationLifetime,
}
