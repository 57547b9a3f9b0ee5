//! API request and response types

use crate::db::Student;
use crate::runtime::SessionStatus;
use serde::Serialize;

/// Response for an inbound message
///
/// `delivered` is false when the step ran but its reply never reached the
/// outbox; the message must not be sent again.
#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub status: SessionStatus,
    pub delivered: bool,
}

/// Response with a freshly minted deep link
#[derive(Debug, Serialize)]
pub struct DeepLinkResponse {
    pub token: String,
    pub url: String,
    pub student: Student,
}

/// Response for cancel action
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
