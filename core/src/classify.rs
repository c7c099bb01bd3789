//! Failure classification for the dispatcher.

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::HttpRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The access token is no longer valid; renew and replay.
    SessionExpired,
    /// The failing request targeted login, refresh or logout. Never renewed.
    RenewalEndpointFailure,
    /// Anything else: network errors, validation errors, other statuses.
    OtherFailure,
}

pub fn classify(error: &ApiError, request: &HttpRequest, config: &ClientConfig) -> FailureKind {
    if config.auth_paths.is_excluded(request.target()) {
        return FailureKind::RenewalEndpointFailure;
    }
    match error {
        ApiError::Status { status, .. } if config.is_session_expired_status(*status) => FailureKind::SessionExpired,
        _ => FailureKind::OtherFailure,
    }
}
