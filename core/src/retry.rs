//! One-shot replay of a request after a successful renewal.

use tracing::{debug, warn};

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{send_checked, Transport};

/// Re-issue `request` straight through the transport.
///
/// The outcome is final: a failed replay, including another expired-session
/// status, is returned as-is and never triggers a second renewal. The caller
/// marks the descriptor `retried` before calling this.
pub async fn retry_once<T: Transport>(transport: &T, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
    debug_assert!(request.retried, "retry_once expects a descriptor already marked as retried");
    debug!(method = %request.method, path = %request.path, "replaying request after session renewal");

    let outcome = send_checked(transport, request).await;
    if let Err(error) = &outcome {
        warn!(method = %request.method, path = %request.path, %error, "replayed request failed");
    }
    outcome
}
