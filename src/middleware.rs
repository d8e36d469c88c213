//! Per-request deadline.

use std::time::Duration;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::web;
use log::warn;

use crate::error::ApiError;
use crate::state::AppState;

const FALLBACK_DEADLINE: Duration = Duration::from_secs(30);

/// Drops the handler future once the configured timeout elapses, which
/// cancels any store call still in flight, and fails with
/// [`ApiError::DeadlineExceeded`]. The server renders that as the usual 503
/// envelope.
///
/// The request is handed to the router untouched: routing needs sole access
/// to the `HttpRequest`, so only the method and path are kept for the log.
pub async fn enforce_deadline<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<B>, actix_web::Error> {
    let deadline = req
        .app_data::<web::Data<AppState>>()
        .map_or(FALLBACK_DEADLINE, |state| state.request_timeout);
    let method = req.method().to_string();
    let path = req.path().to_owned();

    match tokio::time::timeout(deadline, next.call(req)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!("{} {} exceeded its {:?} deadline", method, path, deadline);
            Err(ApiError::DeadlineExceeded.into())
        }
    }
}
