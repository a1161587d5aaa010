//! Per-request bounds: a request timeout, and the force-close signal raised
//! when a graceful shutdown overruns its deadline.

use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::watch;
use tracing::{warn, Span};

use crate::error::ApiError;

#[derive(Clone)]
pub struct RequestGuard {
    request_timeout: Duration,
    force_close: watch::Receiver<bool>,
    span: Span,
}

impl RequestGuard {
    pub fn new(request_timeout: Duration, force_close: watch::Receiver<bool>, span: Span) -> Self {
        Self {
            request_timeout,
            force_close,
            span,
        }
    }
}

/// Resolves once `signal` turns true. Never resolves if the sender is
/// dropped first.
pub(crate) async fn raised(mut signal: watch::Receiver<bool>) {
    loop {
        let is_raised = *signal.borrow_and_update();
        if is_raised {
            return;
        }
        if signal.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}

pub async fn request_guard_middleware(
    State(guard): State<RequestGuard>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_owned();

    tokio::select! {
        result = tokio::time::timeout(guard.request_timeout, next.run(req)) => match result {
            Ok(response) => response,
            Err(_) => {
                warn!(parent: &guard.span, path = %path, timeout = ?guard.request_timeout, "Request timed out");
                ApiError::TimedOut.into_response()
            }
        },
        _ = raised(guard.force_close.clone()) => {
            warn!(parent: &guard.span, path = %path, "Request cancelled by forced shutdown");
            ApiError::ShuttingDown.into_response()
        }
    }
}
