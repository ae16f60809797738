use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::limiter::{Decision, RateLimiter};
use crate::metrics::{RATE_LIMITED_TOTAL, REQUEST_TOTAL, TRACKED_WINDOWS};

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

// Rate limit middleware, one instance per limiter
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    REQUEST_TOTAL.inc();

    let key = limiter.key_for(&req);
    let decision = match limiter.check(&key) {
        Ok(decision) => decision,
        Err(e) => {
            // fail closed: never admit a request we could not count
            error!(limiter = limiter.name(), key = %key, error = %e, "Rate limit check failed");
            return e.into_response();
        }
    };
    TRACKED_WINDOWS
        .with_label_values(&[limiter.name()])
        .set(limiter.tracked_windows() as f64);

    let config = limiter.config();

    if !decision.allowed {
        RATE_LIMITED_TOTAL.with_label_values(&[limiter.name()]).inc();
        warn!(
            limiter = limiter.name(),
            key = %key,
            count = decision.count,
            "Rate limit exceeded"
        );

        let mut response =
            (StatusCode::TOO_MANY_REQUESTS, config.rejection_message.clone()).into_response();
        if config.headers {
            apply_headers(response.headers_mut(), &decision);
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(decision.resets_in.as_secs_f64().ceil() as u64),
            );
        }
        return response;
    }

    debug!(limiter = limiter.name(), key = %key, count = decision.count, "Request admitted");

    let mut response = next.run(req).await;

    let failed = response.status().is_client_error() || response.status().is_server_error();
    let uncounted = if failed {
        config.skip_failed_requests
    } else {
        config.skip_successful_requests
    };
    if uncounted {
        if let Err(e) = limiter.give_back(&key) {
            error!(limiter = limiter.name(), key = %key, error = %e, "Failed to give back request");
        }
    }

    if config.headers {
        apply_headers(response.headers_mut(), &decision);
    }
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &Decision) {
    // Unix second at which the window resets
    let reset = chrono::Utc::now().timestamp() + decision.resets_in.as_secs_f64().ceil() as i64;

    headers.insert(LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(decision.remaining));
    headers.insert(RESET_HEADER, HeaderValue::from(reset));
}
