use axum::{
    body::{Body, Bytes},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::MethodFilter,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{error, warn};

use crate::error::{GatewayError, Result};
use crate::state::AppState;
use crate::validation::{parse_body, require_body_params, require_query_params};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Patch,
    Delete,
}

impl Verb {
    pub fn method(self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Patch => Method::PATCH,
            Verb::Delete => Method::DELETE,
        }
    }

    pub fn filter(self) -> MethodFilter {
        match self {
            Verb::Get => MethodFilter::GET,
            Verb::Post => MethodFilter::POST,
            Verb::Patch => MethodFilter::PATCH,
            Verb::Delete => MethodFilter::DELETE,
        }
    }

    // Only these forward the caller's body upstream
    pub fn has_body(self) -> bool {
        matches!(self, Verb::Post | Verb::Patch)
    }
}

/// Which query parameters reach the upstream call.
#[derive(Debug, Clone, Copy)]
pub enum QueryPolicy {
    None,
    /// Every query parameter the caller sent
    PassThrough,
    /// Named query parameters, when present
    Query(&'static [&'static str]),
    /// Named body fields, sent as query parameters
    Body(&'static [&'static str]),
}

impl QueryPolicy {
    fn select(&self, query: &[(String, String)], body: &Value) -> Vec<(String, String)> {
        match self {
            QueryPolicy::None => Vec::new(),
            QueryPolicy::PassThrough => query.to_vec(),
            QueryPolicy::Query(names) => query
                .iter()
                .filter(|(key, _)| names.contains(&key.as_str()))
                .cloned()
                .collect(),
            QueryPolicy::Body(names) => names
                .iter()
                .filter_map(|name| {
                    let value = match body.get(*name)? {
                        Value::Null => return None,
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    Some((name.to_string(), value))
                })
                .collect(),
        }
    }
}

/// One proxied route. `path` is both the local route (under the proxy
/// prefix) and the upstream path template.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    pub verb: Verb,
    pub path: &'static str,
    pub required_query: &'static [&'static str],
    pub required_body: &'static [&'static str],
    pub query: QueryPolicy,
    /// Error text when the upstream gives nothing better
    pub failure: &'static str,
}

impl Endpoint {
    // "/tasks/{taskId}" -> ["tasks", "<taskId>"]
    fn render_path(&self, params: &HashMap<String, String>) -> Result<Vec<String>> {
        self.path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                match segment
                    .strip_prefix('{')
                    .and_then(|s| s.strip_suffix('}'))
                {
                    Some(name) => params.get(name).cloned().ok_or_else(|| {
                        GatewayError::Internal(format!("unbound path parameter {name}"))
                    }),
                    None => Ok(segment.to_string()),
                }
            })
            .collect()
    }
}

// Validate, shape and forward one request, then relay the upstream reply
pub async fn forward(
    state: &AppState,
    endpoint: &Endpoint,
    params: HashMap<String, String>,
    query: Vec<(String, String)>,
    body: Bytes,
) -> Result<Response> {
    let payload = if endpoint.verb.has_body() {
        parse_body(&body)?
    } else {
        Value::Object(Default::default())
    };

    require_query_params(&query, endpoint.required_query)?;
    require_body_params(&payload, endpoint.required_body)?;

    let segments = endpoint.render_path(&params)?;
    let upstream_query = endpoint.query.select(&query, &payload);
    // the caller's bytes go upstream untouched; an empty body becomes {}
    let upstream_body = if !endpoint.verb.has_body() {
        None
    } else if body.iter().all(u8::is_ascii_whitespace) {
        Some(b"{}".to_vec())
    } else {
        Some(body.to_vec())
    };

    let res = state
        .upstream
        .send(endpoint.verb.method(), &segments, &upstream_query, upstream_body)
        .await
        .map_err(|source| {
            error!(path = endpoint.path, error = %source, "{}", endpoint.failure);
            GatewayError::UpstreamUnavailable {
                message: endpoint.failure,
                source,
            }
        })?;

    if !res.status.is_success() {
        warn!(path = endpoint.path, status = %res.status, "{}", endpoint.failure);
        return Err(GatewayError::Upstream {
            status: res.status,
            body: error_payload(&res.body, endpoint.failure),
        });
    }

    if res.body.is_empty() {
        return Ok(StatusCode::OK.into_response());
    }

    let content_type = res
        .content_type
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        Body::from(res.body),
    )
        .into_response())
}

// Upstream error body as JSON, falling back to text, then to `failure`
fn error_payload(body: &[u8], failure: &str) -> Value {
    if body.is_empty() {
        return Value::String(failure.to_string());
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}
