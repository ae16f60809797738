use axum::body::Bytes;
use axum::http::{Method, StatusCode};
use reqwest::Url;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::metrics::{UPSTREAM_LATENCY, UPSTREAM_REQUESTS};

pub const API_KEY_HEADER: &str = "x-api-key";

// Raw upstream reply, relayed as-is by the proxy handlers
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

// Client for the task-management API; injects the API key on every call
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: Url,
}

impl UpstreamClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| GatewayError::Config(format!("invalid upstream url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Config(format!(
                "upstream url {base_url} cannot be a base"
            )));
        }

        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| GatewayError::Config("API key is not a valid header value".into()))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // Base url + path segments (percent-encoded) + query pairs
    pub fn url_for(&self, segments: &[String], query: &[(String, String)]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    pub async fn send(
        &self,
        method: Method,
        segments: &[String],
        query: &[(String, String)],
        body: Option<Vec<u8>>,
    ) -> std::result::Result<UpstreamResponse, reqwest::Error> {
        let url = self.url_for(segments, query);
        debug!(%method, %url, "Forwarding request upstream");

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.body(body);
        }

        let start_time = Instant::now();
        let result = request.send().await;
        UPSTREAM_LATENCY.observe(start_time.elapsed().as_secs_f64());

        let res = match result {
            Ok(res) => res,
            Err(e) => {
                UPSTREAM_REQUESTS.with_label_values(&["error"]).inc();
                return Err(e);
            }
        };

        let status = res.status();
        UPSTREAM_REQUESTS
            .with_label_values(&[status.as_str()])
            .inc();
        let content_type = res.headers().get(CONTENT_TYPE).cloned();
        let body = res.bytes().await?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}
