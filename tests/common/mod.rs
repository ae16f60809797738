#![allow(dead_code)]

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::ConnectInfo,
    http::{HeaderMap, Method, Request, StatusCode, Uri},
    response::Response,
    routing::{delete, get},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use motion_gateway::config::{GENERAL_REJECTION_MESSAGE, PROXY_REJECTION_MESSAGE};
use motion_gateway::rate_limit::{KeyStrategy, LimiterConfig, RateLimiter};
use motion_gateway::upstream::UpstreamClient;
use motion_gateway::{AppState, build_router};

pub const API_KEY: &str = "test-api-key";

/// In-process stand-in for the upstream API. Unknown routes echo the call.
pub struct StubUpstream {
    pub base_url: String,
    pub calls: Arc<Mutex<Vec<Value>>>,
}

impl StubUpstream {
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }
}

pub async fn spawn_upstream() -> StubUpstream {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&calls);

    let app = Router::new()
        .route(
            "/v1/tasks/missing",
            get(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "message": "Task not found" })),
                )
            }),
        )
        .route(
            "/v1/tasks/gone/unassign",
            delete(|| async { StatusCode::NO_CONTENT }),
        )
        .fallback(
            move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
                let recorded = Arc::clone(&recorded);
                async move {
                    let call = json!({
                        "method": method.as_str(),
                        "path": uri.path(),
                        "query": uri.query(),
                        "apiKey": headers.get("x-api-key").and_then(|v| v.to_str().ok()),
                        "body": serde_json::from_slice::<Value>(&body).ok(),
                        "raw": String::from_utf8_lossy(&body),
                    });
                    recorded.lock().unwrap().push(call.clone());
                    Json(call)
                }
            },
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubUpstream {
        base_url: format!("http://{addr}/v1"),
        calls,
    }
}

/// Address nothing listens on.
pub async fn dead_upstream() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/v1")
}

pub fn gateway(base_url: &str, proxy_limit: u32, general_limit: u32) -> (Arc<AppState>, Router) {
    let upstream = UpstreamClient::new(base_url, API_KEY, Duration::from_secs(5)).unwrap();
    let proxy = RateLimiter::new(LimiterConfig::new(
        "proxy",
        KeyStrategy::Global,
        proxy_limit,
        Duration::from_secs(60),
        PROXY_REJECTION_MESSAGE,
    ))
    .unwrap();
    let general = RateLimiter::new(LimiterConfig::new(
        "general",
        KeyStrategy::PerIp,
        general_limit,
        Duration::from_secs(60),
        GENERAL_REJECTION_MESSAGE,
    ))
    .unwrap();

    let state = Arc::new(AppState::new(upstream, proxy, general));
    (Arc::clone(&state), build_router(state))
}

pub fn request(method: Method, uri: &str, ip: [u8; 4], body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let mut req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((ip, 51000))));
    req
}

pub async fn body_bytes(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn json_body(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn header(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .map(|v| v.to_str().unwrap().to_string())
}
