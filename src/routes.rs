use axum::{
    Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderValue, header},
    middleware::from_fn_with_state,
    routing::{get, on},
};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    Endpoint, QueryPolicy, Verb, forward, health_handler, metrics_handler, not_found_handler,
};
use crate::rate_limit::rate_limit;
use crate::state::AppState;

/// Prefix under which upstream endpoints are exposed.
pub const PROXY_PREFIX: &str = "/motion";

const WORKSPACE: &[&str] = &["workspaceId"];

pub static ENDPOINTS: &[Endpoint] = &[
    // tasks
    Endpoint {
        verb: Verb::Get,
        path: "/tasks",
        required_query: WORKSPACE,
        required_body: &[],
        query: QueryPolicy::PassThrough,
        failure: "Failed to fetch tasks from Motion API",
    },
    Endpoint {
        verb: Verb::Post,
        path: "/tasks",
        required_query: &[],
        required_body: &["name", "workspaceId"],
        query: QueryPolicy::Body(WORKSPACE),
        failure: "Failed to create task",
    },
    Endpoint {
        verb: Verb::Get,
        path: "/tasks/{taskId}",
        required_query: WORKSPACE,
        required_body: &[],
        query: QueryPolicy::Query(WORKSPACE),
        failure: "Failed to retrieve task",
    },
    Endpoint {
        verb: Verb::Patch,
        path: "/tasks/{taskId}",
        required_query: &[],
        required_body: WORKSPACE,
        query: QueryPolicy::Body(WORKSPACE),
        failure: "Failed to update task",
    },
    Endpoint {
        verb: Verb::Delete,
        path: "/tasks/{taskId}",
        required_query: WORKSPACE,
        required_body: &[],
        query: QueryPolicy::Query(WORKSPACE),
        failure: "Failed to delete task",
    },
    Endpoint {
        verb: Verb::Delete,
        path: "/tasks/{taskId}/unassign",
        required_query: &[],
        required_body: &[],
        query: QueryPolicy::None,
        failure: "Failed to unassign task",
    },
    // recurring tasks
    Endpoint {
        verb: Verb::Get,
        path: "/recurring-tasks",
        required_query: WORKSPACE,
        required_body: &[],
        query: QueryPolicy::Query(WORKSPACE),
        failure: "Failed to fetch recurring tasks",
    },
    Endpoint {
        verb: Verb::Post,
        path: "/recurring-tasks",
        required_query: WORKSPACE,
        required_body: &[],
        query: QueryPolicy::Query(WORKSPACE),
        failure: "Failed to create recurring task",
    },
    Endpoint {
        verb: Verb::Delete,
        path: "/recurring-tasks/{taskId}",
        required_query: WORKSPACE,
        required_body: &[],
        query: QueryPolicy::Query(WORKSPACE),
        failure: "Failed to delete recurring task",
    },
    // projects
    Endpoint {
        verb: Verb::Get,
        path: "/projects",
        required_query: WORKSPACE,
        required_body: &[],
        query: QueryPolicy::Query(WORKSPACE),
        failure: "Failed to fetch projects",
    },
    Endpoint {
        verb: Verb::Post,
        path: "/projects",
        required_query: &[],
        required_body: WORKSPACE,
        query: QueryPolicy::None,
        failure: "Failed to create project",
    },
    Endpoint {
        verb: Verb::Get,
        path: "/projects/{projectId}",
        required_query: WORKSPACE,
        required_body: &[],
        query: QueryPolicy::Query(WORKSPACE),
        failure: "Failed to retrieve project",
    },
    // users
    Endpoint {
        verb: Verb::Get,
        path: "/users",
        required_query: &[],
        required_body: &[],
        query: QueryPolicy::None,
        failure: "Failed to fetch users",
    },
    Endpoint {
        verb: Verb::Get,
        path: "/users/me",
        required_query: WORKSPACE,
        required_body: &[],
        query: QueryPolicy::Query(WORKSPACE),
        failure: "Failed to fetch current user",
    },
    // comments and schedules
    Endpoint {
        verb: Verb::Get,
        path: "/comments",
        required_query: &[],
        required_body: &[],
        query: QueryPolicy::None,
        failure: "Failed to fetch comments",
    },
    Endpoint {
        verb: Verb::Post,
        path: "/comments",
        required_query: &[],
        required_body: &[],
        query: QueryPolicy::None,
        failure: "Failed to create comment",
    },
    Endpoint {
        verb: Verb::Get,
        path: "/schedules",
        required_query: &[],
        required_body: &[],
        query: QueryPolicy::None,
        failure: "Failed to fetch schedules",
    },
];

// Upstream endpoints, all behind the proxy limiter
fn proxy_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let mut router = Router::new();
    for endpoint in ENDPOINTS {
        router = router.route(
            endpoint.path,
            on(
                endpoint.verb.filter(),
                move |State(state): State<Arc<AppState>>,
                      Path(params): Path<HashMap<String, String>>,
                      Query(query): Query<Vec<(String, String)>>,
                      body: Bytes| async move {
                    forward(&state, endpoint, params, query, body).await
                },
            ),
        );
    }
    router.layer(from_fn_with_state(
        Arc::clone(&state.proxy_limiter),
        rate_limit,
    ))
}

// Health, metrics and the fallback, behind the per-IP limiter
fn service_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found_handler)
        .layer(from_fn_with_state(
            Arc::clone(&state.general_limiter),
            rate_limit,
        ))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest(PROXY_PREFIX, proxy_routes(&state))
        .merge(service_routes(&state))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
