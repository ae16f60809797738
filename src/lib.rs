//! Motion gateway
//!
//! An HTTP proxy for the Motion task-management API. It injects the API key,
//! validates required parameters and throttles traffic with fixed-window
//! rate limiters: one global limiter shared by every call proxied upstream,
//! and one per-IP limiter for everything else.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod upstream;
pub mod validation;

pub use routes::build_router;
pub use state::AppState;
