//! Fixed-window rate limiting.
//!
//! A [`WindowStore`] owns the per-key counters, a [`RateLimiter`] applies a
//! quota and key strategy on top of it, and [`rate_limit`] is the axum
//! middleware that gates requests with it.

pub mod limiter;
pub mod middleware;
pub mod store;

pub use limiter::{Decision, KeyStrategy, LimiterConfig, RateLimiter};
pub use middleware::rate_limit;
pub use store::{MemoryWindowStore, RateWindow, WindowStore};
