//! Rate limiter: quota policy over a window store.

use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::store::{MemoryWindowStore, WindowStore};
use crate::error::{GatewayError, Result};

/// Key shared by every caller under `KeyStrategy::Global`.
pub const GLOBAL_KEY: &str = "global";

/// Key used when no caller address can be determined.
pub const UNKNOWN_KEY: &str = "unknown";

/// How requests are bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// One counter for every caller
    Global,
    /// One counter per caller IP
    PerIp,
}

/// Configuration for one limiter instance.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Label used in logs and metrics
    pub name: String,
    pub window: Duration,
    pub max_requests: u32,
    pub key_strategy: KeyStrategy,
    /// Body of every 429 response
    pub rejection_message: String,
    /// Emit X-RateLimit-* headers
    pub headers: bool,
    /// Give back requests answered with status < 400
    pub skip_successful_requests: bool,
    /// Give back requests answered with status >= 400
    pub skip_failed_requests: bool,
    /// Prefer X-Forwarded-For / X-Real-IP over the socket address
    pub trust_forwarded_for: bool,
}

impl LimiterConfig {
    pub fn new(
        name: impl Into<String>,
        key_strategy: KeyStrategy,
        max_requests: u32,
        window: Duration,
        rejection_message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            window,
            max_requests,
            key_strategy,
            rejection_message: rejection_message.into(),
            headers: true,
            skip_successful_requests: false,
            skip_failed_requests: false,
            trust_forwarded_for: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.window.is_zero() {
            return Err(GatewayError::Config(format!(
                "{} limiter: window must be greater than zero",
                self.name
            )));
        }
        if self.max_requests == 0 {
            return Err(GatewayError::Config(format!(
                "{} limiter: max requests must be greater than zero",
                self.name
            )));
        }
        Ok(())
    }
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
    /// Time left until the current window resets
    pub resets_in: Duration,
}

pub struct RateLimiter {
    config: LimiterConfig,
    store: Arc<dyn WindowStore>,
}

impl RateLimiter {
    /// Create a limiter backed by an in-memory store.
    pub fn new(config: LimiterConfig) -> Result<Self> {
        let store = Arc::new(MemoryWindowStore::new(config.window));
        Self::with_store(config, store)
    }

    /// Create a limiter over an existing store. The store must expire
    /// windows after the same duration the config reports in headers.
    pub fn with_store(config: LimiterConfig, store: Arc<dyn WindowStore>) -> Result<Self> {
        config.validate()?;
        if store.window() != config.window {
            return Err(GatewayError::Config(format!(
                "{} limiter: store window {:?} does not match configured window {:?}",
                config.name,
                store.window(),
                config.window
            )));
        }
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Derive the bucketing key for a request.
    pub fn key_for(&self, req: &Request) -> String {
        match self.config.key_strategy {
            KeyStrategy::Global => GLOBAL_KEY.to_string(),
            KeyStrategy::PerIp => {
                let forwarded = if self.config.trust_forwarded_for {
                    forwarded_ip(req.headers())
                } else {
                    None
                };

                forwarded
                    .or_else(|| {
                        req.extensions()
                            .get::<ConnectInfo<SocketAddr>>()
                            .map(|ci| ci.0.ip().to_string())
                    })
                    .unwrap_or_else(|| UNKNOWN_KEY.to_string())
            }
        }
    }

    /// Count one request against `key` and decide whether it may proceed.
    pub fn check(&self, key: &str) -> Result<Decision> {
        let window = self.store.increment(key)?;
        let limit = self.config.max_requests;

        Ok(Decision {
            allowed: window.count <= limit,
            count: window.count,
            limit,
            remaining: limit.saturating_sub(window.count),
            resets_in: window
                .resets_at(self.config.window)
                .saturating_duration_since(Instant::now()),
        })
    }

    /// Undo one counted request.
    pub fn give_back(&self, key: &str) -> Result<()> {
        self.store.decrement(key)
    }

    pub fn hits(&self, key: &str) -> Result<u32> {
        self.store.query(key)
    }

    pub fn reset(&self, key: &str) -> Result<()> {
        self.store.reset(key)
    }

    /// Clear every tracked window.
    pub fn reset_all(&self) -> Result<()> {
        self.store.reset_all()
    }

    /// Forget windows that have already expired.
    pub fn purge_expired(&self) -> Result<usize> {
        self.store.purge_expired()
    }

    pub fn tracked_windows(&self) -> usize {
        self.store.len()
    }
}

// X-Forwarded-For takes its first non-empty entry, X-Real-IP is the fallback
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()))
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
        })
        .map(str::to_string)
}
