use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Args;
use crate::error::Result;
use crate::rate_limit::RateLimiter;
use crate::upstream::UpstreamClient;

// app's shared state
pub struct AppState {
    pub upstream: UpstreamClient,
    pub proxy_limiter: Arc<RateLimiter>,   // guards calls proxied upstream
    pub general_limiter: Arc<RateLimiter>, // guards everything else
}

impl AppState {
    pub fn new(
        upstream: UpstreamClient,
        proxy_limiter: RateLimiter,
        general_limiter: RateLimiter,
    ) -> Self {
        Self {
            upstream,
            proxy_limiter: Arc::new(proxy_limiter),
            general_limiter: Arc::new(general_limiter),
        }
    }

    pub fn from_args(args: &Args) -> Result<Self> {
        let upstream = UpstreamClient::new(&args.upstream_url, &args.api_key, args.upstream_timeout())?;
        let proxy_limiter = RateLimiter::new(args.proxy_limiter())?;
        let general_limiter = RateLimiter::new(args.general_limiter())?;
        Ok(Self::new(upstream, proxy_limiter, general_limiter))
    }

    /// Clear every window of both limiters.
    pub fn reset_rate_limits(&self) -> Result<()> {
        self.proxy_limiter.reset_all()?;
        self.general_limiter.reset_all()?;
        info!("Rate limit windows cleared");
        Ok(())
    }

    /// Drop expired windows from both limiters.
    pub fn purge_expired_windows(&self) -> Result<usize> {
        let purged = self.proxy_limiter.purge_expired()? + self.general_limiter.purge_expired()?;
        if purged > 0 {
            debug!(purged, "Expired rate limit windows purged");
        }
        Ok(purged)
    }
}
