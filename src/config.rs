use clap::{ArgAction, Parser};
use std::time::Duration;

use crate::rate_limit::{KeyStrategy, LimiterConfig};

pub const DEFAULT_UPSTREAM_URL: &str = "https://api.usemotion.com/v1";

pub const PROXY_REJECTION_MESSAGE: &str =
    "API rate limit exceeded for Motion API. Please try again after a minute";
pub const GENERAL_REJECTION_MESSAGE: &str =
    "Too many requests from this IP, please try again after a minute";

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "motion-gateway")]
#[command(about = "Rate limited proxy for the Motion API")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    // Base url of the upstream API
    #[arg(short, long, env = "MOTION_API_URL", default_value = DEFAULT_UPSTREAM_URL)]
    pub upstream_url: String,

    // Sent upstream as X-API-Key
    #[arg(long, env = "MOTION_API_KEY", hide_env_values = true)]
    pub api_key: String,

    // Upstream request timeout in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT", default_value_t = 30)]
    pub upstream_timeout: u64,

    // Proxy paths: max requests per window, shared by all callers
    #[arg(long, env = "PROXY_RATE_LIMIT", default_value_t = 11)]
    pub proxy_rate_limit: u32,

    // Proxy rate limit window in seconds
    #[arg(long, env = "PROXY_RATE_WINDOW", default_value_t = 60)]
    pub proxy_rate_window: u64,

    // Other paths: max requests per window per caller IP
    #[arg(long, env = "GENERAL_RATE_LIMIT", default_value_t = 100)]
    pub general_rate_limit: u32,

    // General rate limit window in seconds
    #[arg(long, env = "GENERAL_RATE_WINDOW", default_value_t = 60)]
    pub general_rate_window: u64,

    // Key per-IP limits on X-Forwarded-For / X-Real-IP (only behind a trusted proxy).
    // Callers can then mint keys freely; expired windows are swept once per window.
    #[arg(long, env = "TRUST_FORWARDED_FOR")]
    pub trust_forwarded_for: bool,

    // Give back requests answered with status < 400
    #[arg(long, env = "SKIP_SUCCESSFUL_REQUESTS")]
    pub skip_successful_requests: bool,

    // Give back requests answered with status >= 400
    #[arg(long, env = "SKIP_FAILED_REQUESTS")]
    pub skip_failed_requests: bool,

    // Emit X-RateLimit-* headers
    #[arg(long, env = "RATE_LIMIT_HEADERS", default_value_t = true, action = ArgAction::Set)]
    pub rate_limit_headers: bool,
}

impl Args {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }

    // How often expired windows are swept: the shorter of the two windows
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.proxy_rate_window.min(self.general_rate_window).max(1))
    }

    pub fn proxy_limiter(&self) -> LimiterConfig {
        let mut config = LimiterConfig::new(
            "proxy",
            KeyStrategy::Global,
            self.proxy_rate_limit,
            Duration::from_secs(self.proxy_rate_window),
            PROXY_REJECTION_MESSAGE,
        );
        self.apply_common(&mut config);
        config
    }

    pub fn general_limiter(&self) -> LimiterConfig {
        let mut config = LimiterConfig::new(
            "general",
            KeyStrategy::PerIp,
            self.general_rate_limit,
            Duration::from_secs(self.general_rate_window),
            GENERAL_REJECTION_MESSAGE,
        );
        self.apply_common(&mut config);
        config.trust_forwarded_for = self.trust_forwarded_for;
        config
    }

    fn apply_common(&self, config: &mut LimiterConfig) {
        config.headers = self.rate_limit_headers;
        config.skip_successful_requests = self.skip_successful_requests;
        config.skip_failed_requests = self.skip_failed_requests;
    }
}
