mod health;
mod metrics;
pub mod proxy;

pub use health::{health_handler, not_found_handler};
pub use metrics::metrics_handler;
pub use proxy::{Endpoint, QueryPolicy, Verb, forward};
