use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, GaugeVec, Histogram, register_counter, register_counter_vec,
    register_gauge_vec, register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("motion_gateway_requests_total", "Total number of requests").unwrap();
    pub static ref RATE_LIMITED_TOTAL: CounterVec = register_counter_vec!(
        "motion_gateway_rate_limited_total",
        "Requests rejected by a rate limiter",
        &["limiter"]
    )
    .unwrap();
    pub static ref UPSTREAM_REQUESTS: CounterVec = register_counter_vec!(
        "motion_gateway_upstream_requests_total",
        "Upstream calls by response status",
        &["status"]
    )
    .unwrap();
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "motion_gateway_upstream_latency_seconds",
        "Upstream call latency in seconds"
    )
    .unwrap();
    pub static ref TRACKED_WINDOWS: GaugeVec = register_gauge_vec!(
        "motion_gateway_tracked_windows",
        "Rate limit windows currently held in memory",
        &["limiter"]
    )
    .unwrap();
}
