//! Prometheus counters for the request pipeline. They are registered with the default registry,
//! expose them with `prometheus::gather()`.

use hyper::{Method, StatusCode};
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, opts, register_int_counter, register_int_counter_vec};

lazy_static! {
    static ref DAV_REQUESTS_TOTAL: IntCounterVec =
        register_int_counter_vec!("homedav_requests_total", "Total number of requests received, by method.", &["method"]).unwrap();
    static ref DAV_RESPONSES_TOTAL: IntCounterVec =
        register_int_counter_vec!("homedav_responses_total", "Total number of responses sent, by status class.", &["range"]).unwrap();
    static ref DAV_AUTH_FAILURES: IntCounter =
        register_int_counter!(opts!("homedav_auth_failures_total", "Total number of requests with missing or bad credentials.")).unwrap();
    static ref DAV_PERMISSION_DENIED: IntCounter =
        register_int_counter!(opts!("homedav_permission_denied_total", "Total number of requests refused with 403 Forbidden.")).unwrap();
}

/// Counts a request.
pub fn add_request_metric(method: &Method) {
    DAV_REQUESTS_TOTAL.with_label_values(&[&method.as_str().to_lowercase()]).inc();
}

/// Counts a response by its status class and notes denials.
pub fn add_response_metric(status: StatusCode) {
    let range = format!("{}xx", status.as_u16() / 100);
    DAV_RESPONSES_TOTAL.with_label_values(&[&range]).inc();
    match status {
        StatusCode::UNAUTHORIZED => DAV_AUTH_FAILURES.inc(),
        StatusCode::FORBIDDEN => DAV_PERMISSION_DENIED.inc(),
        _ => {}
    }
}
