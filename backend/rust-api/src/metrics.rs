use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref QUIZ_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_attempts_total",
        "Total number of graded quiz attempts",
        &["passed"]
    )
    .unwrap();

    pub static ref ENROLLMENTS_TOTAL: IntCounter = register_int_counter!(
        "enrollments_total",
        "Total number of course enrollments"
    )
    .unwrap();

    pub static ref LESSONS_COMPLETED_TOTAL: IntCounter = register_int_counter!(
        "lessons_completed_total",
        "Total number of lessons marked complete"
    )
    .unwrap();

    pub static ref ASSIGNMENT_SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "assignment_submissions_total",
        "Total number of assignment submissions",
        &["kind"]
    )
    .unwrap();

    pub static ref ASSIGNMENTS_REVIEWED_TOTAL: IntCounter = register_int_counter!(
        "assignments_reviewed_total",
        "Total number of graded assignments"
    )
    .unwrap();

    pub static ref UPLOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "uploads_total",
        "Total number of stored uploads",
        &["folder"]
    )
    .unwrap();

    pub static ref AUTH_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "auth_events_total",
        "Authentication events",
        &["event", "status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

pub fn record_auth_event(event: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    AUTH_EVENTS_TOTAL.with_label_values(&[event, status]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let _ = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/health", "200"])
            .get();
        let _ = ENROLLMENTS_TOTAL.get();
    }

    #[test]
    fn test_render_metrics() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();
        QUIZ_ATTEMPTS_TOTAL.with_label_values(&["true"]).inc();
        record_auth_event("login", false);

        let output = render_metrics().unwrap();
        assert!(output.contains("http_requests_total"));
        assert!(output.contains("quiz_attempts_total"));
        assert!(output.contains("auth_events_total"));
    }
}
