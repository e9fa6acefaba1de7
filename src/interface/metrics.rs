//! Prometheus metrics endpoint

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics exporter
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new().install_recorder().unwrap();

    describe_counter!(
        "cti_events_processed",
        "Total number of signaling events applied to the call state"
    );
    describe_counter!(
        "cti_ami_events_decoded",
        "Total number of AMI frames decoded into tracked events"
    );
    describe_counter!(
        "cti_ami_frames_dropped",
        "Total number of malformed AMI frames dropped"
    );
    describe_counter!(
        "cti_notifications_sent",
        "Total number of current-call notifications pushed to clients"
    );

    handle
}

/// HTTP metrics handler
pub async fn metrics_handler(
    axum::extract::State(prometheus_handle): axum::extract::State<PrometheusHandle>,
) -> Response {
    (StatusCode::OK, prometheus_handle.render()).into_response()
}
