//! Client metrics
//!
//! - `api_client_requests_total` (counter): labels `method`, `outcome`
//! - `api_client_refresh_total` (counter): label `outcome`
//! - `api_client_queued_requests_total` (counter)
//!
//! No-ops unless the host installs a recorder.

/// Record a finished call. `outcome` is `success` or an `ErrorKind` label.
pub fn record_request(method: &str, outcome: &str) {
    metrics::counter!(
        "api_client_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a refresh attempt outcome: `success`, `failure` or
/// `skipped_no_refresh_token`.
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("api_client_refresh_total", "outcome" => outcome).increment(1);
}

/// Record a request parked behind an in-flight refresh.
pub fn record_queued() {
    metrics::counter!("api_client_queued_requests_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

    /// Isolated recorder/handle pair; install_recorder() is process-global.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_request("GET", "success");
        record_refresh("success");
        record_queued();
    }

    #[test]
    fn request_counter_carries_labels() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request("GET", "success");
        record_request("POST", "not_found");

        let output = handle.render();
        assert!(output.contains("api_client_requests_total"));
        assert!(output.contains("method=\"GET\""));
        assert!(output.contains("outcome=\"not_found\""));
    }

    #[test]
    fn refresh_and_queue_counters_render() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_refresh("failure");
        record_queued();
        record_queued();

        let output = handle.render();
        assert!(output.contains("api_client_refresh_total{outcome=\"failure\"} 1"));
        assert!(output.contains("api_client_queued_requests_total 2"));
    }
}
