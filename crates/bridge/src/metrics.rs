//! Bridge metrics
//!
//! Emitted through the `metrics` facade; they are no-ops until the host
//! process installs a recorder.
//!
//! - `bridge_requests_total` (counter): labels `method`, `status`
//! - `bridge_token_refreshes_total` (counter)
//! - `bridge_token_persist_failures_total` (counter)

use transport::Method;

/// Record one completed transport round trip.
pub fn record_request(method: &Method, status: u16) {
    metrics::counter!(
        "bridge_requests_total",
        "method" => method.as_str().to_owned(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_token_refresh() {
    metrics::counter!("bridge_token_refreshes_total").increment(1);
}

/// A refreshed token could not be written to the token store.
pub fn record_token_persist_failure() {
    metrics::counter!("bridge_token_persist_failures_total").increment(1);
}

/// Prometheus recorder that is not installed globally, for use with
/// `metrics::set_default_local_recorder`.
#[cfg(test)]
pub(crate) fn isolated_recorder() -> (
    metrics_exporter_prometheus::PrometheusRecorder,
    metrics_exporter_prometheus::PrometheusHandle,
) {
    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    (recorder, handle)
}

/// Sum of the samples of counter `name` whose label set contains every
/// entry of `labels` (e.g. `status="200"`). Zero when absent.
#[cfg(test)]
pub(crate) fn counter_value(rendered: &str, name: &str, labels: &[&str]) -> u64 {
    rendered
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| line.split(['{', ' ']).next() == Some(name))
        .filter(|line| labels.iter().all(|label| line.contains(label)))
        .filter_map(|line| line.rsplit(' ').next()?.parse::<f64>().ok())
        .sum::<f64>() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_request(&Method::GET, 200);
        record_request(&Method::DELETE, 401);
        record_token_refresh();
        record_token_persist_failure();
    }

    #[test]
    fn record_request_increments_labelled_counter() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request(&Method::GET, 200);
        record_request(&Method::GET, 200);
        record_request(&Method::DELETE, 401);

        let output = handle.render();
        assert_eq!(
            counter_value(
                &output,
                "bridge_requests_total",
                &["method=\"GET\"", "status=\"200\""]
            ),
            2,
            "output: {output}"
        );
        assert_eq!(
            counter_value(
                &output,
                "bridge_requests_total",
                &["method=\"DELETE\"", "status=\"401\""]
            ),
            1
        );
        assert_eq!(counter_value(&output, "bridge_requests_total", &[]), 3);
    }

    #[test]
    fn token_counters_are_recorded() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_token_refresh();
        record_token_refresh();
        record_token_persist_failure();

        let output = handle.render();
        assert_eq!(counter_value(&output, "bridge_token_refreshes_total", &[]), 2);
        assert_eq!(
            counter_value(&output, "bridge_token_persist_failures_total", &[]),
            1
        );
    }
}
