use std::sync::atomic::{AtomicU64, Ordering};

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;

// Process-wide counters fed by the cache layer; cheap enough to bump on
// every view.
static VIEWS_COUNTED: AtomicU64 = AtomicU64::new(0);
static VIEWS_DEDUPED: AtomicU64 = AtomicU64::new(0);
static SNAPSHOT_CYCLES: AtomicU64 = AtomicU64::new(0);

pub fn inc_view_counted() {
    VIEWS_COUNTED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_view_deduped() {
    VIEWS_DEDUPED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_snapshot_cycle() {
    SNAPSHOT_CYCLES.fetch_add(1, Ordering::Relaxed);
}

pub fn metrics_text(service_name: &str) -> String {
    let views_counted = VIEWS_COUNTED.load(Ordering::Relaxed);
    let views_deduped = VIEWS_DEDUPED.load(Ordering::Relaxed);
    let snapshot_cycles = SNAPSHOT_CYCLES.load(Ordering::Relaxed);
    format!(
        "# HELP ps_up Service health
# TYPE ps_up gauge
ps_up{{service=\"{service_name}\"}} 1
# HELP ps_views_counted_total Views accepted past the dedup filter
# TYPE ps_views_counted_total counter
ps_views_counted_total{{service=\"{service_name}\"}} {views_counted}
# HELP ps_views_deduped_total Views suppressed as repeats inside the dedup window
# TYPE ps_views_deduped_total counter
ps_views_deduped_total{{service=\"{service_name}\"}} {views_deduped}
# HELP ps_snapshot_cycles_total Completed hot-snapshot refresh cycles
# TYPE ps_snapshot_cycles_total counter
ps_snapshot_cycles_total{{service=\"{service_name}\"}} {snapshot_cycles}
"
    )
}

pub fn metrics_response(service_name: &str) -> impl IntoResponse {
    let body = metrics_text(service_name);
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        "text/plain; version=0.0.4".parse().unwrap(),
    );
    (StatusCode::OK, headers, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_text_names_the_service_on_every_series() {
        let body = metrics_text("ps-api");
        assert!(body.contains("ps_up{service=\"ps-api\"} 1"));
        assert!(body.contains("ps_views_counted_total{service=\"ps-api\"}"));
        assert!(body.contains("ps_views_deduped_total{service=\"ps-api\"}"));
        assert!(body.contains("ps_snapshot_cycles_total{service=\"ps-api\"}"));
    }

    #[test]
    fn view_counters_are_monotonic() {
        let parse = |body: &str, series: &str| -> u64 {
            body.lines()
                .find(|line| line.starts_with(series))
                .and_then(|line| line.rsplit(' ').next())
                .and_then(|value| value.parse().ok())
                .expect("series present")
        };

        let before = parse(&metrics_text("t"), "ps_views_counted_total");
        inc_view_counted();
        inc_view_counted();
        let after = parse(&metrics_text("t"), "ps_views_counted_total");
        assert!(after >= before + 2);
    }
}
