use anyhow::{Context, Result};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Initialize Prometheus metrics exporter
/// Returns a handle that can be used to render metrics for scraping
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        // Buckets: 1ms .. 10s
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        )
        .context("failed to set buckets for http_request_duration_seconds")?
        // Buckets: 10ms .. 60s, a cycle includes the upstream fetch
        .set_buckets_for_metric(
            Matcher::Full("tracker.cycle_duration_ms".to_string()),
            &[
                10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0, 60000.0,
            ],
        )
        .context("failed to set buckets for tracker.cycle_duration_ms")?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Background task to update process metrics
/// Updates uptime and memory usage metrics every 5 seconds until cancelled
pub async fn process_metrics_task(shutdown: CancellationToken) {
    let start_time = Instant::now();

    loop {
        metrics::gauge!("process.uptime.seconds").set(start_time.elapsed().as_secs() as f64);
        metrics::gauge!("process.is_up").set(1.0);

        #[cfg(target_os = "linux")]
        {
            if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
                for line in status.lines() {
                    if line.starts_with("VmRSS:") {
                        if let Some(kb_str) = line.split_whitespace().nth(1)
                            && let Ok(kb) = kb_str.parse::<f64>()
                        {
                            metrics::gauge!("process.memory.bytes").set(kb * 1024.0);
                        }
                        break;
                    }
                }
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs(5)) => {}
        }
    }
}

/// Initialize tracker metrics to zero/default values
/// This ensures metrics always appear in Prometheus queries even if no events have occurred
pub fn initialize_tracker_metrics(channel_names: &[&str]) {
    // Poll cycle metrics
    metrics::counter!("tracker.cycles_total").absolute(0);
    metrics::counter!("tracker.cycle_failures_total").absolute(0);
    metrics::gauge!("tracker.flights_in_region").set(0.0);

    // Record metrics
    metrics::counter!("tracker.records_received_total").absolute(0);
    metrics::counter!("tracker.records_rejected_total").absolute(0);
    metrics::counter!("tracker.persist_failures_total").absolute(0);

    // Alert metrics
    metrics::counter!("alerts.dispatched_total").absolute(0);
    metrics::counter!("alerts.suppressed_total").absolute(0);
    for name in channel_names {
        metrics::counter!("alerts.delivered_total", "channel" => name.to_string()).absolute(0);
        metrics::counter!("alerts.channel_failures_total", "channel" => name.to_string())
            .absolute(0);
    }
}
