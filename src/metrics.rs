use crate::reconciler::{SignalSource, TickOutcome};
use crate::state::{DownloadStatus, StatusRecord};
use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Gauge, GaugeVec, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub dl_rate_kbps: Gauge,
    pub dl_status: GaugeVec,
    pub dl_last_reconcile_timestamp_seconds: Gauge,
    pub dl_ticks_total: CounterVec,
    pub dl_source_errors_total: CounterVec,
    pub dl_tick_panics_total: Counter,
    pub dl_scrape_count_total: Counter,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let dl_rate_kbps = Gauge::with_opts(opts!(
            "dl_rate_kbps",
            "Current download rate of the client in KB/s"
        ))?;
        let dl_status = GaugeVec::new(
            opts!(
                "dl_status",
                "Current download status, 1 for the active status and 0 otherwise"
            ),
            &["status"],
        )?;
        let dl_last_reconcile_timestamp_seconds = Gauge::with_opts(opts!(
            "dl_last_reconcile_timestamp_seconds",
            "Unix timestamp of the last reconciliation tick"
        ))?;
        let dl_ticks_total = CounterVec::new(
            opts!(
                "dl_ticks_total",
                "Reconciliation ticks by the signal source that decided them"
            ),
            &["source"],
        )?;
        let dl_source_errors_total = CounterVec::new(
            opts!(
                "dl_source_errors_total",
                "Unexpected signal source failures that were skipped"
            ),
            &["source"],
        )?;
        let dl_tick_panics_total = Counter::with_opts(opts!(
            "dl_tick_panics_total",
            "Reconciliation ticks that panicked and were dropped"
        ))?;
        let dl_scrape_count_total = Counter::with_opts(opts!(
            "dl_scrape_count_total",
            "Number of /metrics scrapes"
        ))?;

        register(&registry, &dl_rate_kbps)?;
        register(&registry, &dl_status)?;
        register(&registry, &dl_last_reconcile_timestamp_seconds)?;
        register(&registry, &dl_ticks_total)?;
        register(&registry, &dl_source_errors_total)?;
        register(&registry, &dl_tick_panics_total)?;
        register(&registry, &dl_scrape_count_total)?;

        for source in SignalSource::ALL {
            dl_ticks_total.with_label_values(&[source.as_str()]);
            dl_source_errors_total.with_label_values(&[source.as_str()]);
        }

        let metrics = Self {
            registry,
            dl_rate_kbps,
            dl_status,
            dl_last_reconcile_timestamp_seconds,
            dl_ticks_total,
            dl_source_errors_total,
            dl_tick_panics_total,
            dl_scrape_count_total,
        };
        metrics.update_from_record(&StatusRecord::default());
        Ok(Arc::new(metrics))
    }

    pub fn update_from_record(&self, record: &StatusRecord) {
        self.dl_rate_kbps.set(record.rate_kbps);
        self.dl_last_reconcile_timestamp_seconds
            .set(record.observed_at_unix as f64);
        for status in DownloadStatus::ALL {
            self.dl_status
                .with_label_values(&[status.as_str()])
                .set(if status == record.status { 1.0 } else { 0.0 });
        }
    }

    pub fn observe_tick(&self, outcome: &TickOutcome) {
        self.dl_ticks_total
            .with_label_values(&[outcome.source.as_str()])
            .inc();
        for source in &outcome.failed {
            self.dl_source_errors_total
                .with_label_values(&[source.as_str()])
                .inc();
        }
        self.update_from_record(&outcome.record);
    }

    pub fn inc_tick_panic(&self) {
        self.dl_tick_panics_total.inc();
    }

    pub fn inc_scrape_count(&self) {
        self.dl_scrape_count_total.inc();
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(metrics: &Metrics) -> String {
        String::from_utf8(metrics.encode_metrics().expect("кодирование метрик")).unwrap()
    }

    #[test]
    fn status_gauge_is_one_hot() {
        let metrics = Metrics::new().expect("инициализация метрик");
        let record = StatusRecord {
            game_name: "Portal 2".to_string(),
            status: DownloadStatus::Paused,
            rate_kbps: 12.0,
            observed_at_unix: 100,
        };
        metrics.update_from_record(&record);

        let text = encoded(&metrics);
        assert!(text.contains("dl_status{status=\"paused\"} 1"));
        assert!(text.contains("dl_status{status=\"downloading\"} 0"));
        assert!(text.contains("dl_rate_kbps 12"));
        assert!(text.contains("dl_last_reconcile_timestamp_seconds 100"));
    }

    #[test]
    fn tick_counts_source_and_failures() {
        let metrics = Metrics::new().expect("инициализация метрик");
        let outcome = TickOutcome {
            source: SignalSource::DownloadFolder,
            failed: vec![SignalSource::Log],
            record: StatusRecord::default(),
        };
        metrics.observe_tick(&outcome);
        metrics.observe_tick(&outcome);

        let text = encoded(&metrics);
        assert!(text.contains("dl_ticks_total{source=\"download_folder\"} 2"));
        assert!(text.contains("dl_ticks_total{source=\"network\"} 0"));
        assert!(text.contains("dl_source_errors_total{source=\"log\"} 2"));
        assert!(text.contains("dl_tick_panics_total 0"));
    }
}
