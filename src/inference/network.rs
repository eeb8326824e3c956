use crate::sources::{ProcessCensus, ProcessSnapshot};
use crate::state::DownloadStatus;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkReading {
    pub rate_kbps: f64,
    pub status: DownloadStatus,
}

impl NetworkReading {
    fn not_running() -> Self {
        Self {
            rate_kbps: 0.0,
            status: DownloadStatus::AppNotRunning,
        }
    }
}

/// Measures the receive rate of the client processes over one sampling
/// window. `known` is the cached process set; it is rediscovered when empty
/// or when none of its processes are alive anymore, and replaced with the
/// processes that survived both samples.
pub async fn estimate_rate(
    census: &mut dyn ProcessCensus,
    known: &mut Vec<u32>,
    sample_interval: Duration,
    threshold_kbps: f64,
) -> NetworkReading {
    if known.is_empty() {
        *known = census.discover();
    }
    if known.is_empty() {
        warn!("процессы Steam не найдены");
        return NetworkReading::not_running();
    }

    let mut before = census.sample(known);
    if before.is_empty() {
        debug!("кэшированные процессы завершились, повторный поиск");
        *known = census.discover();
        before = if known.is_empty() {
            Vec::new()
        } else {
            census.sample(known)
        };
    }
    if before.is_empty() {
        known.clear();
        warn!("процессы Steam не найдены");
        return NetworkReading::not_running();
    }

    tokio::time::sleep(sample_interval).await;

    let live: Vec<u32> = before.iter().map(|s| s.pid).collect();
    let after = census.sample(&live);
    let bytes = received_delta(&before, &after);
    *known = after.iter().map(|s| s.pid).collect();

    let secs = sample_interval.as_secs_f64().max(0.001);
    let rate_kbps = bytes as f64 / 1024.0 / secs;
    let status = classify(rate_kbps, threshold_kbps);
    debug!(rate_kbps, processes = known.len(), "замер сетевой активности");

    NetworkReading { rate_kbps, status }
}

pub fn classify(rate_kbps: f64, threshold_kbps: f64) -> DownloadStatus {
    if rate_kbps > threshold_kbps {
        DownloadStatus::Downloading
    } else {
        DownloadStatus::Idle
    }
}

/// Sum of per-process counter growth, over processes present in both samples.
fn received_delta(before: &[ProcessSnapshot], after: &[ProcessSnapshot]) -> u64 {
    let before: HashMap<u32, u64> = before.iter().map(|s| (s.pid, s.io_read_bytes)).collect();
    after
        .iter()
        .filter_map(|s| {
            before
                .get(&s.pid)
                .map(|prev| s.io_read_bytes.saturating_sub(*prev))
        })
        .sum()
}
