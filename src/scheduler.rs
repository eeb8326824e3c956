use crate::metrics::Metrics;
use crate::reconciler::{Reconciler, TickOutcome};
use crate::report::render_report;
use crate::state::StatusRecord;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Sole writer of the shared record. Each tick replaces the whole record
/// under one write lock, so readers never see a partial update. A stop
/// request is honoured between ticks, never in the middle of one.
///
/// Every tick runs as its own task: a panic inside a source drops that tick
/// only and the loop waits for the next interval.
pub async fn run_reconcile_loop(
    reconciler: Reconciler,
    shared: Arc<RwLock<StatusRecord>>,
    metrics: Arc<Metrics>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let reconciler = Arc::new(Mutex::new(reconciler));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                info!("получен сигнал остановки цикла мониторинга");
                break;
            }
            _ = ticker.tick() => {
                let outcome = match tokio::spawn(reconcile_tick(reconciler.clone())).await {
                    Ok(outcome) => outcome,
                    Err(err) if err.is_panic() => {
                        error!(error = %err, "паника во время сверки, такт пропущен");
                        metrics.inc_tick_panic();
                        continue;
                    }
                    Err(err) => {
                        error!(error = %err, "задача сверки прервана");
                        continue;
                    }
                };
                for source in &outcome.failed {
                    warn!(source = source.as_str(), "источник пропущен из-за ошибки");
                }
                debug!(
                    source = outcome.source.as_str(),
                    game = %outcome.record.game_name,
                    status = outcome.record.status.as_str(),
                    rate_kbps = outcome.record.rate_kbps,
                    "сверка завершена"
                );
                metrics.observe_tick(&outcome);
                *shared.write().await = outcome.record;
            }
        }
    }
}

async fn reconcile_tick(reconciler: Arc<Mutex<Reconciler>>) -> TickOutcome {
    // tokio's Mutex is not poisoned by a panicking holder.
    let mut reconciler = reconciler.lock().await;
    reconciler.reconcile(SystemTime::now()).await
}

/// Prints the shared record at a fixed cadence, first report immediately.
pub async fn run_report_loop<W: Write>(
    shared: Arc<RwLock<StatusRecord>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut out: W,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let record = shared.read().await.clone();
                let text = render_report(&record, SystemTime::now());
                if let Err(err) = writeln!(out, "{text}").and_then(|_| out.flush()) {
                    error!(error = %err, "не удалось вывести отчёт");
                }
            }
        }
    }
}

/// Resolves when the monitoring session is over: after `duration`, or on
/// Ctrl+C when no duration is set or it comes first.
pub async fn wait_for_session_end(duration: Option<Duration>) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "не удалось дождаться Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    match duration {
        Some(duration) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => info!("сеанс мониторинга завершён по времени"),
                _ = ctrl_c => info!("получен Ctrl+C, выполняется остановка"),
            }
        }
        None => {
            ctrl_c.await;
            info!("получен Ctrl+C, выполняется остановка");
        }
    }
}
