use crate::config::Config;
use crate::inference::downloads::infer_from_download_folder;
use crate::inference::logtail::{infer_from_log, LogInferenceParams, LogReading};
use crate::inference::network::estimate_rate;
use crate::sources::downloads::FsDirectoryScanner;
use crate::sources::logfile::FsLogTailReader;
use crate::sources::process::SysinfoCensus;
use crate::sources::{system_time_to_unix, DirectoryScanner, LogTailReader, ProcessCensus};
use crate::state::StatusRecord;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalSource {
    Log,
    DownloadFolder,
    Network,
}

impl SignalSource {
    pub const ALL: [SignalSource; 3] = [
        SignalSource::Log,
        SignalSource::DownloadFolder,
        SignalSource::Network,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SignalSource::Log => "log",
            SignalSource::DownloadFolder => "download_folder",
            SignalSource::Network => "network",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// Source that decided this tick.
    pub source: SignalSource,
    /// Sources that failed unexpectedly and were skipped.
    pub failed: Vec<SignalSource>,
    pub record: StatusRecord,
}

/// Runs the signal sources in precedence order (log tail, download folder,
/// network sampling) and folds the first one that answers into the owned
/// [`StatusRecord`]. Only one reconciler should write a given record.
pub struct Reconciler {
    root: PathBuf,
    log_path: PathBuf,
    log_params: LogInferenceParams,
    sample_interval: Duration,
    threshold_kbps: f64,
    census: Box<dyn ProcessCensus>,
    log_reader: Box<dyn LogTailReader>,
    scanner: Box<dyn DirectoryScanner>,
    record: StatusRecord,
    known_pids: Vec<u32>,
}

impl Reconciler {
    pub fn new(
        root: &Path,
        cfg: &Config,
        census: Box<dyn ProcessCensus>,
        log_reader: Box<dyn LogTailReader>,
        scanner: Box<dyn DirectoryScanner>,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            log_path: content_log_path(root),
            log_params: LogInferenceParams {
                freshness_secs: cfg.log_freshness_secs,
                tail_lines: cfg.log_tail_lines,
                order: cfg.log_scan_order,
            },
            sample_interval: cfg.sample_interval(),
            threshold_kbps: cfg.rate_threshold_kbps,
            census,
            log_reader,
            scanner,
            record: StatusRecord::default(),
            known_pids: Vec::new(),
        }
    }

    pub fn from_config(root: &Path, cfg: &Config) -> Self {
        Self::new(
            root,
            cfg,
            Box::new(SysinfoCensus::new(&cfg.process_markers)),
            Box::new(FsLogTailReader),
            Box::new(FsDirectoryScanner),
        )
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub async fn reconcile(&mut self, now: SystemTime) -> TickOutcome {
        let mut failed = Vec::new();
        self.record.observed_at_unix = system_time_to_unix(now);

        match infer_from_log(
            self.log_reader.as_ref(),
            &self.log_path,
            now,
            self.log_params,
        ) {
            Ok(Some(reading)) => {
                self.apply_log(reading);
                return self.outcome(SignalSource::Log, failed);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, path = %self.log_path.display(), "ошибка при разборе лог-файла");
                failed.push(SignalSource::Log);
            }
        }

        match infer_from_download_folder(self.scanner.as_ref(), &self.root) {
            Ok(Some(found)) => {
                debug!(app_id = %found.app_id, game = %found.game_name, "игра определена по папке загрузок");
                self.record.set_game_name(&found.game_name);
                return self.outcome(SignalSource::DownloadFolder, failed);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "ошибка при проверке папки загрузок");
                failed.push(SignalSource::DownloadFolder);
            }
        }

        let reading = estimate_rate(
            self.census.as_mut(),
            &mut self.known_pids,
            self.sample_interval,
            self.threshold_kbps,
        )
        .await;
        self.record.set_rate_kbps(reading.rate_kbps);
        self.record.status = reading.status;
        self.outcome(SignalSource::Network, failed)
    }

    fn apply_log(&mut self, reading: LogReading) {
        if let Some(name) = reading.game_name {
            debug!(app_id = ?reading.app_id, game = %name, "игра определена по логу");
            self.record.set_game_name(&name);
        }
        if let Some(status) = reading.status {
            self.record.status = status;
        }
        if let Some(rate) = reading.rate_kbps {
            self.record.set_rate_kbps(rate);
        }
    }

    fn outcome(&self, source: SignalSource, failed: Vec<SignalSource>) -> TickOutcome {
        TickOutcome {
            source,
            failed,
            record: self.record.clone(),
        }
    }
}

pub fn content_log_path(root: &Path) -> PathBuf {
    root.join("logs").join("content_log.txt")
}
