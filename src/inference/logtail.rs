//! Download state from the tail of `content_log.txt`.
//!
//! Each tail line may carry up to three independent facts: the app being
//! downloaded (`AppID <id> "<name>"` on a line that also says
//! `downloading`), a state keyword, and a transfer rate such as `1.5 MB/s`.
//! The scan walks the tail newest-first. Name and state keep being
//! overwritten while the scan goes on, while the first rate found ends the
//! scan, so in [`LogScanOrder::Compatible`] mode name and state come from the
//! oldest examined match and rate from the newest.

use crate::config::LogScanOrder;
use crate::sources::{LogTailReader, SourceError};
use crate::state::DownloadStatus;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::time::{Duration, SystemTime};

static RE_APP: Lazy<Regex> = Lazy::new(|| Regex::new(r#"AppID ([0-9]+) "(.+?)""#).unwrap());
static RE_RATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([0-9]+\.?[0-9]*)\s*(KB|MB|GB)/s").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEventKind {
    Downloading,
    Paused,
    Complete,
}

impl From<LogEventKind> for DownloadStatus {
    fn from(kind: LogEventKind) -> Self {
        match kind {
            LogEventKind::Downloading => DownloadStatus::Downloading,
            LogEventKind::Paused => DownloadStatus::Paused,
            LogEventKind::Complete => DownloadStatus::Complete,
        }
    }
}

/// Facts extracted from one log line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogEvent {
    pub app_id: Option<String>,
    pub game_name: Option<String>,
    pub kind: Option<LogEventKind>,
    pub rate_kbps: Option<f64>,
}

/// Outcome of a log consult that passed the existence and freshness checks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogReading {
    pub app_id: Option<String>,
    pub game_name: Option<String>,
    pub status: Option<DownloadStatus>,
    pub rate_kbps: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct LogInferenceParams {
    pub freshness_secs: u64,
    pub tail_lines: usize,
    pub order: LogScanOrder,
}

pub fn infer_from_log(
    reader: &dyn LogTailReader,
    path: &Path,
    now: SystemTime,
    params: LogInferenceParams,
) -> Result<Option<LogReading>, SourceError> {
    let Some(tail) = reader.read_tail(path, params.tail_lines)? else {
        return Ok(None);
    };
    // An mtime ahead of the clock counts as age zero.
    let age = now.duration_since(tail.modified).unwrap_or_default();
    if age > Duration::from_secs(params.freshness_secs) {
        return Ok(None);
    }
    if tail.lines.is_empty() {
        return Ok(None);
    }

    let start = tail.lines.len().saturating_sub(params.tail_lines);
    Ok(Some(scan_tail(&tail.lines[start..], params.order)))
}

pub fn parse_line(line: &str) -> LogEvent {
    let lower = line.to_lowercase();
    let mut event = LogEvent::default();

    if lower.contains("downloading") {
        if let Some(caps) = RE_APP.captures(line) {
            event.app_id = Some(caps[1].to_string());
            event.game_name = Some(caps[2].to_string());
        }
    }

    event.kind = if lower.contains("download complete") {
        Some(LogEventKind::Complete)
    } else if lower.contains("download paused") {
        Some(LogEventKind::Paused)
    } else if lower.contains("downloading") {
        Some(LogEventKind::Downloading)
    } else {
        None
    };

    event.rate_kbps = parse_rate_kbps(line);
    event
}

pub fn parse_rate_kbps(line: &str) -> Option<f64> {
    let caps = RE_RATE.captures(line)?;
    let value: f64 = caps[1].parse().ok()?;
    let factor = match caps[2].to_ascii_uppercase().as_str() {
        "MB" => 1024.0,
        "GB" => 1024.0 * 1024.0,
        _ => 1.0,
    };
    Some(value * factor)
}

/// Scans `lines` (oldest first, as stored in the file) from the newest line
/// backwards.
pub fn scan_tail(lines: &[String], order: LogScanOrder) -> LogReading {
    let mut reading = LogReading::default();

    for line in lines.iter().rev() {
        let event = parse_line(line);

        let overwrite = order == LogScanOrder::Compatible;
        if let Some(name) = event.game_name {
            if overwrite || reading.game_name.is_none() {
                reading.app_id = event.app_id;
                reading.game_name = Some(name);
            }
        }
        if let Some(kind) = event.kind {
            if overwrite || reading.status.is_none() {
                reading.status = Some(kind.into());
            }
        }
        if let Some(rate) = event.rate_kbps {
            reading.rate_kbps = Some(rate);
            break;
        }
    }

    reading
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::LogTail;
    use std::sync::Mutex;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|l| l.to_string()).collect()
    }

    struct StubReader {
        tail: Option<LogTail>,
        requested: Mutex<Vec<usize>>,
    }

    impl StubReader {
        fn new(tail: Option<LogTail>) -> Self {
            Self {
                tail,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    impl LogTailReader for StubReader {
        fn read_tail(&self, _path: &Path, max_lines: usize) -> Result<Option<LogTail>, SourceError> {
            self.requested.lock().unwrap().push(max_lines);
            Ok(self.tail.clone())
        }
    }

    fn params() -> LogInferenceParams {
        LogInferenceParams {
            freshness_secs: 300,
            tail_lines: 200,
            order: LogScanOrder::Compatible,
        }
    }

    #[test]
    fn unit_conversion() {
        assert_eq!(parse_rate_kbps("rate 2 MB/s"), Some(2048.0));
        assert_eq!(parse_rate_kbps("rate 1 GB/s"), Some(1_048_576.0));
        assert_eq!(parse_rate_kbps("rate 500 KB/s"), Some(500.0));
        assert_eq!(parse_rate_kbps("rate 1.5 mb/s"), Some(1536.0));
        assert_eq!(parse_rate_kbps("rate 12.25kb/s"), Some(12.25));
        assert_eq!(parse_rate_kbps("no rate here"), None);
    }

    #[test]
    fn non_ascii_digits_are_not_a_rate() {
        assert_eq!(parse_rate_kbps("rate \u{ff15} MB/s"), None);

        let tail = lines(&["rate 700 KB/s", "rate \u{ff15} MB/s"]);
        let reading = scan_tail(&tail, LogScanOrder::Compatible);
        assert_eq!(reading.rate_kbps, Some(700.0));
    }

    #[test]
    fn app_name_requires_downloading_keyword() {
        let event = parse_line(r#"AppID 440 "Team Fortress 2" state changed : Update Queued"#);
        assert!(event.game_name.is_none());

        let event = parse_line(r#"AppID 440 "Team Fortress 2" is now Downloading"#);
        assert_eq!(event.app_id.as_deref(), Some("440"));
        assert_eq!(event.game_name.as_deref(), Some("Team Fortress 2"));
        assert_eq!(event.kind, Some(LogEventKind::Downloading));
    }

    #[test]
    fn complete_takes_precedence_within_line() {
        let event = parse_line("Downloading finished, Download Complete");
        assert_eq!(event.kind, Some(LogEventKind::Complete));
        let event = parse_line("download paused while downloading");
        assert_eq!(event.kind, Some(LogEventKind::Paused));
    }

    #[test]
    fn newest_rate_wins() {
        let tail = lines(&["rate 100 KB/s", "rate 200 KB/s", "rate 300 KB/s"]);
        let reading = scan_tail(&tail, LogScanOrder::Compatible);
        assert_eq!(reading.rate_kbps, Some(300.0));
    }

    #[test]
    fn oldest_status_wins_when_no_rate_stops_scan() {
        let tail = lines(&["download paused", "noise", "download complete", "downloading"]);
        let reading = scan_tail(&tail, LogScanOrder::Compatible);
        assert_eq!(reading.status, Some(DownloadStatus::Paused));
        assert_eq!(reading.rate_kbps, None);
    }

    #[test]
    fn rate_match_stops_status_and_name_scan() {
        let tail = lines(&[
            r#"AppID 730 "Counter-Strike 2" downloading"#,
            "download paused",
            r#"AppID 440 "Team Fortress 2" downloading at 3 MB/s"#,
            "download complete",
        ]);
        let reading = scan_tail(&tail, LogScanOrder::Compatible);
        // Line with the rate is the last examined one.
        assert_eq!(reading.game_name.as_deref(), Some("Team Fortress 2"));
        assert_eq!(reading.status, Some(DownloadStatus::Downloading));
        assert_eq!(reading.rate_kbps, Some(3072.0));
    }

    #[test]
    fn oldest_name_wins_in_compatible_mode() {
        let tail = lines(&[
            r#"AppID 730 "Counter-Strike 2" downloading"#,
            r#"AppID 440 "Team Fortress 2" downloading"#,
        ]);
        let reading = scan_tail(&tail, LogScanOrder::Compatible);
        assert_eq!(reading.game_name.as_deref(), Some("Counter-Strike 2"));
    }

    #[test]
    fn newest_wins_mode_unifies_precedence() {
        let tail = lines(&[
            r#"AppID 730 "Counter-Strike 2" downloading"#,
            "download paused",
            r#"AppID 440 "Team Fortress 2" downloading"#,
            "download complete",
        ]);
        let reading = scan_tail(&tail, LogScanOrder::NewestWins);
        assert_eq!(reading.app_id.as_deref(), Some("440"));
        assert_eq!(reading.game_name.as_deref(), Some("Team Fortress 2"));
        assert_eq!(reading.status, Some(DownloadStatus::Complete));
    }

    #[test]
    fn fresh_log_without_patterns_is_still_a_signal() {
        let reader = StubReader::new(Some(LogTail {
            modified: at(1_000),
            lines: lines(&["nothing interesting"]),
        }));
        let reading = infer_from_log(&reader, Path::new("log"), at(1_100), params())
            .expect("без ошибок")
            .expect("свежий лог даёт сигнал");
        assert_eq!(reading, LogReading::default());
        assert_eq!(*reader.requested.lock().unwrap(), vec![200]);
    }

    #[test]
    fn missing_log_is_no_signal() {
        let reader = StubReader::new(None);
        let reading = infer_from_log(&reader, Path::new("log"), at(1_000), params()).expect("без ошибок");
        assert!(reading.is_none());
    }

    #[test]
    fn stale_log_is_no_signal() {
        let reader = StubReader::new(Some(LogTail {
            modified: at(1_000),
            lines: lines(&["downloading"]),
        }));
        let at_limit = infer_from_log(&reader, Path::new("log"), at(1_300), params()).expect("без ошибок");
        assert!(at_limit.is_some());
        let stale = infer_from_log(&reader, Path::new("log"), at(1_301), params()).expect("без ошибок");
        assert!(stale.is_none());
    }

    #[test]
    fn staleness_keeps_sub_second_precision() {
        let now = at(10_000);
        let reader = StubReader::new(Some(LogTail {
            modified: now - Duration::from_millis(300_500),
            lines: lines(&["downloading"]),
        }));
        let stale = infer_from_log(&reader, Path::new("log"), now, params()).expect("без ошибок");
        assert!(stale.is_none());

        let reader = StubReader::new(Some(LogTail {
            modified: now - Duration::from_millis(299_500),
            lines: lines(&["downloading"]),
        }));
        let fresh = infer_from_log(&reader, Path::new("log"), now, params()).expect("без ошибок");
        assert!(fresh.is_some());
    }

    #[test]
    fn mtime_in_the_future_is_fresh() {
        let reader = StubReader::new(Some(LogTail {
            modified: at(2_000),
            lines: lines(&["downloading"]),
        }));
        let reading = infer_from_log(&reader, Path::new("log"), at(1_000), params()).expect("без ошибок");
        assert!(reading.is_some());
    }

    #[test]
    fn file_just_past_freshness_limit_is_stale() {
        use crate::sources::logfile::FsLogTailReader;
        use std::fs::File;
        use std::io::Write;

        let dir = tempfile::tempdir().expect("временный каталог");
        let path = dir.path().join("content_log.txt");
        let mut file = File::create(&path).expect("создание файла");
        writeln!(file, r#"AppID 440 "Team Fortress 2" downloading"#).expect("запись");

        let now = SystemTime::now();
        file.set_modified(now - Duration::from_millis(300_500))
            .expect("установка mtime");
        drop(file);

        let reading = infer_from_log(&FsLogTailReader, &path, now, params()).expect("без ошибок");
        assert!(reading.is_none());
    }

    #[test]
    fn empty_tail_is_no_signal() {
        let reader = StubReader::new(Some(LogTail {
            modified: at(1_000),
            lines: Vec::new(),
        }));
        let reading = infer_from_log(&reader, Path::new("log"), at(1_000), params()).expect("без ошибок");
        assert!(reading.is_none());
    }

    #[test]
    fn window_is_bounded_even_if_reader_returns_more() {
        let mut raw = vec!["rate 999 KB/s".to_string()];
        raw.extend((0..200).map(|i| format!("noise {i}")));
        let reader = StubReader::new(Some(LogTail {
            modified: at(1_000),
            lines: raw,
        }));
        let reading = infer_from_log(&reader, Path::new("log"), at(1_000), params())
            .expect("без ошибок")
            .expect("сигнал");
        assert_eq!(reading.rate_kbps, None);
    }
}
