use crate::state::{DownloadStatus, StatusRecord};
use std::time::SystemTime;

const SEPARATOR_WIDTH: usize = 40;

pub fn status_label(status: DownloadStatus) -> &'static str {
    match status {
        DownloadStatus::Unknown => "Неизвестно",
        DownloadStatus::Downloading => "Загрузка",
        DownloadStatus::Paused => "Пауза",
        DownloadStatus::Complete => "Завершено",
        DownloadStatus::Idle => "Простой или Пауза",
        DownloadStatus::AppNotRunning => "Steam не запущен",
    }
}

pub fn game_label(record: &StatusRecord) -> &str {
    if record.has_known_game() {
        &record.game_name
    } else {
        "Неизвестно"
    }
}

pub fn render_report(record: &StatusRecord, at: SystemTime) -> String {
    format!(
        "\nВремя: {}\nИгра: {}\nСтатус: {}\nСкорость загрузки: {:.2} KB/s\n{}",
        humantime::format_rfc3339_seconds(at),
        game_label(record),
        status_label(record.status),
        record.rate_kbps,
        "-".repeat(SEPARATOR_WIDTH)
    )
}

pub fn banner(root: &str, session_secs: Option<u64>, report_secs: u64) -> String {
    let session = match session_secs {
        Some(secs) => format!("Мониторинг в течение {secs} с, вывод статистики каждые {report_secs} с."),
        None => format!("Мониторинг до Ctrl+C, вывод статистики каждые {report_secs} с."),
    };
    format!(
        "Мониторинг загрузок Steam\n{}\nПуть к Steam: {root}\n{session}\n{}",
        "=".repeat(SEPARATOR_WIDTH),
        "-".repeat(SEPARATOR_WIDTH)
    )
}
