use serde::Serialize;

pub const UNKNOWN_GAME: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Unknown,
    Downloading,
    Paused,
    Complete,
    Idle,
    AppNotRunning,
}

impl DownloadStatus {
    pub const ALL: [DownloadStatus; 6] = [
        DownloadStatus::Unknown,
        DownloadStatus::Downloading,
        DownloadStatus::Paused,
        DownloadStatus::Complete,
        DownloadStatus::Idle,
        DownloadStatus::AppNotRunning,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DownloadStatus::Unknown => "unknown",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Paused => "paused",
            DownloadStatus::Complete => "complete",
            DownloadStatus::Idle => "idle",
            DownloadStatus::AppNotRunning => "app_not_running",
        }
    }
}

/// Current download activity as last reconciled.
///
/// `game_name` and `rate_kbps` are sticky: a tick that yields no new value
/// for a field leaves it untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    pub game_name: String,
    pub status: DownloadStatus,
    pub rate_kbps: f64,
    pub observed_at_unix: i64,
}

impl Default for StatusRecord {
    fn default() -> Self {
        Self {
            game_name: UNKNOWN_GAME.to_string(),
            status: DownloadStatus::Unknown,
            rate_kbps: 0.0,
            observed_at_unix: 0,
        }
    }
}

impl StatusRecord {
    pub fn has_known_game(&self) -> bool {
        self.game_name != UNKNOWN_GAME
    }

    pub fn set_game_name(&mut self, name: &str) {
        if !name.is_empty() {
            self.game_name = name.to_string();
        }
    }

    pub fn set_rate_kbps(&mut self, rate_kbps: f64) {
        self.rate_kbps = if rate_kbps.is_finite() {
            rate_kbps.max(0.0)
        } else {
            0.0
        };
    }
}
