use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub steam_path: Option<String>,
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
    #[serde(default = "default_session_duration_secs")]
    pub session_duration_secs: u64,
    #[serde(default = "default_log_freshness_secs")]
    pub log_freshness_secs: u64,
    #[serde(default = "default_log_tail_lines")]
    pub log_tail_lines: usize,
    #[serde(default = "default_rate_threshold_kbps")]
    pub rate_threshold_kbps: f64,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    #[serde(default = "default_process_markers")]
    pub process_markers: Vec<String>,
    #[serde(default)]
    pub log_scan_order: LogScanOrder,
    #[serde(default)]
    pub listen: Option<String>,
}

/// How the log tail scan picks between several matching lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogScanOrder {
    /// Name and status come from the oldest examined match, rate from the newest.
    #[default]
    Compatible,
    /// Every field comes from the most recent matching line.
    NewestWins,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            steam_path: None,
            reconcile_interval_secs: default_reconcile_interval_secs(),
            report_interval_secs: default_report_interval_secs(),
            session_duration_secs: default_session_duration_secs(),
            log_freshness_secs: default_log_freshness_secs(),
            log_tail_lines: default_log_tail_lines(),
            rate_threshold_kbps: default_rate_threshold_kbps(),
            sample_interval_ms: default_sample_interval_ms(),
            process_markers: default_process_markers(),
            log_scan_order: LogScanOrder::default(),
            listen: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("не удалось прочитать файл конфигурации {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось разобрать YAML в {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("ошибка валидации конфигурации: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        Self::from_yaml(&text, &path_display)
    }

    pub fn from_yaml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconcile_interval_secs < 1 {
            return Err(ConfigError::Validation(
                "reconcile_interval_secs должно быть >= 1".to_string(),
            ));
        }
        if self.report_interval_secs < 1 {
            return Err(ConfigError::Validation(
                "report_interval_secs должно быть >= 1".to_string(),
            ));
        }
        if self.log_freshness_secs < 1 {
            return Err(ConfigError::Validation(
                "log_freshness_secs должно быть >= 1".to_string(),
            ));
        }
        if self.log_tail_lines < 1 {
            return Err(ConfigError::Validation(
                "log_tail_lines должно быть >= 1".to_string(),
            ));
        }
        if !self.rate_threshold_kbps.is_finite() || self.rate_threshold_kbps < 0.0 {
            return Err(ConfigError::Validation(
                "rate_threshold_kbps должно быть >= 0".to_string(),
            ));
        }
        if self.sample_interval_ms < 1 {
            return Err(ConfigError::Validation(
                "sample_interval_ms должно быть >= 1".to_string(),
            ));
        }
        if self.process_markers.iter().all(|m| m.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "process_markers должен содержать хотя бы один непустой маркер".to_string(),
            ));
        }
        if let Some(listen) = &self.listen {
            if SocketAddr::from_str(listen).is_err() {
                return Err(ConfigError::Validation(
                    "поле listen должно быть корректным адресом host:port".to_string(),
                ));
            }
        }
        if let Some(path) = &self.steam_path {
            if path.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "steam_path не должен быть пустой строкой".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn session_duration(&self) -> Option<Duration> {
        if self.session_duration_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.session_duration_secs))
        }
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

const fn default_reconcile_interval_secs() -> u64 {
    5
}

const fn default_report_interval_secs() -> u64 {
    60
}

const fn default_session_duration_secs() -> u64 {
    300
}

const fn default_log_freshness_secs() -> u64 {
    300
}

const fn default_log_tail_lines() -> usize {
    200
}

const fn default_rate_threshold_kbps() -> f64 {
    10.0
}

const fn default_sample_interval_ms() -> u64 {
    1000
}

fn default_process_markers() -> Vec<String> {
    vec!["steam".to_string()]
}
