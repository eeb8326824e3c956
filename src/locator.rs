use std::path::{Path, PathBuf};
#[cfg(target_os = "windows")]
use std::process::Command;
use tracing::{info, warn};

pub const STEAM_PATH_ENV: &str = "STEAM_PATH";

/// Finds the Steam installation root. Never fails: when nothing is found the
/// platform default is returned and the sources simply yield no signal.
pub fn locate_install_root(configured: Option<&str>) -> PathBuf {
    let env_value = std::env::var(STEAM_PATH_ENV).ok();
    locate_with(
        configured,
        env_value.as_deref(),
        registry_steam_path(),
        &well_known_paths(),
        default_path(),
    )
}

fn locate_with(
    configured: Option<&str>,
    env_value: Option<&str>,
    registry: Option<String>,
    candidates: &[PathBuf],
    default: PathBuf,
) -> PathBuf {
    if let Some(path) = non_blank(configured) {
        info!(path = %path, "путь Steam задан в конфигурации");
        return PathBuf::from(path);
    }
    if let Some(path) = non_blank(env_value) {
        info!(path = %path, env = STEAM_PATH_ENV, "путь Steam задан переменной окружения");
        return PathBuf::from(path);
    }
    if let Some(path) = non_blank(registry.as_deref()) {
        info!(path = %path, "найден путь Steam в реестре");
        return PathBuf::from(path);
    }
    if let Some(path) = candidates.iter().find(|p| p.exists()) {
        info!(path = %path.display(), "найден Steam в стандартном расположении");
        return path.clone();
    }
    warn!(path = %default.display(), "используется путь Steam по умолчанию");
    default
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn well_known_paths() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if cfg!(target_os = "windows") {
        out.push(PathBuf::from(r"C:\Program Files (x86)\Steam"));
        out.push(PathBuf::from(r"C:\Program Files\Steam"));
    }
    if let Some(home) = dirs::home_dir() {
        out.push(home.join(".steam").join("steam"));
        out.push(home.join(".local").join("share").join("Steam"));
        out.push(
            home.join("Library")
                .join("Application Support")
                .join("Steam"),
        );
    }
    out
}

fn default_path() -> PathBuf {
    if cfg!(target_os = "windows") {
        return PathBuf::from(r"C:\Program Files (x86)\Steam");
    }
    dirs::home_dir()
        .map(|home| home.join(".steam").join("steam"))
        .unwrap_or_else(|| Path::new(".steam").join("steam"))
}

#[cfg(target_os = "windows")]
fn registry_steam_path() -> Option<String> {
    let output = Command::new("reg")
        .args(["query", r"HKCU\Software\Valve\Steam", "/v", "SteamPath"])
        .output();
    match output {
        Ok(output) if output.status.success() => {
            parse_reg_query_output(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            warn!(code = ?output.status.code(), "ошибка получения пути Steam из реестра");
            None
        }
        Err(err) => {
            warn!(error = %err, "ошибка получения пути Steam из реестра");
            None
        }
    }
}

#[cfg(not(target_os = "windows"))]
fn registry_steam_path() -> Option<String> {
    None
}

/// Extracts the value from `reg query ... /v SteamPath` output.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn parse_reg_query_output(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.starts_with("SteamPath"))
        .find_map(|line| {
            let (_, value) = line.split_once("REG_SZ")?;
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        })
}
