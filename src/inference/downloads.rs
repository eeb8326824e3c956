use crate::sources::{DirectoryScanner, SourceError, SubdirEntry};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static RE_LEADING_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]+)").unwrap());
static RE_MANIFEST_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r#""name"\s+"(.+?)""#).unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestMatch {
    pub app_id: String,
    pub game_name: String,
}

pub fn downloading_dir(root: &Path) -> PathBuf {
    root.join("steamapps").join("downloading")
}

pub fn manifest_path(root: &Path, app_id: &str) -> PathBuf {
    root.join("steamapps")
        .join(format!("appmanifest_{app_id}.acf"))
}

/// Resolves the game behind the most recently touched in-progress download.
pub fn infer_from_download_folder(
    scanner: &dyn DirectoryScanner,
    root: &Path,
) -> Result<Option<ManifestMatch>, SourceError> {
    let Some(subdirs) = scanner.list_subdirs(&downloading_dir(root))? else {
        return Ok(None);
    };
    let Some(latest) = latest_subdir(&subdirs) else {
        return Ok(None);
    };
    let Some(app_id) = leading_app_id(&latest.name) else {
        return Ok(None);
    };
    let Some(manifest) = scanner.read_manifest(&manifest_path(root, app_id))? else {
        return Ok(None);
    };

    Ok(manifest_game_name(&manifest).map(|game_name| ManifestMatch {
        app_id: app_id.to_string(),
        game_name: game_name.to_string(),
    }))
}

/// Newest entry; on equal timestamps the first one listed is kept.
fn latest_subdir(subdirs: &[SubdirEntry]) -> Option<&SubdirEntry> {
    subdirs.iter().fold(None, |best: Option<&SubdirEntry>, entry| match best {
        Some(b) if b.modified >= entry.modified => Some(b),
        _ => Some(entry),
    })
}

fn leading_app_id(dir_name: &str) -> Option<&str> {
    RE_LEADING_ID
        .captures(dir_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn manifest_game_name(manifest: &str) -> Option<&str> {
    RE_MANIFEST_NAME
        .captures(manifest)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
