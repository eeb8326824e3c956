use super::{decode_lossy, DirectoryScanner, SourceError, SubdirEntry};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
pub struct FsDirectoryScanner;

impl DirectoryScanner for FsDirectoryScanner {
    fn list_subdirs(&self, dir: &Path) -> Result<Option<Vec<SubdirEntry>>, SourceError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(SourceError::io(dir, err)),
        };

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| SourceError::io(dir, err))?;
            let path = entry.path();
            // Entries may vanish while the client moves finished depots around.
            let meta = match fs::metadata(&path) {
                Ok(meta) => meta,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "пропуск записи каталога загрузок");
                    continue;
                }
            };
            if !meta.is_dir() {
                continue;
            }
            let modified = meta.modified().map_err(|err| SourceError::io(&path, err))?;
            out.push(SubdirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                modified,
            });
        }
        Ok(Some(out))
    }

    fn read_manifest(&self, path: &Path) -> Result<Option<String>, SourceError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(decode_lossy(&bytes))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(SourceError::io(path, err)),
        }
    }
}
