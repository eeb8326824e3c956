pub mod downloads;
pub mod logfile;
pub mod process;

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("ошибка ввода-вывода для {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SourceError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Cumulative I/O counter of one client process.
///
/// `io_read_bytes` is sysinfo's per-process read total. On Windows it is the
/// read transfer count, which includes socket receives. On Linux it is
/// `/proc/<pid>/io` `read_bytes`, storage reads only, so a download shows up
/// only while the client reads back what it wrote (verification, patching).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub io_read_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTail {
    pub modified: SystemTime,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubdirEntry {
    pub name: String,
    pub modified: SystemTime,
}

pub trait ProcessCensus: Send {
    /// Pids of every live process that belongs to the client.
    fn discover(&mut self) -> Vec<u32>;

    /// Current counters for `pids`. Processes that exited or can no longer be
    /// read are left out.
    fn sample(&mut self, pids: &[u32]) -> Vec<ProcessSnapshot>;
}

pub trait LogTailReader: Send + Sync {
    /// `Ok(None)` when the file does not exist.
    fn read_tail(&self, path: &Path, max_lines: usize) -> Result<Option<LogTail>, SourceError>;
}

pub trait DirectoryScanner: Send + Sync {
    /// `Ok(None)` when `dir` does not exist.
    fn list_subdirs(&self, dir: &Path) -> Result<Option<Vec<SubdirEntry>>, SourceError>;

    /// `Ok(None)` when the manifest does not exist.
    fn read_manifest(&self, path: &Path) -> Result<Option<String>, SourceError>;
}

pub fn system_time_to_unix(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(err) => -(err.duration().as_secs() as i64),
    }
}

/// Lossy UTF-8 decoding that drops invalid sequences instead of replacing them.
pub(crate) fn decode_lossy(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => String::from_utf8_lossy(bytes)
            .chars()
            .filter(|c| *c != char::REPLACEMENT_CHARACTER)
            .collect(),
    }
}
