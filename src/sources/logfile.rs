use super::{decode_lossy, LogTail, LogTailReader, SourceError};
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

const CHUNK_BYTES: u64 = 64 * 1024;

/// Reads the log tail straight from disk, walking backwards from the end of
/// the file so that large logs are never read in full.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLogTailReader;

impl LogTailReader for FsLogTailReader {
    fn read_tail(&self, path: &Path, max_lines: usize) -> Result<Option<LogTail>, SourceError> {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(SourceError::io(path, err)),
        };
        if !meta.is_file() {
            return Ok(None);
        }
        let modified = meta.modified().map_err(|err| SourceError::io(path, err))?;

        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(SourceError::io(path, err)),
        };
        let (bytes, truncated) =
            read_tail_bytes(&mut file, meta.len(), max_lines).map_err(|err| SourceError::io(path, err))?;

        Ok(Some(LogTail {
            modified,
            lines: split_tail(&bytes, truncated, max_lines),
        }))
    }
}

/// Returns the trailing bytes holding at least `max_lines` full lines and
/// whether the read stopped before the start of the file.
fn read_tail_bytes<R: Read + Seek>(
    reader: &mut R,
    len: u64,
    max_lines: usize,
) -> std::io::Result<(Vec<u8>, bool)> {
    let mut chunks: Vec<Vec<u8>> = Vec::new();
    let mut newlines = 0_usize;
    let mut pos = len;

    while pos > 0 && newlines <= max_lines {
        let size = CHUNK_BYTES.min(pos);
        pos -= size;
        reader.seek(SeekFrom::Start(pos))?;
        let mut chunk = vec![0_u8; size as usize];
        reader.read_exact(&mut chunk)?;
        newlines += chunk.iter().filter(|b| **b == b'\n').count();
        chunks.push(chunk);
    }

    let mut out = Vec::with_capacity(chunks.iter().map(Vec::len).sum());
    for chunk in chunks.into_iter().rev() {
        out.extend_from_slice(&chunk);
    }
    Ok((out, pos > 0))
}

fn split_tail(bytes: &[u8], truncated: bool, max_lines: usize) -> Vec<String> {
    let text = decode_lossy(bytes);
    let mut lines: Vec<&str> = text.lines().collect();
    // First line is partial when the read started mid-file.
    if truncated && !lines.is_empty() {
        lines.remove(0);
    }
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].iter().map(|l| l.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn missing_file_is_no_signal() {
        let dir = tempfile::tempdir().expect("временный каталог");
        let tail = FsLogTailReader
            .read_tail(&dir.path().join("content_log.txt"), 200)
            .expect("чтение не должно падать");
        assert!(tail.is_none());
    }

    #[test]
    fn directory_is_not_a_log() {
        let dir = tempfile::tempdir().expect("временный каталог");
        let tail = FsLogTailReader
            .read_tail(dir.path(), 200)
            .expect("чтение не должно падать");
        assert!(tail.is_none());
    }

    #[test]
    fn keeps_only_last_lines() {
        let dir = tempfile::tempdir().expect("временный каталог");
        let path = dir.path().join("content_log.txt");
        let mut file = File::create(&path).expect("создание файла");
        for i in 0..500 {
            writeln!(file, "line {i}").expect("запись");
        }
        drop(file);

        let tail = FsLogTailReader
            .read_tail(&path, 200)
            .expect("чтение")
            .expect("файл существует");
        assert_eq!(tail.lines.len(), 200);
        assert_eq!(tail.lines.first().map(String::as_str), Some("line 300"));
        assert_eq!(tail.lines.last().map(String::as_str), Some("line 499"));
        assert!(tail.modified > std::time::UNIX_EPOCH);
    }

    #[test]
    fn empty_file_has_empty_tail() {
        let dir = tempfile::tempdir().expect("временный каталог");
        let path = dir.path().join("content_log.txt");
        File::create(&path).expect("создание файла");

        let tail = FsLogTailReader
            .read_tail(&path, 200)
            .expect("чтение")
            .expect("файл существует");
        assert!(tail.lines.is_empty());
    }

    #[test]
    fn backward_read_spans_multiple_chunks() {
        let long_line = "x".repeat(50_000);
        let mut data = String::new();
        for i in 0..6 {
            data.push_str(&format!("{i} {long_line}\n"));
        }
        let len = data.len() as u64;
        let mut cursor = Cursor::new(data.into_bytes());

        let (bytes, truncated) = read_tail_bytes(&mut cursor, len, 3).expect("чтение");
        assert!(truncated);
        let lines = split_tail(&bytes, truncated, 3);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("3 "));
        assert!(lines[2].starts_with("5 "));
    }

    #[test]
    fn invalid_utf8_is_dropped_not_fatal() {
        let dir = tempfile::tempdir().expect("временный каталог");
        let path = dir.path().join("content_log.txt");
        fs::write(&path, b"AppID 440 \"Team\xff Fortress 2\" downloading\n").expect("запись");

        let tail = FsLogTailReader
            .read_tail(&path, 200)
            .expect("чтение")
            .expect("файл существует");
        assert_eq!(tail.lines, vec!["AppID 440 \"Team Fortress 2\" downloading".to_string()]);
    }
}
