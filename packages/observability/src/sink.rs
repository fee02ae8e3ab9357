//! Append-only log file sink.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// `~/.rpcd/logs/dev.jsonl`, if a home directory exists.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".rpcd").join("logs").join("dev.jsonl"))
}

/// Shared handle to an append-mode log file.
///
/// Every write is flushed immediately so lines from concurrent processes
/// do not interleave mid-line.
#[derive(Clone)]
pub struct LogFileWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl LogFileWriter {
    /// Open `path` for appending, creating parent directories.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let written = guard.write(buf)?;
        guard.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for LogFileWriter {
    type Writer = LogFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_writer_creates_nested_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deeply").join("nested").join("test.jsonl");

        let mut writer = LogFileWriter::open(&path).unwrap();
        writer.write_all(b"test line\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "test line\n");
    }

    #[test]
    fn test_writer_appends_across_handles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.jsonl");

        LogFileWriter::open(&path)
            .unwrap()
            .write_all(b"first\n")
            .unwrap();
        LogFileWriter::open(&path)
            .unwrap()
            .write_all(b"second\n")
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_default_log_path_is_under_rpcd() {
        if let Some(path) = default_log_path() {
            assert!(path.ends_with(".rpcd/logs/dev.jsonl"));
        }
    }
}
