//! Audit trail writer.
//!
//! Entries are serialized on the request path and handed to a single writer
//! task over a channel, so request handling never waits on disk. The writer
//! appends JSON lines, syncs after each entry and, when `audit.max_file_bytes`
//! is set, rotates the file to `<path>.1` before it would grow past the limit.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::AuditConfig;
use crate::error::GateResult;

use super::entry::AuditEntry;

enum WriterMessage {
    Line { request_id: String, line: String },
    Flush(oneshot::Sender<()>),
}

/// Handle to the audit writer task.
pub struct AuditLogger {
    sender: mpsc::UnboundedSender<WriterMessage>,
    path: PathBuf,
}

impl AuditLogger {
    /// Open the audit log described by `config` and start its writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: &AuditConfig) -> GateResult<Self> {
        Self::with_limit(&config.log_path, config.max_file_bytes)
    }

    /// Open `path` for appending; `max_file_bytes == 0` disables rotation.
    pub fn with_limit(path: &Path, max_file_bytes: u64) -> GateResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!(path = %parent.display(), "Creating audit log directory");
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let written = file.metadata()?.len();

        let (sender, receiver) = mpsc::unbounded_channel();
        let writer = AuditWriter {
            file: File::from_std(file),
            path: path.to_path_buf(),
            max_file_bytes,
            written,
        };
        tokio::spawn(writer.run(receiver));

        debug!(path = %path.display(), max_file_bytes, "Audit logger initialized");

        Ok(Self {
            sender,
            path: path.to_path_buf(),
        })
    }

    /// Queue one entry for the writer task.
    pub fn log(&self, entry: &AuditEntry) -> GateResult<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        self.sender
            .send(WriterMessage::Line {
                request_id: entry.request_id.to_string(),
                line,
            })
            .map_err(|_| writer_stopped())?;
        Ok(())
    }

    /// Wait until every entry queued before this call is on disk.
    pub async fn flush(&self) -> GateResult<()> {
        let (done, wait) = oneshot::channel();
        self.sender
            .send(WriterMessage::Flush(done))
            .map_err(|_| writer_stopped())?;
        wait.await.map_err(|_| writer_stopped())?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn writer_stopped() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "audit writer stopped")
}

/// Path the current log is moved to on rotation.
pub fn rotated_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".1");
    PathBuf::from(name)
}

struct AuditWriter {
    file: File,
    path: PathBuf,
    max_file_bytes: u64,
    written: u64,
}

impl AuditWriter {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<WriterMessage>) {
        while let Some(message) = receiver.recv().await {
            match message {
                WriterMessage::Line { request_id, line } => {
                    if let Err(e) = self.append(&line).await {
                        warn!(error = %e, request_id = %request_id, "Failed to write audit entry");
                    } else {
                        debug!(request_id = %request_id, "Audit entry logged");
                    }
                }
                WriterMessage::Flush(done) => {
                    if let Err(e) = self.file.flush().await {
                        warn!(error = %e, "Failed to flush audit log");
                    }
                    let _ = done.send(());
                }
            }
        }
        debug!(path = %self.path.display(), "Audit writer stopped");
    }

    async fn append(&mut self, line: &str) -> io::Result<()> {
        let len = line.len() as u64;
        if self.max_file_bytes > 0 && self.written > 0 && self.written + len > self.max_file_bytes
        {
            self.rotate().await?;
        }

        self.file.write_all(line.as_bytes()).await?;
        self.written += len;

        if let Err(e) = self.file.sync_data().await {
            warn!(error = %e, "Failed to sync audit log");
        }
        Ok(())
    }

    async fn rotate(&mut self) -> io::Result<()> {
        self.file.flush().await?;
        let rotated = rotated_path(&self.path);
        tokio::fs::rename(&self.path, &rotated).await?;

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        info!(
            path = %self.path.display(),
            rotated = %rotated.display(),
            bytes = self.written,
            "Audit log rotated"
        );
        self.written = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn entry(endpoint: &str) -> AuditEntry {
        let mut entry = AuditEntry::new(Uuid::nil(), endpoint, "127.0.0.1");
        entry.timestamp = "2026-01-01T00:00:00+00:00".to_string();
        entry
    }

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_logger_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("subdir/audit.log");

        let logger = AuditLogger::with_limit(&log_path, 0).unwrap();
        assert!(log_path.parent().unwrap().exists());
        assert_eq!(logger.path(), log_path);
    }

    #[tokio::test]
    async fn test_logger_writes_json_lines() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");
        let logger = AuditLogger::with_limit(&log_path, 0).unwrap();

        logger.log(&entry("/api/v1/inbound/create")).unwrap();
        logger
            .log(&entry("/api/v1/order/status").failed("ORDER_ERROR", "Order O9 not found"))
            .unwrap();
        logger.flush().await.unwrap();

        let lines = read_lines(&log_path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["endpoint"], "/api/v1/inbound/create");
        assert_eq!(lines[0]["result"]["status"], "success");
        assert_eq!(lines[1]["result"]["status"], "failure");
        assert_eq!(lines[1]["result"]["error_code"], "ORDER_ERROR");
    }

    #[tokio::test]
    async fn test_logger_appends_to_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");

        let first = AuditLogger::with_limit(&log_path, 0).unwrap();
        first.log(&entry("/a")).unwrap();
        first.flush().await.unwrap();
        drop(first);

        let second = AuditLogger::with_limit(&log_path, 0).unwrap();
        second.log(&entry("/b")).unwrap();
        second.flush().await.unwrap();

        let lines = read_lines(&log_path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["endpoint"], "/b");
    }

    #[tokio::test]
    async fn test_log_does_not_wait_for_disk() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");
        let logger = AuditLogger::with_limit(&log_path, 0).unwrap();

        // Queued entries only reach the file once the writer task runs.
        for i in 0..100 {
            logger.log(&entry(&format!("/call/{}", i))).unwrap();
        }
        logger.flush().await.unwrap();

        let lines = read_lines(&log_path);
        assert_eq!(lines.len(), 100);
        assert_eq!(lines[99]["endpoint"], "/call/99");
    }

    #[tokio::test]
    async fn test_rotates_at_size_limit() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");
        let line_len = serde_json::to_string(&entry("/a")).unwrap().len() as u64 + 1;

        // Room for two entries per file.
        let logger = AuditLogger::with_limit(&log_path, line_len * 2).unwrap();
        for endpoint in ["/a", "/b", "/c"] {
            logger.log(&entry(endpoint)).unwrap();
        }
        logger.flush().await.unwrap();

        let rotated = read_lines(&rotated_path(&log_path));
        assert_eq!(rotated.len(), 2);
        assert_eq!(rotated[0]["endpoint"], "/a");
        assert_eq!(rotated[1]["endpoint"], "/b");

        let current = read_lines(&log_path);
        assert_eq!(current.len(), 1);
        assert_eq!(current[0]["endpoint"], "/c");
    }

    #[tokio::test]
    async fn test_rotation_counts_existing_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");
        let line_len = serde_json::to_string(&entry("/a")).unwrap().len() as u64 + 1;

        let first = AuditLogger::with_limit(&log_path, line_len).unwrap();
        first.log(&entry("/a")).unwrap();
        first.flush().await.unwrap();
        drop(first);

        let second = AuditLogger::with_limit(&log_path, line_len).unwrap();
        second.log(&entry("/b")).unwrap();
        second.flush().await.unwrap();

        assert_eq!(read_lines(&rotated_path(&log_path))[0]["endpoint"], "/a");
        assert_eq!(read_lines(&log_path)[0]["endpoint"], "/b");
    }

    #[test]
    fn test_rotated_path() {
        assert_eq!(
            rotated_path(Path::new("/var/log/inbound-gate/audit.log")),
            PathBuf::from("/var/log/inbound-gate/audit.log.1")
        );
    }
}
