//! File-backed line history for completed builds.
//!
//! Same retrieval contract as the ring, but the file is the full, un-evicted
//! record, so no skip markers are ever produced. Retrieval re-opens and
//! re-scans the file each call; this path serves mostly-static completed
//! logs, so simplicity wins over cleverness here.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use super::history::{HistoryError, LineHistory};

pub struct FileHistory {
    path: Option<PathBuf>,
    /// Serializes appends so interleaved writers cannot shear a line.
    write_lock: Mutex<()>,
}

impl FileHistory {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            write_lock: Mutex::new(()),
        }
    }

    /// A history with no backing file configured. Retrieval yields nothing;
    /// consuming a line is a configuration error.
    pub fn unconfigured() -> Self {
        Self {
            path: None,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_configured(&self) -> bool {
        self.path.is_some()
    }

    async fn append(&self, path: &Path, line: &str) -> Result<(), HistoryError> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_from(&self, path: &Path, from: u64) -> Result<Vec<String>, HistoryError> {
        let file = match fs::File::open(path).await {
            Ok(file) => file,
            // Not started yet, or rotated away: no lines, not an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut lines = BufReader::new(file).lines();
        let mut index = 0u64;
        let mut out = Vec::new();
        while let Some(line) = lines.next_line().await? {
            if index >= from {
                out.push(line);
            }
            index += 1;
        }
        Ok(out)
    }
}

#[async_trait]
impl LineHistory for FileHistory {
    async fn consume_line(&self, line: &str) -> Result<(), HistoryError> {
        let path = self.path.clone().ok_or(HistoryError::NoLogFile)?;
        self.append(&path, line).await
    }

    async fn retrieve_lines(&self, from: u64) -> Result<Vec<String>, HistoryError> {
        match &self.path {
            Some(path) => self.read_from(path, from).await,
            None => Ok(Vec::new()),
        }
    }

    async fn clear(&self) -> Result<(), HistoryError> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log() -> (tempfile::TempDir, FileHistory) {
        let dir = tempfile::tempdir().unwrap();
        let history = FileHistory::new(dir.path().join("console.log"));
        (dir, history)
    }

    #[tokio::test]
    async fn test_append_and_retrieve() {
        let (_dir, history) = temp_log();
        for line in ["alpha", "beta", "gamma"] {
            history.consume_line(line).await.unwrap();
        }

        assert_eq!(
            history.retrieve_lines(0).await.unwrap(),
            vec!["alpha", "beta", "gamma"]
        );
        assert_eq!(history.retrieve_lines(2).await.unwrap(), vec!["gamma"]);
        assert!(history.retrieve_lines(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retrieval_is_idempotent() {
        let (_dir, history) = temp_log();
        history.consume_line("only").await.unwrap();
        let first = history.retrieve_lines(0).await.unwrap();
        let second = history.retrieve_lines(0).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let (_dir, history) = temp_log();
        assert!(history.retrieve_lines(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_consume_is_an_error() {
        let history = FileHistory::unconfigured();
        let err = history.consume_line("anything").await.unwrap_err();
        assert!(matches!(err, HistoryError::NoLogFile));
        assert_eq!(err.to_string(), "No log file specified");
    }

    #[tokio::test]
    async fn test_unconfigured_retrieve_is_empty() {
        let history = FileHistory::unconfigured();
        assert!(history.retrieve_lines(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_removes_backing_content() {
        let (_dir, history) = temp_log();
        history.consume_line("gone soon").await.unwrap();
        history.clear().await.unwrap();
        assert!(history.retrieve_lines(0).await.unwrap().is_empty());

        // Clearing an already-missing file is fine.
        history.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let history = FileHistory::new(dir.path().join("logs/nested/console.log"));
        history.consume_line("deep").await.unwrap();
        assert_eq!(history.retrieve_lines(0).await.unwrap(), vec!["deep"]);
    }
}
