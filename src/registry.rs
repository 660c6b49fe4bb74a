//! Per-build output composites and the project-name registry the dashboard
//! polls through.
//!
//! The registry is an explicit object owned by the build scheduler; there
//! is no global table of buffers. Entries are registered at build start and
//! replaced by the next build's output.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::output::{
    parse_skip_marker, BroadcastBuffer, FileHistory, HistoryError, LineHistory, LineSink,
    RingHistory,
};

/// One poll of the "lines since offset" protocol.
///
/// `next_start_offset` always advances past everything the response covers:
/// each ordinary line counts 1, a skip marker counts its skipped total, so a
/// client resumes exactly where it left off regardless of eviction.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub next_start_offset: u64,
    pub lines: Vec<String>,
}

/// Advance `start` past `lines`, counting skip markers by their skipped
/// total rather than as one line.
pub fn advance_offset(start: u64, lines: &[String]) -> u64 {
    lines.iter().fold(start, |offset, line| {
        offset + parse_skip_marker(line).unwrap_or(1)
    })
}

/// Everything captured for one build of one project.
///
/// Live phase: lines land in the bounded ring (and the log file, when
/// configured; and the broadcast tail, when attached). After
/// [`mark_completed`](Self::mark_completed), retrieval falls through to the
/// file so the full un-evicted record serves the same offsets.
pub struct BuildOutput {
    ring: RingHistory,
    log: FileHistory,
    live_tail: Option<Arc<BroadcastBuffer>>,
    completed: AtomicBool,
}

impl BuildOutput {
    pub fn new(capacity: usize, log_path: Option<PathBuf>) -> Self {
        Self {
            ring: RingHistory::new(capacity),
            log: match log_path {
                Some(path) => FileHistory::new(path),
                None => FileHistory::unconfigured(),
            },
            live_tail: None,
            completed: AtomicBool::new(false),
        }
    }

    /// Attach a broadcast buffer that mirrors every line for live tailing.
    pub fn with_live_tail(mut self, buffer: Arc<BroadcastBuffer>) -> Self {
        self.live_tail = Some(buffer);
        self
    }

    pub fn live_tail(&self) -> Option<&Arc<BroadcastBuffer>> {
        self.live_tail.as_ref()
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Switch retrieval from the ring to the persisted log (when one is
    /// configured) and close the live tail so its readers drain out.
    pub fn mark_completed(&self) {
        self.completed.store(true, Ordering::Release);
        if let Some(ref tail) = self.live_tail {
            tail.close();
        }
    }

    /// Append one line at the next absolute index, to every attached
    /// backend.
    pub async fn append_line(&self, line: &str) -> Result<(), HistoryError> {
        if self.log.is_configured() {
            self.log.consume_line(line).await?;
        }
        LineHistory::consume_line(&self.ring, line).await?;
        if let Some(ref tail) = self.live_tail {
            tail.write_line(line);
        }
        Ok(())
    }

    /// Catch-up read at `from`, served by the ring while the build runs and
    /// by the log file once completed.
    pub async fn retrieve_lines(&self, from: u64) -> Result<Vec<String>, HistoryError> {
        if self.is_completed() && self.log.is_configured() {
            self.log.retrieve_lines(from).await
        } else {
            self.ring.retrieve_lines(from).await
        }
    }

    /// One round of the polling protocol.
    pub async fn poll(&self, start_offset: u64) -> Result<PollResponse, HistoryError> {
        let lines = self.retrieve_lines(start_offset).await?;
        Ok(PollResponse {
            next_start_offset: advance_offset(start_offset, &lines),
            lines,
        })
    }

    /// Discard visible content from both backends.
    pub async fn clear(&self) -> Result<(), HistoryError> {
        self.ring.clear().await?;
        self.log.clear().await
    }
}

#[async_trait]
impl LineSink for BuildOutput {
    async fn consume_line(&self, line: &str) -> Result<()> {
        self.append_line(line).await?;
        Ok(())
    }
}

/// Maps project names to their most recent build's output.
pub struct OutputRegistry {
    builds: RwLock<HashMap<String, Arc<BuildOutput>>>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self {
            builds: RwLock::new(HashMap::new()),
        }
    }

    /// Register `output` as the current build of `project`, replacing and
    /// discarding the previous build's output.
    pub fn register(&self, project: &str, output: Arc<BuildOutput>) {
        let previous = self
            .builds
            .write()
            .unwrap()
            .insert(project.to_string(), output);
        if previous.is_some() {
            tracing::debug!("Replaced captured output for project {}", project);
        }
    }

    pub fn get(&self, project: &str) -> Option<Arc<BuildOutput>> {
        self.builds.read().unwrap().get(project).cloned()
    }

    pub fn remove(&self, project: &str) -> Option<Arc<BuildOutput>> {
        self.builds.write().unwrap().remove(project)
    }

    /// Poll a project's output. An unknown project yields an empty response
    /// echoing the caller's offset; polling is never an error path.
    pub async fn poll(&self, project: &str, start_offset: u64) -> Result<PollResponse, HistoryError> {
        match self.get(project) {
            Some(output) => output.poll(start_offset).await,
            None => Ok(PollResponse {
                next_start_offset: start_offset,
                lines: Vec::new(),
            }),
        }
    }
}

impl Default for OutputRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_offset_counts_plain_lines() {
        let lines: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(advance_offset(5, &lines), 8);
    }

    #[test]
    fn test_advance_offset_expands_skip_markers() {
        let lines: Vec<String> = vec![
            "(Skipped 40 lines)".into(),
            "tail 1".into(),
            "tail 2".into(),
        ];
        assert_eq!(advance_offset(0, &lines), 42);
    }

    #[test]
    fn test_advance_offset_accepts_bare_marker_variant() {
        let lines: Vec<String> = vec!["Skipped 3 lines".into(), "x".into()];
        assert_eq!(advance_offset(10, &lines), 14);
    }

    #[test]
    fn test_poll_response_serializes_for_the_dashboard() {
        let response = PollResponse {
            next_start_offset: 12,
            lines: vec!["ok".into()],
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"nextStartOffset":12,"lines":["ok"]}"#);
    }

    #[tokio::test]
    async fn test_poll_loop_resumes_across_eviction() {
        let output = BuildOutput::new(4, None);
        let mut offset = 0;

        for i in 0..3 {
            output.append_line(&format!("line {}", i)).await.unwrap();
        }
        let response = output.poll(offset).await.unwrap();
        assert_eq!(response.lines.len(), 3);
        offset = response.next_start_offset;
        assert_eq!(offset, 3);

        // Write far past capacity; the next poll reports the eviction and
        // still lands the client exactly at the end.
        for i in 3..20 {
            output.append_line(&format!("line {}", i)).await.unwrap();
        }
        let response = output.poll(offset).await.unwrap();
        assert_eq!(response.lines[0], "(Skipped 13 lines)");
        assert_eq!(response.lines.len(), 5);
        assert_eq!(response.next_start_offset, 20);

        // Caught up: nothing new.
        let response = output.poll(response.next_start_offset).await.unwrap();
        assert!(response.lines.is_empty());
        assert_eq!(response.next_start_offset, 20);
    }

    #[tokio::test]
    async fn test_handoff_serves_same_offsets_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = BuildOutput::new(4, Some(dir.path().join("console.log")));

        for i in 0..10 {
            output.append_line(&format!("line {}", i)).await.unwrap();
        }

        // Live: ring answers, with eviction reported.
        let live = output.retrieve_lines(7).await.unwrap();
        assert_eq!(live, vec!["line 7", "line 8", "line 9"]);

        output.mark_completed();

        // Completed: file answers the same offsets with the same content,
        // and can also serve what the ring had evicted.
        let done = output.retrieve_lines(7).await.unwrap();
        assert_eq!(done, vec!["line 7", "line 8", "line 9"]);
        let full = output.retrieve_lines(0).await.unwrap();
        assert_eq!(full.len(), 10);
        assert_eq!(full[0], "line 0");
    }

    #[tokio::test]
    async fn test_handoff_without_log_file_keeps_serving_ring() {
        let output = BuildOutput::new(8, None);
        output.append_line("only line").await.unwrap();
        output.mark_completed();

        assert_eq!(
            output.retrieve_lines(0).await.unwrap(),
            vec!["only line"]
        );
    }

    #[tokio::test]
    async fn test_live_tail_mirrors_lines_and_closes_on_completion() {
        let tail = Arc::new(BroadcastBuffer::new());
        let output = BuildOutput::new(8, None).with_live_tail(tail.clone());

        output.append_line("streamed").await.unwrap();
        output.mark_completed();

        let mut reader = tail.reader();
        assert_eq!(reader.read_line().await, Some("streamed".to_string()));
        assert_eq!(reader.read_line().await, None);
    }

    #[tokio::test]
    async fn test_clear_empties_both_backends() {
        let dir = tempfile::tempdir().unwrap();
        let output = BuildOutput::new(4, Some(dir.path().join("console.log")));
        output.append_line("gone").await.unwrap();

        output.clear().await.unwrap();

        assert!(output.retrieve_lines(0).await.unwrap().is_empty());
        output.mark_completed();
        assert!(output.retrieve_lines(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_registry_register_get_replace() {
        let registry = OutputRegistry::new();
        let first = Arc::new(BuildOutput::new(4, None));
        first.append_line("old build").await.unwrap();
        registry.register("core", first);

        let second = Arc::new(BuildOutput::new(4, None));
        second.append_line("new build").await.unwrap();
        registry.register("core", second);

        let response = registry.poll("core", 0).await.unwrap();
        assert_eq!(response.lines, vec!["new build"]);
    }

    #[tokio::test]
    async fn test_registry_unknown_project_polls_empty() {
        let registry = OutputRegistry::new();
        let response = registry.poll("ghost", 17).await.unwrap();
        assert!(response.lines.is_empty());
        assert_eq!(response.next_start_offset, 17);
    }
}
