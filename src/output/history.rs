//! The catch-up retrieval contract shared by the in-memory ring and the
//! file-backed log.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("No log file specified")]
    NoLogFile,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Line-indexed console history.
///
/// Lines carry strictly increasing, 0-based absolute indices.
/// `retrieve_lines` is an idempotent catch-up read: it returns every
/// available line at index `>= from`, in order, without consuming anything:
/// repeated calls with the same `from` and no intervening writes yield
/// identical results.
#[async_trait]
pub trait LineHistory: Send + Sync {
    /// Append one line at the next absolute index.
    async fn consume_line(&self, line: &str) -> Result<(), HistoryError>;

    /// All available lines with absolute index `>= from`, oldest first.
    /// Indices beyond the highest written line yield an empty list; indices
    /// below the lowest retained line are reported via a skip marker, not an
    /// error.
    async fn retrieve_lines(&self, from: u64) -> Result<Vec<String>, HistoryError>;

    /// Discard visible content so that `retrieve_lines(0)` returns empty.
    /// The absolute sequence counter keeps increasing across a clear.
    async fn clear(&self) -> Result<(), HistoryError>;
}

/// Render the canonical eviction marker.
pub fn skip_marker(count: u64) -> String {
    format!("(Skipped {} lines)", count)
}

/// Parse an eviction marker, returning the skipped-line count.
///
/// Accepts the canonical parenthesized form and the bare `Skipped N lines`
/// variant so historical logs from either shape stay parseable.
pub fn parse_skip_marker(line: &str) -> Option<u64> {
    let inner = line
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(line);
    let count = inner.strip_prefix("Skipped ")?.strip_suffix(" lines")?;
    count.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_round_trip() {
        assert_eq!(skip_marker(7), "(Skipped 7 lines)");
        assert_eq!(parse_skip_marker(&skip_marker(7)), Some(7));
    }

    #[test]
    fn test_parses_bare_variant() {
        assert_eq!(parse_skip_marker("Skipped 120 lines"), Some(120));
    }

    #[test]
    fn test_rejects_ordinary_lines() {
        assert_eq!(parse_skip_marker("Skipped a beat"), None);
        assert_eq!(parse_skip_marker("compiling 3 lines of code"), None);
        assert_eq!(parse_skip_marker(""), None);
    }
}
