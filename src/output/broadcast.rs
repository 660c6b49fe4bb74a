//! Full-replay fan-out buffer for live console tailing.
//!
//! One producer appends bytes for the lifetime of a build; any number of
//! readers replay the content from the very first byte, no matter when they
//! attach. Not a sliding window, and deliberately not an OS pipe: pipes
//! cannot give independent late-joining readers the history.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::sink::ByteSink;

struct BroadcastState {
    data: Vec<u8>,
    closed: bool,
}

/// Append-only in-memory byte log with a closed flag.
pub struct BroadcastBuffer {
    state: Mutex<BroadcastState>,
    notify: Notify,
}

impl BroadcastBuffer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BroadcastState {
                data: Vec::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Append bytes and wake every blocked reader.
    ///
    /// Writes after [`close`](Self::close) are discarded.
    pub fn write(&self, bytes: &[u8]) {
        {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                tracing::warn!("Dropping {} bytes written after close", bytes.len());
                return;
            }
            state.data.extend_from_slice(bytes);
        }
        self.notify.notify_waiters();
    }

    /// Append one already-decoded line (re-framed with a newline).
    pub fn write_line(&self, line: &str) {
        let mut framed = Vec::with_capacity(line.len() + 1);
        framed.extend_from_slice(line.as_bytes());
        framed.push(b'\n');
        self.write(&framed);
    }

    /// Close the buffer. Idempotent; wakes every blocked reader so each can
    /// drain what remains and observe end-of-stream.
    pub fn close(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.closed = true;
        }
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open an independent cursor positioned at the first byte ever written.
    pub fn reader(self: &Arc<Self>) -> BroadcastReader {
        BroadcastReader {
            buffer: Arc::clone(self),
            pos: 0,
        }
    }
}

impl Default for BroadcastBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ByteSink for BroadcastBuffer {
    async fn consume_chunk(&self, chunk: &[u8]) -> Result<()> {
        self.write(chunk);
        Ok(())
    }
}

/// One consumer's cursor into a [`BroadcastBuffer`].
///
/// Readers never observe a gap, duplicate, or reorder: the underlying data
/// is append-only and each reader owns its position.
pub struct BroadcastReader {
    buffer: Arc<BroadcastBuffer>,
    pos: usize,
}

impl BroadcastReader {
    /// Next complete line, blocking while the buffer is open with no new
    /// data. After close, drains remaining content (a trailing unterminated
    /// line is returned as-is), then yields `None`.
    pub async fn read_line(&mut self) -> Option<String> {
        loop {
            let notified = self.buffer.notify.notified();
            {
                let state = self.buffer.state.lock().unwrap();
                if let Some(off) = state.data[self.pos..].iter().position(|&b| b == b'\n') {
                    let end = self.pos + off;
                    let mut line_bytes = &state.data[self.pos..end];
                    if line_bytes.last() == Some(&b'\r') {
                        line_bytes = &line_bytes[..line_bytes.len() - 1];
                    }
                    let line = String::from_utf8_lossy(line_bytes).into_owned();
                    self.pos = end + 1;
                    return Some(line);
                }
                if state.closed {
                    if self.pos < state.data.len() {
                        let line =
                            String::from_utf8_lossy(&state.data[self.pos..]).into_owned();
                        self.pos = state.data.len();
                        return Some(line);
                    }
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Next chunk of raw bytes, at most `max` long. Blocks like
    /// [`read_line`](Self::read_line); `None` means closed and drained.
    pub async fn read_chunk(&mut self, max: usize) -> Option<Vec<u8>> {
        loop {
            let notified = self.buffer.notify.notified();
            {
                let state = self.buffer.state.lock().unwrap();
                if self.pos < state.data.len() {
                    let end = state.data.len().min(self.pos + max);
                    let chunk = state.data[self.pos..end].to_vec();
                    self.pos = end;
                    return Some(chunk);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }
}
