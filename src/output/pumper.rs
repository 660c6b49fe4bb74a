//! Per-stream pump loop.
//!
//! One pumper drains one output pipe of a child process, in its own spawned
//! task, until end-of-stream. It must keep consuming even with no sinks
//! attached, since a full OS pipe buffer would deadlock the child.

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::filter::{is_binary_byte, sanitize_line};
use super::sink::{ByteSink, LineSink};

const READ_CHUNK_SIZE: usize = 8192;

/// Result of draining one stream to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PumpOutcome {
    pub bytes_read: u64,
    pub lines_delivered: u64,
    pub binary_detected: bool,
}

pub struct StreamPumper {
    force_binary: bool,
    text_sink: Option<Arc<dyn LineSink>>,
    byte_sink: Option<Arc<dyn ByteSink>>,
}

impl StreamPumper {
    pub fn new(
        force_binary: bool,
        text_sink: Option<Arc<dyn LineSink>>,
        byte_sink: Option<Arc<dyn ByteSink>>,
    ) -> Self {
        Self {
            force_binary,
            text_sink,
            byte_sink,
        }
    }

    /// Line-oriented pumper delivering to a single text sink.
    pub fn text(sink: Arc<dyn LineSink>) -> Self {
        Self::new(false, Some(sink), None)
    }

    /// Binary pumper delivering raw chunks to a single byte sink.
    pub fn binary(sink: Arc<dyn ByteSink>) -> Self {
        Self::new(true, None, Some(sink))
    }

    /// Drain `source` until end-of-stream.
    ///
    /// Read errors mid-stream are swallowed after flushing whatever was
    /// decoded so far; sink failures are logged and do not stop the drain.
    /// Never panics and never propagates; the child's pipe is always consumed.
    pub async fn pump<R: AsyncRead + Unpin>(&self, mut source: R) -> PumpOutcome {
        let mut outcome = PumpOutcome::default();
        let mut buf = [0u8; READ_CHUNK_SIZE];
        // Bytes of an unterminated line, carried across chunks.
        let mut pending_line: Vec<u8> = Vec::new();
        // Raw bytes held back until binary content is detected, so the byte
        // sink receives the stream byte-exact from its start.
        let mut held_raw: Vec<u8> = Vec::new();

        loop {
            let n = match source.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!("Read error while pumping stream: {}", e);
                    break;
                }
            };
            let chunk = &buf[..n];
            outcome.bytes_read += n as u64;

            if self.force_binary {
                self.forward_chunk(chunk).await;
                continue;
            }

            if self.byte_sink.is_some() {
                if outcome.binary_detected {
                    self.forward_chunk(chunk).await;
                } else {
                    held_raw.extend_from_slice(chunk);
                    if chunk.iter().any(|&b| is_binary_byte(b)) {
                        outcome.binary_detected = true;
                        tracing::debug!(
                            "Binary content detected after {} bytes, mirroring raw stream",
                            outcome.bytes_read
                        );
                        self.forward_chunk(&held_raw).await;
                        held_raw = Vec::new();
                    }
                }
            } else if !outcome.binary_detected && chunk.iter().any(|&b| is_binary_byte(b)) {
                outcome.binary_detected = true;
            }

            pending_line.extend_from_slice(chunk);
            while let Some(pos) = pending_line.iter().position(|&b| b == b'\n') {
                let rest = pending_line.split_off(pos + 1);
                pending_line.pop();
                if pending_line.last() == Some(&b'\r') {
                    pending_line.pop();
                }
                self.deliver_line(&pending_line, &mut outcome).await;
                pending_line = rest;
            }
        }

        if self.force_binary {
            if let Some(ref text_sink) = self.text_sink {
                let summary = format!("Read {} Bytes", outcome.bytes_read);
                if let Err(e) = text_sink.consume_line(&summary).await {
                    tracing::warn!("Text sink rejected transfer summary: {}", e);
                } else {
                    outcome.lines_delivered += 1;
                }
            }
            return outcome;
        }

        // Flush a trailing unterminated line.
        if !pending_line.is_empty() {
            let mut last = pending_line;
            if last.last() == Some(&b'\r') {
                last.pop();
            }
            self.deliver_line(&last, &mut outcome).await;
        }

        outcome
    }

    async fn deliver_line(&self, raw: &[u8], outcome: &mut PumpOutcome) {
        let Some(ref text_sink) = self.text_sink else {
            return;
        };
        let line = sanitize_line(&String::from_utf8_lossy(raw));
        match text_sink.consume_line(&line).await {
            Ok(()) => outcome.lines_delivered += 1,
            Err(e) => tracing::warn!("Text sink rejected line: {}", e),
        }
    }

    async fn forward_chunk(&self, chunk: &[u8]) {
        if let Some(ref byte_sink) = self.byte_sink {
            if let Err(e) = byte_sink.consume_chunk(chunk).await {
                tracing::warn!("Byte sink rejected chunk: {}", e);
            }
        }
    }
}
