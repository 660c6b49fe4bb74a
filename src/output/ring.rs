//! Bounded in-memory line history for the in-progress build.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::RwLock;

use super::history::{skip_marker, HistoryError, LineHistory};
use super::sink::LineSink;

struct RingState {
    lines: VecDeque<String>,
    /// Absolute index the next consumed line will receive.
    next_index: u64,
    /// Evictions since construction or the last clear; gates the skip marker.
    evicted: u64,
}

impl RingState {
    fn lowest_resident(&self) -> u64 {
        self.next_index - self.lines.len() as u64
    }
}

/// Fixed-capacity ring of the most recent `capacity` lines.
///
/// One writer (the stdout pumper's sink) and any number of poller readers;
/// the interior reader-writer lock keeps a reader from ever observing a
/// half-evicted, half-appended state.
pub struct RingHistory {
    capacity: usize,
    state: RwLock<RingState>,
}

impl RingHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: RwLock::new(RingState {
                lines: VecDeque::with_capacity(capacity.min(1024)),
                next_index: 0,
                evicted: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Absolute index the next line will receive (== total lines written).
    pub fn next_index(&self) -> u64 {
        self.state.read().unwrap().next_index
    }

    fn push(&self, line: &str) {
        let mut state = self.state.write().unwrap();
        if state.lines.len() == self.capacity {
            state.lines.pop_front();
            state.evicted += 1;
        }
        state.lines.push_back(line.to_string());
        state.next_index += 1;
    }

    fn snapshot_from(&self, from: u64) -> Vec<String> {
        let state = self.state.read().unwrap();
        if state.lines.is_empty() || from >= state.next_index {
            return Vec::new();
        }

        let lowest = state.lowest_resident();
        if from < lowest && state.evicted > 0 {
            let mut out = Vec::with_capacity(state.lines.len() + 1);
            out.push(skip_marker(lowest - from));
            out.extend(state.lines.iter().cloned());
            return out;
        }

        let skip = from.saturating_sub(lowest) as usize;
        state.lines.iter().skip(skip).cloned().collect()
    }
}

#[async_trait]
impl LineHistory for RingHistory {
    async fn consume_line(&self, line: &str) -> Result<(), HistoryError> {
        self.push(line);
        Ok(())
    }

    async fn retrieve_lines(&self, from: u64) -> Result<Vec<String>, HistoryError> {
        Ok(self.snapshot_from(from))
    }

    async fn clear(&self) -> Result<(), HistoryError> {
        let mut state = self.state.write().unwrap();
        state.lines.clear();
        state.evicted = 0;
        Ok(())
    }
}

#[async_trait]
impl LineSink for RingHistory {
    async fn consume_line(&self, line: &str) -> Result<()> {
        self.push(line);
        Ok(())
    }
}
