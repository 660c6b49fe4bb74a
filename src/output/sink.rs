//! Sink seams between the stream pumpers and everything downstream.

use anyhow::Result;
use async_trait::async_trait;

/// Receives decoded, filtered console lines, one at a time.
#[async_trait]
pub trait LineSink: Send + Sync {
    async fn consume_line(&self, line: &str) -> Result<()>;
}

/// Receives raw, unfiltered byte chunks.
#[async_trait]
pub trait ByteSink: Send + Sync {
    async fn consume_chunk(&self, chunk: &[u8]) -> Result<()>;
}

/// Adapts a plain function to a [`LineSink`].
pub struct FnLineSink<F>(F);

impl<F> FnLineSink<F>
where
    F: Fn(&str) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> LineSink for FnLineSink<F>
where
    F: Fn(&str) + Send + Sync,
{
    async fn consume_line(&self, line: &str) -> Result<()> {
        (self.0)(line);
        Ok(())
    }
}

/// Routes lines into the tracing log, used as the default stderr destination.
pub struct LoggingSink {
    prefix: String,
}

impl LoggingSink {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl LineSink for LoggingSink {
    async fn consume_line(&self, line: &str) -> Result<()> {
        tracing::info!("{}: {}", self.prefix, line);
        Ok(())
    }
}
