//! Stream transformations for model delta streams.

use std::sync::LazyLock;
use std::time::Duration;

use futures::StreamExt;
use regex::Regex;

use crate::provider::DeltaStream;
use crate::types::{StreamEventType, TextStreamDelta};

/// Trait for transforming a stream of text deltas.
pub trait StreamTransform: Send + Sync {
    /// Transform the stream.
    fn transform(&self, stream: DeltaStream) -> DeltaStream;
}

/// Re-chunks text deltas word by word, pausing between words.
///
/// A trailing partial word stays buffered until more text arrives, a
/// non-text delta arrives, or the stream ends.
#[derive(Debug, Clone)]
pub struct SmoothTransform {
    delay: Duration,
    /// `None` passes text through unchunked.
    chunking: Option<Regex>,
}

impl SmoothTransform {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            chunking: word_chunking(),
        }
    }

    /// Use a custom chunking pattern; the buffer up to the end of each match
    /// is released as one chunk.
    pub fn with_pattern(delay: Duration, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            delay,
            chunking: Some(Regex::new(pattern)?),
        })
    }

    fn next_chunk(&self, buffer: &str) -> Option<usize> {
        match &self.chunking {
            Some(chunking) => chunking.find(buffer).filter(|m| m.end() > 0).map(|m| m.end()),
            None => (!buffer.is_empty()).then_some(buffer.len()),
        }
    }
}

impl Default for SmoothTransform {
    fn default() -> Self {
        Self::new(Duration::from_millis(20))
    }
}

static WORD_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\S+\s+").ok());

fn word_chunking() -> Option<Regex> {
    WORD_RE.clone()
}

impl StreamTransform for SmoothTransform {
    fn transform(&self, stream: DeltaStream) -> DeltaStream {
        let this = self.clone();
        let transformed = async_stream::stream! {
            let mut buffer = String::new();
            let mut inner = std::pin::pin!(stream);

            while let Some(item) = inner.next().await {
                match item {
                    Ok(delta) if delta.event_type == StreamEventType::TextDelta => {
                        buffer.push_str(&delta.text);
                        while let Some(end) = this.next_chunk(&buffer) {
                            let chunk: String = buffer.drain(..end).collect();
                            yield Ok(TextStreamDelta::text(chunk));
                            if !this.delay.is_zero() {
                                tokio::time::sleep(this.delay).await;
                            }
                        }
                    }
                    Ok(delta) => {
                        if !buffer.is_empty() {
                            yield Ok(TextStreamDelta::text(std::mem::take(&mut buffer)));
                        }
                        yield Ok(delta);
                    }
                    Err(e) => {
                        if !buffer.is_empty() {
                            yield Ok(TextStreamDelta::text(std::mem::take(&mut buffer)));
                        }
                        yield Err(e);
                        break;
                    }
                }
            }

            if !buffer.is_empty() {
                yield Ok(TextStreamDelta::text(buffer));
            }
        };
        Box::pin(transformed)
    }
}
