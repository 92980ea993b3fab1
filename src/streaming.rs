//! Stream adapter over a streaming chat session.

use crate::error::Result;
use futures::stream::{BoxStream, Stream, StreamExt};
use pin_project_lite::pin_project;
use relay_core::ChatStreamResult;
use std::pin::Pin;
use std::task::{Context, Poll};

pin_project! {
    /// A stream of chat completion chunks.
    ///
    /// Finite and not restartable. Items arrive in wire order; a per-frame
    /// failure is an `Err` item and the stream keeps going, a terminating
    /// failure is the final item.
    pub struct ChatStream {
        #[pin]
        inner: BoxStream<'static, Result<ChatStreamResult>>,
        summary: StreamSummary,
        done: bool,
    }
}

impl ChatStream {
    /// Wrap any stream of chunk results.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<ChatStreamResult>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
            summary: StreamSummary::new(),
            done: false,
        }
    }

    /// Collect all content, failing on the first error item.
    pub async fn collect_content(mut self) -> Result<String> {
        while let Some(item) = self.next().await {
            item?;
        }
        Ok(self.summary.content)
    }

    /// Drain the stream into a [`StreamSummary`], failing on the first
    /// error item.
    pub async fn collect_summary(mut self) -> Result<StreamSummary> {
        while let Some(item) = self.next().await {
            item?;
        }
        Ok(self.summary)
    }

    /// What has been received so far.
    pub fn summary(&self) -> &StreamSummary {
        &self.summary
    }

    /// Check if the stream is done.
    pub fn is_done(&self) -> bool {
        self.done
    }
}

impl Stream for ChatStream {
    type Item = Result<ChatStreamResult>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        if *this.done {
            return Poll::Ready(None);
        }

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.summary.add_chunk(&chunk);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.summary.error_count += 1;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                *this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStream")
            .field("summary", &self.summary)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

/// Accumulated view of a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Full accumulated content.
    pub content: String,
    /// Model reported by the first chunk.
    pub model: String,
    /// Last finish reason seen.
    pub finish_reason: Option<String>,
    /// Number of chunks received.
    pub chunk_count: usize,
    /// Number of error items received.
    pub error_count: usize,
}

impl StreamSummary {
    /// Create an empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk to the summary.
    pub fn add_chunk(&mut self, chunk: &ChatStreamResult) {
        self.content.push_str(chunk.content());
        self.chunk_count += 1;

        if self.model.is_empty() {
            self.model.clone_from(&chunk.model);
        }

        if let Some(reason) = chunk.finish_reason() {
            self.finish_reason = Some(reason.to_string());
        }
    }
}
