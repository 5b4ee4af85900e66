//! Push-style streams with exactly-once termination
//!
//! An [`Emitter`] pushes items and is terminated by consuming it with
//! [`Emitter::end`] or [`Emitter::fail`]. The paired [`Feed`] yields the items
//! in order. If the emitter is dropped without being terminated, the feed
//! reports [`StreamError::Truncated`] so a consumer can never mistake partial
//! output for a completed stream.

use std::error::Error as StdError;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;

/// Failure observed on a stream
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// The producer reported an error
    #[error("upstream failure: {0}")]
    Upstream(Arc<dyn StdError + Send + Sync>),

    /// The producer went away without ending the stream
    #[error("stream closed before it was ended")]
    Truncated,
}

impl StreamError {
    /// Wrap a producer error
    pub fn upstream<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Upstream(Arc::new(err))
    }

    /// Producer failure described by a message only
    pub fn message(message: impl Into<String>) -> Self {
        let err: Box<dyn StdError + Send + Sync> = message.into().into();
        Self::Upstream(Arc::from(err))
    }
}

enum Item<T> {
    Next(T),
    End,
    Failed(StreamError),
}

/// Create a connected emitter/feed pair
pub fn channel<T>() -> (Emitter<T>, Feed<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Emitter { tx }, Feed { rx, done: false })
}

/// Producing half of a stream
#[derive(Debug)]
pub struct Emitter<T> {
    tx: mpsc::UnboundedSender<Item<T>>,
}

impl<T> Emitter<T> {
    /// Push the next item; dropped silently if the consumer is gone
    pub fn push(&self, item: T) {
        let _ = self.tx.send(Item::Next(item));
    }

    /// Terminate the stream successfully
    pub fn end(self) {
        let _ = self.tx.send(Item::End);
    }

    /// Terminate the stream with an error
    pub fn fail(self, err: StreamError) {
        let _ = self.tx.send(Item::Failed(err));
    }
}

/// Consuming half of a stream
///
/// Yields `Ok` items until the producer ends the stream, or a single `Err`
/// if the producer failed or vanished.
#[derive(Debug)]
pub struct Feed<T> {
    rx: mpsc::UnboundedReceiver<Item<T>>,
    done: bool,
}

impl<T> Feed<T> {
    /// A feed that yields `items` and then ends
    pub fn from_items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let (emitter, feed) = channel();
        for item in items {
            emitter.push(item);
        }
        emitter.end();
        feed
    }

    /// A feed that fails immediately
    pub fn failed(err: StreamError) -> Self {
        let (emitter, feed) = channel();
        emitter.fail(err);
        feed
    }

    /// Drain the feed, failing if the stream did not end cleanly
    pub async fn collect_all(mut self) -> Result<Vec<T>, StreamError> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item?);
        }
        Ok(items)
    }
}

impl<T> Stream for Feed<T> {
    type Item = Result<T, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        let next = match ready!(this.rx.poll_recv(cx)) {
            Some(Item::Next(item)) => Some(Ok(item)),
            Some(Item::End) => {
                this.done = true;
                None
            }
            Some(Item::Failed(err)) => {
                this.done = true;
                Some(Err(err))
            }
            None => {
                this.done = true;
                Some(Err(StreamError::Truncated))
            }
        };
        Poll::Ready(next)
    }
}
