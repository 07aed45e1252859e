//! Transport-agnostic feed adapters.
//!
//! - [`StreamFeed`] - an async stream of already-canonical messages, for
//!   venue clients that normalize on their own task and for replays
//! - [`LineFeed`] - a line-delimited byte source plus a [`Normalizer`]
//!   strategy; [`CanonicalJson`] reads the canonical JSON form directly

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{EventSink, FeedAdapter, Normalizer};
use crate::error::Error;
use crate::types::FeedMessage;

/// Adapter over an async stream of canonical messages
#[derive(Debug)]
pub struct StreamFeed<S> {
    venue: String,
    stream: S,
}

impl<S> StreamFeed<S>
where
    S: Stream<Item = FeedMessage> + Send + Unpin,
{
    /// Wrap a message stream for `venue`
    pub fn new(venue: impl Into<String>, stream: S) -> Self {
        Self {
            venue: venue.into(),
            stream,
        }
    }
}

#[async_trait]
impl<S> FeedAdapter for StreamFeed<S>
where
    S: Stream<Item = FeedMessage> + Send + Unpin,
{
    fn venue(&self) -> &str {
        &self.venue
    }

    async fn run(&mut self, sink: &mut dyn EventSink, cancel: CancellationToken) -> Result<(), Error> {
        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                next = self.stream.next() => match next {
                    Some(message) => sink.deliver(message),
                    None => {
                        debug!(venue = %self.venue, "stream ended");
                        return Ok(());
                    }
                },
            }
        }
    }
}

/// Normalizer for line-delimited canonical JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalJson;

impl Normalizer for CanonicalJson {
    fn normalize(&mut self, raw: &str) -> Result<Vec<FeedMessage>, Error> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![serde_json::from_str(raw)?])
    }
}

/// Adapter reading one payload per line and normalizing it
#[derive(Debug)]
pub struct LineFeed<R, N> {
    venue: String,
    lines: Lines<R>,
    normalizer: N,
}

impl<R, N> LineFeed<R, N>
where
    R: AsyncBufRead + Send + Unpin,
    N: Normalizer,
{
    /// Read lines from `reader` for `venue`, normalized by `normalizer`
    pub fn new(venue: impl Into<String>, reader: R, normalizer: N) -> Self {
        Self {
            venue: venue.into(),
            lines: reader.lines(),
            normalizer,
        }
    }
}

#[async_trait]
impl<R, N> FeedAdapter for LineFeed<R, N>
where
    R: AsyncBufRead + Send + Unpin,
    N: Normalizer,
{
    fn venue(&self) -> &str {
        &self.venue
    }

    async fn run(&mut self, sink: &mut dyn EventSink, cancel: CancellationToken) -> Result<(), Error> {
        loop {
            let line = tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                line = self.lines.next_line() => line?,
            };
            let Some(line) = line else {
                debug!(venue = %self.venue, "input ended");
                return Ok(());
            };
            match self.normalizer.normalize(&line) {
                Ok(messages) => messages.into_iter().for_each(|m| sink.deliver(m)),
                Err(error) => {
                    debug!(venue = %self.venue, line = %line, "payload not normalized");
                    sink.on_malformed(error);
                }
            }
        }
    }
}
