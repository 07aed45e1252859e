//! Feed adapter seam.
//!
//! A venue feed is split into two collaborators:
//!
//! - [`FeedAdapter`] - owns the transport and runs until cancelled, pushing
//!   canonical messages into an [`EventSink`]
//! - [`Normalizer`] - venue-specific strategy turning one raw payload into
//!   canonical messages, composed into an adapter rather than inherited
//!
//! [`BookSink`] is the sink the orchestrator hands to every adapter: it
//! applies messages to a shared [`InstrumentBook`], then logs and counts
//! every anomaly and skips the offending event.
//!
//! # Locking
//!
//! Each [`InstrumentBook`] sits behind one `parking_lot::Mutex`. The sink
//! holds it for exactly one `route` (plus its crossed check) and the snapshot
//! task holds it for exactly one `describe`, so a read never observes a half
//! applied event. The lock is never held across an `.await`.

pub mod adapters;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::LegConfig;
use crate::error::Error;
use crate::observe::AnomalyObserver;
use crate::orderbook::InstrumentBook;
use crate::types::{ControlSignal, FeedEvent, FeedMessage, Side};

pub use adapters::{CanonicalJson, LineFeed, StreamFeed};

/// Book shared between a feed task and the snapshot task
pub type SharedBook = Arc<Mutex<InstrumentBook>>;

/// Consumer of canonical feed messages
pub trait EventSink: Send {
    /// Apply one incremental update
    fn on_event(&mut self, event: FeedEvent);

    /// Apply one lifecycle signal
    fn on_signal(&mut self, signal: ControlSignal);

    /// Dispatch any feed message
    fn deliver(&mut self, message: FeedMessage) {
        match message {
            FeedMessage::Event(event) => self.on_event(event),
            FeedMessage::Control(signal) => self.on_signal(signal),
        }
    }

    /// A raw payload the adapter could not normalize and skipped
    fn on_malformed(&mut self, error: Error) {
        warn!(%error, "skipping malformed payload");
    }
}

/// Venue-specific payload normalization
pub trait Normalizer: Send {
    /// Turn one raw payload into zero or more canonical messages
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be parsed. Adapters skip such
    /// payloads and hand the error to [`EventSink::on_malformed`].
    fn normalize(&mut self, raw: &str) -> Result<Vec<FeedMessage>, Error>;
}

/// One venue connection feeding one book
#[async_trait]
pub trait FeedAdapter: Send {
    /// Venue identifier, for logs
    fn venue(&self) -> &str;

    /// Pump messages into `sink` until the feed ends or `cancel` fires.
    ///
    /// Every suspension point must also observe `cancel`.
    ///
    /// # Errors
    ///
    /// A connection-level failure. The orchestrator resyncs the book and
    /// runs the adapter again after the configured reconnect delay.
    async fn run(&mut self, sink: &mut dyn EventSink, cancel: CancellationToken) -> Result<(), Error>;
}

/// Builds the adapter for one leg of a pair
pub trait AdapterFactory: Send + Sync {
    /// Create the adapter for `leg`
    ///
    /// # Errors
    ///
    /// Returns an error if the venue is not supported or the adapter cannot
    /// be configured.
    fn create(&self, leg: &LegConfig) -> Result<Box<dyn FeedAdapter>, Error>;
}

impl<F> AdapterFactory for F
where
    F: Fn(&LegConfig) -> Result<Box<dyn FeedAdapter>, Error> + Send + Sync,
{
    fn create(&self, leg: &LegConfig) -> Result<Box<dyn FeedAdapter>, Error> {
        self(leg)
    }
}

/// [`EventSink`] that applies messages to a [`SharedBook`]
#[derive(Debug, Clone)]
pub struct BookSink {
    book: SharedBook,
    venue: String,
    instrument: String,
    observer: Arc<dyn AnomalyObserver>,
}

impl BookSink {
    /// Create a sink for `book`, reporting anomalies to `observer`
    pub fn new(book: SharedBook, observer: Arc<dyn AnomalyObserver>) -> Self {
        let (venue, instrument) = {
            let guard = book.lock();
            (guard.venue().to_string(), guard.instrument().to_string())
        };
        Self {
            book,
            venue,
            instrument,
            observer,
        }
    }

    /// The book this sink writes to
    pub fn book(&self) -> &SharedBook {
        &self.book
    }

    /// Clear both sides after a connection-level failure
    pub fn resync_all(&mut self) {
        {
            let mut book = self.book.lock();
            book.resync(Side::Bid);
            book.resync(Side::Ask);
        }
        info!(venue = %self.venue, instrument = %self.instrument, "book cleared for resync");
    }

    fn report(&self, error: &Error) {
        match error {
            // Expected under reordering and duplicate delivery
            Error::UnknownOrder(order_id) => debug!(
                venue = %self.venue,
                instrument = %self.instrument,
                order_id = %order_id,
                "ignoring event for unknown order"
            ),
            Error::CrossedBook { bid, ask } => warn!(
                venue = %self.venue,
                instrument = %self.instrument,
                bid = %bid,
                ask = %ask,
                "crossed book"
            ),
            other => warn!(
                venue = %self.venue,
                instrument = %self.instrument,
                error = %other,
                "skipping feed event"
            ),
        }
        self.observer.record(&self.venue, &self.instrument, error);
    }
}

impl EventSink for BookSink {
    fn on_event(&mut self, event: FeedEvent) {
        trace!(venue = %self.venue, kind = event.kind(), order_id = %event.order_id(), "feed event");
        let outcome = {
            let mut book = self.book.lock();
            book.route(event).and_then(|_| book.check_crossed())
        };
        if let Err(error) = outcome {
            self.report(&error);
        }
    }

    fn on_signal(&mut self, signal: ControlSignal) {
        let outcome = {
            let mut book = self.book.lock();
            book.apply_signal(&signal).and_then(|()| book.check_crossed())
        };
        match outcome {
            Ok(()) => match signal {
                ControlSignal::SideReady { side, .. } => {
                    info!(venue = %self.venue, instrument = %self.instrument, %side, "side ready");
                }
                ControlSignal::Resync { side, .. } => {
                    info!(venue = %self.venue, instrument = %self.instrument, %side, "side resync");
                }
            },
            Err(error) => self.report(&error),
        }
    }

    fn on_malformed(&mut self, error: Error) {
        warn!(venue = %self.venue, instrument = %self.instrument, %error, "skipping malformed payload");
        self.observer.record(&self.venue, &self.instrument, &error);
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::observe::AnomalyCounters;
    use crate::types::SideTag;

    fn sink() -> (BookSink, Arc<AnomalyCounters>) {
        let counters = Arc::new(AnomalyCounters::new());
        let book = Arc::new(Mutex::new(InstrumentBook::new("coinbase", "BTC-USD", 10)));
        (BookSink::new(book, counters.clone()), counters)
    }

    fn ready(sink: &mut BookSink) {
        for side in [Side::Bid, Side::Ask] {
            sink.on_signal(ControlSignal::SideReady {
                instrument: "BTC-USD".to_string(),
                side,
            });
        }
    }

    #[test]
    fn test_anomalies_are_counted_and_skipped() {
        let (mut sink, counters) = sink();

        sink.on_event(FeedEvent::insert("1", Side::Bid, dec!(100), dec!(1)));
        sink.on_event(FeedEvent::insert("1", Side::Bid, dec!(99), dec!(4)));
        sink.on_event(FeedEvent::remove("999", Side::Bid));
        sink.on_event(FeedEvent::Change {
            order_id: "1".into(),
            side: SideTag::new("sideways"),
            new_size: dec!(3),
        });

        let counts = counters.snapshot();
        assert_eq!(counts.duplicate_orders, 1);
        assert_eq!(counts.unknown_orders, 1);
        assert_eq!(counts.invalid_sides, 1);

        let book = sink.book().lock();
        assert_eq!(book.bids().len(), 1);
        assert_eq!(book.bids().order(&"1".into()).unwrap().remaining_size, dec!(1));
    }

    #[test]
    fn test_crossed_book_is_reported_once_ready() {
        let (mut sink, counters) = sink();
        sink.on_event(FeedEvent::insert("b", Side::Bid, dec!(101), dec!(1)));
        sink.on_event(FeedEvent::insert("a", Side::Ask, dec!(100), dec!(1)));
        assert_eq!(counters.snapshot().crossed_books, 0);

        ready(&mut sink);
        assert_eq!(counters.snapshot().crossed_books, 1);

        // Applied anyway; the next event that uncrosses clears the condition
        sink.on_event(FeedEvent::remove("b", Side::Bid));
        assert_eq!(counters.snapshot().crossed_books, 1);
        assert!(sink.book().lock().describe().is_ready());
    }

    #[test]
    fn test_resync_all_clears_and_rewarms() {
        let (mut sink, _) = sink();
        sink.on_event(FeedEvent::insert("b", Side::Bid, dec!(99), dec!(1)));
        ready(&mut sink);

        sink.resync_all();
        let book = sink.book().lock();
        assert!(book.is_warming_up());
        assert!(book.bids().is_empty());
    }

    #[test]
    fn test_malformed_payload_is_counted() {
        let (mut sink, counters) = sink();
        let error = serde_json::from_str::<FeedMessage>("not json").unwrap_err();
        sink.on_malformed(error.into());

        let counts = counters.snapshot();
        assert_eq!(counts.other, 1);
        assert_eq!(counts.total(), 1);
        assert!(sink.book().lock().bids().is_empty());
    }

    #[test]
    fn test_signal_for_other_instrument_is_ignored() {
        let (mut sink, counters) = sink();
        sink.on_signal(ControlSignal::SideReady {
            instrument: "ETH-USD".to_string(),
            side: Side::Bid,
        });
        assert_eq!(counters.snapshot().instrument_mismatches, 1);
        assert!(sink.book().lock().bids().is_warming_up());
    }
}
