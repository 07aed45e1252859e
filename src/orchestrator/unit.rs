//! One instrument pair: its books, feed tasks and status tick.
//!
//! ```text
//! STARTING --(all tasks scheduled)--> RUNNING --(stop)--> CANCELLING --(joined or aborted)--> STOPPED
//! ```
//!
//! All tasks of a unit share one scheduler. Feed tasks suspend only inside
//! their adapter's receive, the snapshot task only on its timer, and every
//! book mutation or read completes under the book's lock without
//! suspending.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, LegConfig, PairConfig};
use crate::error::Error;
use crate::feed::{AdapterFactory, BookSink, FeedAdapter, SharedBook};
use crate::observe::{AnomalyCounters, AnomalyCounts};
use super::panic_message;
use crate::orderbook::{BookStatus, DepthRow, InstrumentBook, TopOfBook};
use crate::types::{Side, Timestamp};

/// Lifecycle of a [`PairUnit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnitState {
    /// Books allocated, tasks not yet scheduled
    Starting,
    /// Feed and snapshot tasks scheduled
    Running,
    /// Stop requested, waiting for tasks to exit
    Cancelling,
    /// Every task exited or was aborted
    Stopped,
}

/// Top of book and depth of one ready leg
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegQuote {
    /// Venue identifier
    pub venue: String,
    /// Venue symbol
    pub symbol: String,
    /// Best bid and ask
    pub top: TopOfBook,
    /// Bid levels, best first, at most `max_depth`
    pub bids: Vec<DepthRow>,
    /// Ask levels, best first, at most `max_depth`
    pub asks: Vec<DepthRow>,
}

/// A leg still replaying
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingLeg {
    /// Venue identifier
    pub venue: String,
    /// Venue symbol
    pub symbol: String,
    /// Sides not yet ready
    pub sides: Vec<Side>,
}

/// What one status tick observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "legs", rename_all = "snake_case")]
pub enum StatusBody {
    /// Every leg is ready; quotes in leg order, primary first
    Quotes(Vec<LegQuote>),
    /// At least one leg is warming up; only the pending legs are listed
    WarmingUp(Vec<PendingLeg>),
}

/// Status emitted once per tick per unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    /// Pair instrument name
    pub instrument: String,
    /// Tick number, starting at 1
    pub tick: u64,
    /// When the books were read
    pub captured_at: Timestamp,
    /// Quotes or warm-up notice
    pub body: StatusBody,
}

impl StatusLine {
    /// Whether every leg was ready
    pub fn is_ready(&self) -> bool {
        matches!(self.body, StatusBody::Quotes(_))
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            StatusBody::Quotes(quotes) => match quotes.first() {
                Some(primary) => write!(f, "{} >> {}", self.instrument, primary.top),
                None => write!(f, "{} >> -", self.instrument),
            },
            StatusBody::WarmingUp(pending) => {
                for (i, leg) in pending.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    let sides: Vec<_> = leg.sides.iter().map(|s| s.label()).collect();
                    write!(
                        f,
                        "{} - {} is warming up ({})",
                        leg.venue,
                        leg.symbol,
                        sides.join(", ")
                    )?;
                }
                Ok(())
            }
        }
    }
}

/// Summary returned when a unit reaches [`UnitState::Stopped`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    /// Pair instrument name
    pub instrument: String,
    /// Status ticks emitted
    pub ticks: u64,
    /// Tasks that exited on their own or within the grace period
    pub tasks_completed: usize,
    /// Tasks aborted after the grace period
    pub tasks_aborted: usize,
    /// Anomalies recorded by the unit's books
    pub anomalies: AnomalyCounts,
}

struct Leg {
    config: LegConfig,
    adapter: Box<dyn FeedAdapter>,
    book: SharedBook,
}

/// Timing knobs copied out of [`Config`]
#[derive(Debug, Clone, Copy)]
struct Pacing {
    snapshot_interval: Duration,
    initial_snapshot_delay: Duration,
    shutdown_grace: Duration,
    reconnect_delay: Duration,
}

/// Books, feed adapters and status tick for one instrument pair
pub struct PairUnit {
    instrument: String,
    legs: Vec<Leg>,
    pacing: Pacing,
    status_tx: mpsc::UnboundedSender<StatusLine>,
    counters: Arc<AnomalyCounters>,
    state_tx: watch::Sender<UnitState>,
}

impl fmt::Debug for PairUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairUnit")
            .field("instrument", &self.instrument)
            .field("legs", &self.legs.iter().map(|l| &l.config).collect::<Vec<_>>())
            .field("state", &*self.state_tx.borrow())
            .finish()
    }
}

impl PairUnit {
    /// Allocate one book per leg; `adapters` are matched to legs by position
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `config` or `pair` is invalid, or the adapter
    /// count differs from the leg count.
    pub fn new(
        pair: PairConfig,
        config: &Config,
        adapters: Vec<Box<dyn FeedAdapter>>,
        status_tx: mpsc::UnboundedSender<StatusLine>,
    ) -> Result<Self, Error> {
        config.validate()?;
        pair.validate()?;
        if adapters.len() != pair.legs.len() {
            return Err(Error::Config(format!(
                "{}: {} legs but {} adapters",
                pair.instrument,
                pair.legs.len(),
                adapters.len()
            )));
        }

        let legs = pair
            .legs
            .into_iter()
            .zip(adapters)
            .map(|(leg, adapter)| {
                if adapter.venue() != leg.venue {
                    warn!(
                        instrument = %pair.instrument,
                        leg = %leg.venue,
                        adapter = adapter.venue(),
                        "adapter venue differs from configured leg"
                    );
                }
                let book = InstrumentBook::new(&leg.venue, &leg.symbol, config.max_depth());
                Leg {
                    config: leg,
                    adapter,
                    book: Arc::new(Mutex::new(book)),
                }
            })
            .collect();

        let (state_tx, _) = watch::channel(UnitState::Starting);
        Ok(Self {
            instrument: pair.instrument,
            legs,
            pacing: Pacing {
                snapshot_interval: config.snapshot_interval(),
                initial_snapshot_delay: config.initial_snapshot_delay(),
                shutdown_grace: config.shutdown_grace(),
                reconnect_delay: config.reconnect_delay(),
            },
            status_tx,
            counters: Arc::new(AnomalyCounters::new()),
            state_tx,
        })
    }

    /// Build every leg's adapter through `factory`
    ///
    /// # Errors
    ///
    /// The first error returned by the factory.
    pub fn from_factory(
        pair: PairConfig,
        config: &Config,
        factory: &dyn AdapterFactory,
        status_tx: mpsc::UnboundedSender<StatusLine>,
    ) -> Result<Self, Error> {
        let adapters = pair
            .legs
            .iter()
            .map(|leg| factory.create(leg))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(pair, config, adapters, status_tx)
    }

    /// Pair instrument name
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Watch the unit's lifecycle
    pub fn state(&self) -> watch::Receiver<UnitState> {
        self.state_tx.subscribe()
    }

    /// Shared handles to every leg's book, in leg order
    pub fn books(&self) -> Vec<SharedBook> {
        self.legs.iter().map(|leg| leg.book.clone()).collect()
    }

    /// Anomaly counters shared by every leg
    pub fn counters(&self) -> Arc<AnomalyCounters> {
        self.counters.clone()
    }

    /// Run until `stop` fires, then shut down within the grace period.
    ///
    /// Feed adapters ending or failing never stop the unit; only `stop` does.
    pub async fn run(self, stop: CancellationToken) -> UnitReport {
        let Self {
            instrument,
            legs,
            pacing,
            status_tx,
            counters,
            state_tx,
        } = self;

        info!(%instrument, legs = legs.len(), "unit starting");
        let cancel = stop.child_token();
        let ticks = Arc::new(AtomicU64::new(0));
        let mut tasks = JoinSet::new();

        let mut snapshot_legs = Vec::with_capacity(legs.len());
        for leg in legs {
            let sink = BookSink::new(leg.book.clone(), counters.clone());
            tasks.spawn(run_feed(
                leg.adapter,
                sink,
                cancel.clone(),
                pacing.reconnect_delay,
            ));
            snapshot_legs.push((leg.config, leg.book));
        }
        tasks.spawn(run_snapshots(
            instrument.clone(),
            snapshot_legs,
            pacing,
            status_tx,
            ticks.clone(),
            cancel.clone(),
        ));

        state_tx.send_replace(UnitState::Running);
        info!(%instrument, "unit running");

        let mut tasks_completed = 0;
        loop {
            tokio::select! {
                () = stop.cancelled() => break,
                Some(joined) = tasks.join_next() => {
                    tasks_completed += 1;
                    log_exit(&instrument, joined);
                }
            }
        }

        state_tx.send_replace(UnitState::Cancelling);
        info!(%instrument, "unit cancelling");
        cancel.cancel();

        let drained = tokio::time::timeout(pacing.shutdown_grace, async {
            while let Some(joined) = tasks.join_next().await {
                tasks_completed += 1;
                log_exit(&instrument, joined);
            }
        })
        .await;

        let tasks_aborted = if drained.is_err() {
            let stragglers = tasks.len();
            warn!(
                %instrument,
                stragglers,
                grace = ?pacing.shutdown_grace,
                "tasks did not exit within grace period, aborting"
            );
            tasks.shutdown().await;
            stragglers
        } else {
            0
        };

        state_tx.send_replace(UnitState::Stopped);
        let report = UnitReport {
            instrument,
            ticks: ticks.load(Ordering::Relaxed),
            tasks_completed,
            tasks_aborted,
            anomalies: counters.snapshot(),
        };
        info!(
            instrument = %report.instrument,
            ticks = report.ticks,
            aborted = report.tasks_aborted,
            anomalies = report.anomalies.total(),
            "unit stopped"
        );
        report
    }
}

fn log_exit(instrument: &str, joined: Result<String, tokio::task::JoinError>) {
    match joined {
        Ok(task) => debug!(%instrument, %task, "task exited"),
        Err(e) if e.is_cancelled() => debug!(%instrument, "task aborted"),
        Err(e) => error!(%instrument, error = %e, "task panicked"),
    }
}

/// Pump one adapter, resyncing its book and re-running it after failures.
///
/// A panicking adapter counts as a failure.
async fn run_feed(
    mut adapter: Box<dyn FeedAdapter>,
    mut sink: BookSink,
    cancel: CancellationToken,
    reconnect_delay: Duration,
) -> String {
    let venue = adapter.venue().to_string();
    loop {
        let outcome = AssertUnwindSafe(adapter.run(&mut sink, cancel.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(Error::feed(format!("adapter panicked: {}", panic_message(payload))))
            });
        match outcome {
            Ok(()) => {
                debug!(%venue, "feed finished");
                break;
            }
            Err(_) if cancel.is_cancelled() => break,
            Err(error) => {
                warn!(%venue, %error, "feed failed, resyncing book");
                sink.resync_all();
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(reconnect_delay) => {}
                }
            }
        }
    }
    format!("feed:{venue}")
}

/// Emit one [`StatusLine`] per tick until cancelled
async fn run_snapshots(
    instrument: String,
    legs: Vec<(LegConfig, SharedBook)>,
    pacing: Pacing,
    status_tx: mpsc::UnboundedSender<StatusLine>,
    ticks: Arc<AtomicU64>,
    cancel: CancellationToken,
) -> String {
    let mut timer = interval_at(
        Instant::now() + pacing.initial_snapshot_delay,
        pacing.snapshot_interval,
    );
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = timer.tick() => {
                let tick = ticks.fetch_add(1, Ordering::Relaxed) + 1;
                let line = capture(&instrument, &legs, tick);
                info!("{line}");
                if status_tx.send(line).is_err() {
                    debug!(%instrument, "status receiver dropped");
                }
            }
        }
    }
    "snapshot".to_string()
}

/// One leg as read under its lock
struct LegRead<'a> {
    leg: &'a LegConfig,
    status: BookStatus,
    bids: Vec<DepthRow>,
    asks: Vec<DepthRow>,
}

/// Read every leg's book in one pass, without suspending in between
fn capture(instrument: &str, legs: &[(LegConfig, SharedBook)], tick: u64) -> StatusLine {
    let captured_at = chrono::Utc::now();
    let reads: Vec<LegRead<'_>> = legs
        .iter()
        .map(|(leg, book)| {
            let book = book.lock();
            let read = LegRead {
                leg,
                status: book.describe(),
                bids: book.bids().depth(book.bids().max_depth()).collect(),
                asks: book.asks().depth(book.asks().max_depth()).collect(),
            };
            read
        })
        .collect();

    let body = if reads.iter().all(|read| read.status.is_ready()) {
        StatusBody::Quotes(
            reads
                .into_iter()
                .filter_map(|read| match read.status {
                    BookStatus::Ready(top) => Some(LegQuote {
                        venue: read.leg.venue.clone(),
                        symbol: read.leg.symbol.clone(),
                        top,
                        bids: read.bids,
                        asks: read.asks,
                    }),
                    BookStatus::WarmingUp { .. } => None,
                })
                .collect(),
        )
    } else {
        StatusBody::WarmingUp(
            reads
                .into_iter()
                .filter(|read| !read.status.is_ready())
                .map(|LegRead { leg, status, .. }| PendingLeg {
                    venue: leg.venue.clone(),
                    symbol: leg.symbol.clone(),
                    sides: status.pending_sides(),
                })
                .collect(),
        )
    };

    StatusLine {
        instrument: instrument.to_string(),
        tick,
        captured_at,
        body,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::orderbook::Quote;
    use crate::types::FeedEvent;

    fn legs() -> Vec<(LegConfig, SharedBook)> {
        ["coinbase", "bitfinex"]
            .into_iter()
            .map(|venue| {
                let leg = LegConfig::new(venue, "BTC-USD");
                let book = InstrumentBook::new(venue, "BTC-USD", 10);
                (leg, Arc::new(Mutex::new(book)))
            })
            .collect()
    }

    fn make_ready(book: &SharedBook, bid: rust_decimal::Decimal, ask: rust_decimal::Decimal) {
        let mut book = book.lock();
        book.route(FeedEvent::insert("b", Side::Bid, bid, dec!(2))).unwrap();
        book.route(FeedEvent::insert("b2", Side::Bid, bid - dec!(0.10), dec!(1)))
            .unwrap();
        book.route(FeedEvent::insert("b3", Side::Bid, bid - dec!(0.10), dec!(4)))
            .unwrap();
        book.route(FeedEvent::insert("a", Side::Ask, ask, dec!(3))).unwrap();
        book.mark_side_ready(Side::Bid);
        book.mark_side_ready(Side::Ask);
    }

    #[test]
    fn test_capture_warming_up_lists_pending_legs() {
        let legs = legs();
        legs[1].1.lock().mark_side_ready(Side::Bid);

        let line = capture("BTC-USD", &legs, 1);
        assert!(!line.is_ready());
        assert_eq!(
            line.to_string(),
            "coinbase - BTC-USD is warming up (bids, asks); bitfinex - BTC-USD is warming up (asks)"
        );
    }

    #[test]
    fn test_capture_only_pending_legs_reported() {
        let legs = legs();
        make_ready(&legs[0].1, dec!(100), dec!(101));

        let line = capture("BTC-USD", &legs, 3);
        assert_eq!(line.tick, 3);
        assert_eq!(line.to_string(), "bitfinex - BTC-USD is warming up (bids, asks)");
    }

    #[test]
    fn test_capture_ready_prints_primary_leg() {
        let legs = legs();
        make_ready(&legs[0].1, dec!(100.50), dec!(101.00));
        make_ready(&legs[1].1, dec!(100.40), dec!(100.90));

        let line = capture("BTC-USD", &legs, 7);
        assert!(line.is_ready());
        assert_eq!(line.to_string(), "BTC-USD >> 2 x 100.50 | 101.00 x 3");

        let StatusBody::Quotes(quotes) = &line.body else {
            panic!("expected quotes");
        };
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[1].venue, "bitfinex");
        assert_eq!(
            quotes[1].top.bid,
            Some(Quote {
                price: dec!(100.40),
                size: dec!(2)
            })
        );

        // Depth rows accompany every quote, best first
        let bids: Vec<_> = quotes[0]
            .bids
            .iter()
            .map(|row| (row.price, row.size, row.order_count))
            .collect();
        assert_eq!(bids, vec![(dec!(100.50), dec!(2), 1), (dec!(100.40), dec!(5), 2)]);
        assert_eq!(quotes[0].asks.len(), 1);
        assert_eq!(quotes[0].asks[0].price, dec!(101.00));
        assert_eq!(quotes[1].bids[1].price, dec!(100.30));
    }

    #[test]
    fn test_capture_depth_limited_to_max_depth() {
        let legs: Vec<(LegConfig, SharedBook)> = vec![(
            LegConfig::new("coinbase", "BTC-USD"),
            Arc::new(Mutex::new(InstrumentBook::new("coinbase", "BTC-USD", 2))),
        )];
        make_ready(&legs[0].1, dec!(100), dec!(101));
        legs[0]
            .1
            .lock()
            .route(FeedEvent::insert("b4", Side::Bid, dec!(99), dec!(1)))
            .unwrap();

        let line = capture("BTC-USD", &legs, 1);
        let StatusBody::Quotes(quotes) = &line.body else {
            panic!("expected quotes");
        };
        assert_eq!(quotes[0].bids.len(), 2);
        assert_eq!(quotes[0].bids[1].price, dec!(99.90));
    }
}
