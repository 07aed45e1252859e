//! Both sides of one instrument on one venue.
//!
//! [`InstrumentBook`] is the single entry point feed adapters write into:
//! canonical events are routed by their side tag, control signals flip
//! warm-up state or clear a side. Reads go through [`InstrumentBook::describe`].

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

use super::book::OrderBook;
use crate::error::Error;
use crate::types::{ControlSignal, FeedEvent, Price, Side, Size};

/// Price and aggregated size at the top of one side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    /// Level price
    pub price: Price,
    /// Aggregated size at the level
    pub size: Size,
}

/// Best bid and best ask of a ready book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TopOfBook {
    /// Best bid, `None` if the side is empty
    pub bid: Option<Quote>,
    /// Best ask, `None` if the side is empty
    pub ask: Option<Quote>,
}

impl fmt::Display for TopOfBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bid {
            Some(q) => write!(f, "{} x {}", q.size.round_dp(2), q.price.round_dp(2))?,
            None => f.write_str("-")?,
        }
        f.write_str(" | ")?;
        match self.ask {
            Some(q) => write!(f, "{} x {}", q.price.round_dp(2), q.size.round_dp(2)),
            None => f.write_str("-"),
        }
    }
}

/// Result of [`InstrumentBook::describe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BookStatus {
    /// At least one side is still replaying
    WarmingUp {
        /// Bids still warming up
        bids: bool,
        /// Asks still warming up
        asks: bool,
    },
    /// Both sides are ready
    Ready(TopOfBook),
}

impl BookStatus {
    /// Whether both sides are ready
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, BookStatus::Ready(_))
    }

    /// Sides still warming up, bids first
    #[must_use]
    pub fn pending_sides(&self) -> Vec<Side> {
        match *self {
            BookStatus::WarmingUp { bids, asks } => [(bids, Side::Bid), (asks, Side::Ask)]
                .into_iter()
                .filter_map(|(pending, side)| pending.then_some(side))
                .collect(),
            BookStatus::Ready(_) => Vec::new(),
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookStatus::Ready(top) => top.fmt(f),
            BookStatus::WarmingUp { .. } => {
                let sides: Vec<_> = self.pending_sides().into_iter().map(Side::label).collect();
                write!(f, "warming up ({})", sides.join(", "))
            }
        }
    }
}

/// Bids and asks for one instrument on one venue
#[derive(Debug, Clone)]
pub struct InstrumentBook {
    venue: String,
    instrument: String,
    bids: OrderBook,
    asks: OrderBook,
}

impl InstrumentBook {
    /// Create an empty, warming-up book
    #[must_use]
    pub fn new(venue: impl Into<String>, instrument: impl Into<String>, max_depth: usize) -> Self {
        let instrument = instrument.into();
        Self {
            venue: venue.into(),
            bids: OrderBook::new(instrument.clone(), Side::Bid, max_depth),
            asks: OrderBook::new(instrument.clone(), Side::Ask, max_depth),
            instrument,
        }
    }

    /// Venue the book mirrors
    #[must_use]
    pub fn venue(&self) -> &str {
        &self.venue
    }

    /// Venue symbol of the instrument
    #[must_use]
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Bid side
    #[must_use]
    pub fn bids(&self) -> &OrderBook {
        &self.bids
    }

    /// Ask side
    #[must_use]
    pub fn asks(&self) -> &OrderBook {
        &self.asks
    }

    /// One side by name
    #[must_use]
    pub fn side(&self, side: Side) -> &OrderBook {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut OrderBook {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// Apply a canonical event to the side its tag names.
    ///
    /// Returns the resolved side on success.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidSide`] for an unresolvable tag, otherwise whatever the
    /// side's `receive_*` method reports. The book is unchanged on error.
    pub fn route(&mut self, event: FeedEvent) -> Result<Side, Error> {
        let side = event.side_tag().resolve()?;
        let book = self.side_mut(side);
        match event {
            FeedEvent::Insert {
                order_id,
                price,
                size,
                ..
            } => book.receive_insert(order_id, price, size)?,
            FeedEvent::Match {
                maker_order_id,
                filled_size,
                ..
            } => book.receive_match(&maker_order_id, filled_size)?,
            FeedEvent::Change {
                order_id, new_size, ..
            } => book.receive_change(&order_id, new_size)?,
            FeedEvent::Remove { order_id, .. } => book.receive_remove(&order_id)?,
        }
        Ok(side)
    }

    /// Apply a lifecycle signal
    ///
    /// # Errors
    ///
    /// [`Error::InstrumentMismatch`] if the signal names another instrument.
    pub fn apply_signal(&mut self, signal: &ControlSignal) -> Result<(), Error> {
        if signal.instrument() != self.instrument {
            return Err(Error::InstrumentMismatch {
                expected: self.instrument.clone(),
                got: signal.instrument().to_string(),
            });
        }
        match *signal {
            ControlSignal::SideReady { side, .. } => self.mark_side_ready(side),
            ControlSignal::Resync { side, .. } => self.resync(side),
        }
        Ok(())
    }

    /// Flip one side out of warm-up. Idempotent.
    pub fn mark_side_ready(&mut self, side: Side) {
        self.side_mut(side).mark_ready();
    }

    /// Clear one side and put it back into warm-up
    pub fn resync(&mut self, side: Side) {
        self.side_mut(side).clear();
    }

    /// Whether either side is still warming up
    #[must_use]
    pub fn is_warming_up(&self) -> bool {
        self.bids.is_warming_up() || self.asks.is_warming_up()
    }

    /// Warm-up status, or the top of book once both sides are ready
    #[must_use]
    pub fn describe(&self) -> BookStatus {
        if self.is_warming_up() {
            return BookStatus::WarmingUp {
                bids: self.bids.is_warming_up(),
                asks: self.asks.is_warming_up(),
            };
        }
        BookStatus::Ready(self.top_of_book())
    }

    /// Best bid and ask; each is `None` while its side warms up or is empty
    #[must_use]
    pub fn top_of_book(&self) -> TopOfBook {
        let quote = |book: &OrderBook| {
            book.best().map(|level| Quote {
                price: level.price,
                size: level.aggregated_size,
            })
        };
        TopOfBook {
            bid: quote(&self.bids),
            ask: quote(&self.asks),
        }
    }

    /// Check that best bid < best ask.
    ///
    /// Only meaningful once both sides are ready; a warming-up or empty side
    /// never reports crossed.
    ///
    /// # Errors
    ///
    /// [`Error::CrossedBook`] if best bid >= best ask.
    pub fn check_crossed(&self) -> Result<(), Error> {
        match (self.bids.best(), self.asks.best()) {
            (Some(bid), Some(ask)) if bid.price >= ask.price => Err(Error::CrossedBook {
                bid: bid.price,
                ask: ask.price,
            }),
            _ => Ok(()),
        }
    }

    /// Best ask minus best bid
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        match (self.bids.best(), self.asks.best()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Average of best bid and best ask
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.bids.best(), self.asks.best()) {
            (Some(bid), Some(ask)) => bid
                .price
                .checked_add(ask.price)
                .map(|sum| sum / Decimal::TWO),
            _ => None,
        }
    }
}
