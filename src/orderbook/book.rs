//! One side of an order-by-order book.
//!
//! An [`OrderBook`] owns a [`PriceLevelIndex`] plus an order-id lookup and
//! applies the four canonical updates to both:
//!
//! | Update | Order map | Index |
//! |--------|-----------|-------|
//! | insert | add | `upsert(price, +size, +1)` |
//! | match (partial) | reduce | `upsert(price, -filled, 0)` |
//! | match (full) | erase | `upsert(price, -remaining, -1)` |
//! | change | resize | `upsert(price, new - old, 0)` |
//! | remove | erase | `upsert(price, -remaining, -1)` |
//!
//! All methods are synchronous and never block.
//!
//! # Thread Safety
//!
//! This struct is `Send + Sync` but not internally synchronized. For
//! concurrent access, wrap the owning [`InstrumentBook`](super::InstrumentBook)
//! in `parking_lot::Mutex`.

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;

use super::ladder::{Direction, PriceLevel, PriceLevelIndex};
use crate::error::Error;
use crate::types::{Order, OrderId, Price, Side, Size, Timestamp};

/// One row of a depth read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DepthRow {
    /// Level price
    pub price: Price,
    /// Aggregated size at the level
    pub size: Size,
    /// Live orders at the level
    pub order_count: u32,
    /// When the read happened (not an event time)
    pub captured_at: Timestamp,
}

/// Bids or asks for one instrument on one venue
#[derive(Debug, Clone)]
pub struct OrderBook {
    instrument: String,
    side: Side,
    levels: PriceLevelIndex,
    orders: FxHashMap<OrderId, Order>,
    warming_up: bool,
    max_depth: usize,
}

impl OrderBook {
    /// Create an empty side in the warming-up state
    #[must_use]
    pub fn new(instrument: impl Into<String>, side: Side, max_depth: usize) -> Self {
        Self {
            instrument: instrument.into(),
            side,
            levels: PriceLevelIndex::new(),
            orders: FxHashMap::default(),
            warming_up: true,
            max_depth,
        }
    }

    /// Instrument this side belongs to
    #[must_use]
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Side of the book
    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Maximum rows a depth read reports
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Whether the initial replay is still in progress
    #[must_use]
    pub fn is_warming_up(&self) -> bool {
        self.warming_up
    }

    /// Signal that the initial replay is complete. Idempotent.
    pub fn mark_ready(&mut self) {
        self.warming_up = false;
    }

    /// Add a new resting order
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateOrder`] if `order_id` is already live
    /// - [`Error::InvalidQuantity`] for a negative price, a non-positive size,
    ///   or a size the level cannot aggregate without overflow
    ///
    /// State is untouched on error.
    pub fn receive_insert(&mut self, order_id: OrderId, price: Price, size: Size) -> Result<(), Error> {
        if self.orders.contains_key(&order_id) {
            return Err(Error::DuplicateOrder(order_id));
        }
        if price < Decimal::ZERO {
            return Err(Error::InvalidQuantity {
                order_id,
                value: price,
            });
        }
        if size <= Decimal::ZERO {
            return Err(Error::InvalidQuantity {
                order_id,
                value: size,
            });
        }

        if !self.levels.upsert(price, size, 1) {
            return Err(Error::InvalidQuantity {
                order_id,
                value: size,
            });
        }
        self.orders
            .insert(order_id.clone(), Order::new(order_id, self.side, price, size));
        Ok(())
    }

    /// Reduce a resting order by a traded quantity.
    ///
    /// A fill at or above the remaining size removes the order; the level is
    /// reduced by what actually rested, never by more.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownOrder`] if `maker_order_id` is not live
    /// - [`Error::InvalidQuantity`] for a negative fill
    pub fn receive_match(&mut self, maker_order_id: &OrderId, filled_size: Size) -> Result<(), Error> {
        if filled_size < Decimal::ZERO {
            return Err(Error::InvalidQuantity {
                order_id: maker_order_id.clone(),
                value: filled_size,
            });
        }
        let order = self
            .orders
            .get_mut(maker_order_id)
            .ok_or_else(|| Error::UnknownOrder(maker_order_id.clone()))?;

        if filled_size >= order.remaining_size {
            if filled_size > order.remaining_size {
                debug!(
                    instrument = %self.instrument,
                    side = %self.side,
                    order_id = %maker_order_id,
                    remaining = %order.remaining_size,
                    filled = %filled_size,
                    "fill exceeds remaining size, clamping"
                );
            }
            let (price, remaining) = (order.price, order.remaining_size);
            self.orders.remove(maker_order_id);
            // Reductions cannot overflow
            let _ = self.levels.upsert(price, -remaining, -1);
        } else {
            order.remaining_size -= filled_size;
            let _ = self.levels.upsert(order.price, -filled_size, 0);
        }
        Ok(())
    }

    /// Resize a resting order in place.
    ///
    /// Resizing to zero removes the order, so no order is ever live without
    /// its level.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownOrder`] if `order_id` is not live
    /// - [`Error::InvalidQuantity`] for a negative size, or a growth the
    ///   level cannot aggregate without overflow
    pub fn receive_change(&mut self, order_id: &OrderId, new_size: Size) -> Result<(), Error> {
        if new_size < Decimal::ZERO {
            return Err(Error::InvalidQuantity {
                order_id: order_id.clone(),
                value: new_size,
            });
        }
        if new_size.is_zero() {
            return self.receive_remove(order_id);
        }

        let order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| Error::UnknownOrder(order_id.clone()))?;

        let delta = new_size - order.remaining_size;
        if !self.levels.upsert(order.price, delta, 0) {
            return Err(Error::InvalidQuantity {
                order_id: order_id.clone(),
                value: new_size,
            });
        }
        order.remaining_size = new_size;
        Ok(())
    }

    /// Erase a cancelled or done order
    ///
    /// # Errors
    ///
    /// [`Error::UnknownOrder`] if `order_id` is not live. Duplicate and
    /// reordered cancels are normal on real feeds, so callers log and move on.
    pub fn receive_remove(&mut self, order_id: &OrderId) -> Result<(), Error> {
        let order = self
            .orders
            .remove(order_id)
            .ok_or_else(|| Error::UnknownOrder(order_id.clone()))?;
        let _ = self.levels.upsert(order.price, -order.remaining_size, -1);
        Ok(())
    }

    /// Best level for this side, or `None` while warming up or empty
    #[must_use]
    pub fn best(&self) -> Option<&PriceLevel> {
        if self.warming_up {
            return None;
        }
        self.levels.best(Direction::for_side(self.side))
    }

    /// Best-first depth, at most `min(max_rows, max_depth)` rows.
    ///
    /// Every row of one read carries the same capture time. Nothing is
    /// reported while warming up.
    #[must_use]
    pub fn depth(&self, max_rows: usize) -> impl Iterator<Item = DepthRow> + '_ {
        let captured_at = chrono::Utc::now();
        let rows = if self.warming_up {
            0
        } else {
            max_rows.min(self.max_depth)
        };
        self.levels
            .top_n(rows, Direction::for_side(self.side))
            .map(move |level| DepthRow {
                price: level.price,
                size: level.aggregated_size,
                order_count: level.order_count,
                captured_at,
            })
    }

    /// Empty both maps and re-enter warm-up (reconnect, detected gap)
    pub fn clear(&mut self) {
        self.levels.clear();
        self.orders.clear();
        self.warming_up = true;
    }

    /// Look up a live order
    #[must_use]
    pub fn order(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.get(order_id)
    }

    /// Number of live orders
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether there are no live orders
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Number of distinct price levels
    #[must_use]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Check that every level equals the sum and count of its live orders
    /// and that no level without orders is indexed.
    ///
    /// O(orders + levels); intended for tests and diagnostics.
    ///
    /// # Errors
    ///
    /// [`Error::Inconsistent`] describing the first mismatch found.
    pub fn verify_consistency(&self) -> Result<(), Error> {
        let mut expected: FxHashMap<Price, (Size, u32)> = FxHashMap::default();
        for order in self.orders.values() {
            let entry = expected.entry(order.price).or_insert((Decimal::ZERO, 0));
            entry.0 += order.remaining_size;
            entry.1 += 1;
        }

        if expected.len() != self.levels.len() {
            return Err(Error::Inconsistent(format!(
                "{} {}: {} priced groups of orders but {} levels",
                self.instrument,
                self.side.label(),
                expected.len(),
                self.levels.len()
            )));
        }

        for level in self.levels.iter() {
            match expected.get(&level.price) {
                Some(&(size, count))
                    if size == level.aggregated_size && count == level.order_count => {}
                Some(&(size, count)) => {
                    return Err(Error::Inconsistent(format!(
                        "{} {} @ {}: level {} x {} but orders sum {} x {}",
                        self.instrument,
                        self.side.label(),
                        level.price,
                        level.aggregated_size,
                        level.order_count,
                        size,
                        count
                    )));
                }
                None => {
                    return Err(Error::Inconsistent(format!(
                        "{} {} @ {}: level has no live orders",
                        self.instrument,
                        self.side.label(),
                        level.price
                    )));
                }
            }
        }
        Ok(())
    }
}
