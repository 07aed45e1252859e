//! Price level index.
//!
//! Aggregated size and order count per distinct price, kept in a `BTreeMap`:
//!
//! - O(log n) upsert and removal
//! - O(log n) best level via `first_key_value` / `last_key_value`
//! - Lazy best-first iteration for depth queries
//!
//! # Invariant
//!
//! Every key present has `order_count >= 1` and `aggregated_size > 0`.
//! A level whose size or count drops to zero is removed by the same call.

use std::collections::btree_map::{self, BTreeMap};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::{Price, Side, Size};

/// Aggregated resting interest at one price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceLevel {
    /// Level price
    pub price: Price,
    /// Sum of remaining size over live orders at this price
    pub aggregated_size: Size,
    /// Number of live orders at this price
    pub order_count: u32,
}

impl PriceLevel {
    fn empty(price: Price) -> Self {
        Self {
            price,
            aggregated_size: Decimal::ZERO,
            order_count: 0,
        }
    }
}

/// Which end of the index is "best"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Lowest price first (asks)
    Lowest,
    /// Highest price first (bids)
    Highest,
}

impl Direction {
    /// Best-first direction for a book side
    pub fn for_side(side: Side) -> Self {
        match side {
            Side::Bid => Direction::Highest,
            Side::Ask => Direction::Lowest,
        }
    }
}

/// Ordered mapping `price -> PriceLevel`, ascending by price
#[derive(Debug, Clone, Default)]
pub struct PriceLevelIndex {
    levels: BTreeMap<Price, PriceLevel>,
}

impl PriceLevelIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply size and count deltas to the level at `price`.
    ///
    /// A missing level is created at zero first. If the resulting size or
    /// count is not positive the level is removed entirely.
    ///
    /// Returns `false`, leaving the index unchanged, if the aggregated size
    /// would overflow. A reduction never overflows.
    #[must_use]
    pub fn upsert(&mut self, price: Price, delta_size: Size, delta_count: i32) -> bool {
        let level = self
            .levels
            .entry(price)
            .or_insert_with(|| PriceLevel::empty(price));

        // Overflow needs an existing non-zero level, so nothing empty is left behind
        let Some(size) = level.aggregated_size.checked_add(delta_size) else {
            return false;
        };
        level.aggregated_size = size;
        let count = i64::from(level.order_count) + i64::from(delta_count);

        if level.aggregated_size <= Decimal::ZERO || count <= 0 {
            self.levels.remove(&price);
        } else {
            level.order_count = u32::try_from(count).unwrap_or(u32::MAX);
        }
        true
    }

    /// Extreme level in `direction`, or `None` if the index is empty
    #[must_use]
    pub fn best(&self, direction: Direction) -> Option<&PriceLevel> {
        match direction {
            Direction::Lowest => self.levels.first_key_value().map(|(_, level)| level),
            Direction::Highest => self.levels.last_key_value().map(|(_, level)| level),
        }
    }

    /// Up to `n` levels from the extreme in `direction` inward
    #[must_use]
    pub fn top_n(&self, n: usize, direction: Direction) -> TopLevels<'_> {
        TopLevels {
            inner: self.levels.values(),
            direction,
            remaining: n,
        }
    }

    /// Level at an exact price
    #[must_use]
    pub fn get(&self, price: &Price) -> Option<&PriceLevel> {
        self.levels.get(price)
    }

    /// All levels, ascending by price
    pub fn iter(&self) -> impl Iterator<Item = &PriceLevel> + '_ {
        self.levels.values()
    }

    /// Number of distinct price levels
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether there are no levels
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Drop every level
    pub fn clear(&mut self) {
        self.levels.clear();
    }
}

/// Lazy best-first walk over at most `n` levels.
///
/// Borrowing the index, it cannot outlive a mutation and is not restartable.
#[derive(Debug)]
pub struct TopLevels<'a> {
    inner: btree_map::Values<'a, Price, PriceLevel>,
    direction: Direction,
    remaining: usize,
}

impl<'a> Iterator for TopLevels<'a> {
    type Item = &'a PriceLevel;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let level = match self.direction {
            Direction::Lowest => self.inner.next(),
            Direction::Highest => self.inner.next_back(),
        }?;
        self.remaining -= 1;
        Some(level)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let upper = self.remaining.min(self.inner.len());
        (upper, Some(upper))
    }
}

impl ExactSizeIterator for TopLevels<'_> {}

impl std::iter::FusedIterator for TopLevels<'_> {}
