//! Anomaly accounting.
//!
//! Per-event anomalies are recovered locally by skipping the event, but they
//! must never vanish silently. Every anomaly is handed to an
//! [`AnomalyObserver`]; [`AnomalyCounters`] is the lock-free default.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::Error;

/// Receives every anomaly raised while applying feed messages
pub trait AnomalyObserver: Send + Sync + std::fmt::Debug {
    /// Record one anomaly for a venue book
    fn record(&self, venue: &str, instrument: &str, error: &Error);
}

/// Point-in-time copy of [`AnomalyCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnomalyCounts {
    /// Inserts for ids already live
    pub duplicate_orders: u64,
    /// Match/change/remove for ids not live
    pub unknown_orders: u64,
    /// Unresolvable side tags
    pub invalid_sides: u64,
    /// Best bid >= best ask observations
    pub crossed_books: u64,
    /// Negative prices and non-positive sizes
    pub invalid_quantities: u64,
    /// Control signals for another instrument
    pub instrument_mismatches: u64,
    /// Malformed payloads and anything else handed to the observer
    pub other: u64,
}

impl AnomalyCounts {
    /// Sum over all kinds
    pub fn total(&self) -> u64 {
        self.duplicate_orders
            + self.unknown_orders
            + self.invalid_sides
            + self.crossed_books
            + self.invalid_quantities
            + self.instrument_mismatches
            + self.other
    }
}

/// Atomic counters per anomaly kind
#[derive(Debug, Default)]
pub struct AnomalyCounters {
    duplicate_orders: AtomicU64,
    unknown_orders: AtomicU64,
    invalid_sides: AtomicU64,
    crossed_books: AtomicU64,
    invalid_quantities: AtomicU64,
    instrument_mismatches: AtomicU64,
    other: AtomicU64,
}

impl AnomalyCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the current values
    pub fn snapshot(&self) -> AnomalyCounts {
        AnomalyCounts {
            duplicate_orders: self.duplicate_orders.load(Ordering::Relaxed),
            unknown_orders: self.unknown_orders.load(Ordering::Relaxed),
            invalid_sides: self.invalid_sides.load(Ordering::Relaxed),
            crossed_books: self.crossed_books.load(Ordering::Relaxed),
            invalid_quantities: self.invalid_quantities.load(Ordering::Relaxed),
            instrument_mismatches: self.instrument_mismatches.load(Ordering::Relaxed),
            other: self.other.load(Ordering::Relaxed),
        }
    }

    fn counter(&self, error: &Error) -> &AtomicU64 {
        match error {
            Error::DuplicateOrder(_) => &self.duplicate_orders,
            Error::UnknownOrder(_) => &self.unknown_orders,
            Error::InvalidSide(_) => &self.invalid_sides,
            Error::CrossedBook { .. } => &self.crossed_books,
            Error::InvalidQuantity { .. } => &self.invalid_quantities,
            Error::InstrumentMismatch { .. } => &self.instrument_mismatches,
            _ => &self.other,
        }
    }
}

impl AnomalyObserver for AnomalyCounters {
    fn record(&self, _venue: &str, _instrument: &str, error: &Error) {
        self.counter(error).fetch_add(1, Ordering::Relaxed);
    }
}
