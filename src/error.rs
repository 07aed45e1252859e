//! Error types for the lob-mirror crate.
//!
//! Two families live in one enum:
//!
//! - **Event anomalies** (`DuplicateOrder`, `UnknownOrder`, `InvalidSide`,
//!   `CrossedBook`, `InvalidQuantity`, `InstrumentMismatch`) are raised by the
//!   book for a single feed event. They are logged, counted and the event is
//!   skipped; they never stop a unit.
//! - **Structural errors** (configuration, I/O, feed and runtime failures)
//!   are propagated to the caller.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::OrderId;

/// The main error type for this crate
#[derive(Debug, Error)]
pub enum Error {
    /// Insert referenced an id that is already live
    #[error("Duplicate order: {0}")]
    DuplicateOrder(OrderId),

    /// Match/change/remove referenced an id that is not live
    #[error("Unknown order: {0}")]
    UnknownOrder(OrderId),

    /// Side tag resolved to neither bids nor asks
    #[error("Invalid side: {0:?}")]
    InvalidSide(String),

    /// Best bid at or above best ask while both sides are ready
    #[error("Crossed book: best bid {bid} >= best ask {ask}")]
    CrossedBook {
        /// Best bid price
        bid: Decimal,
        /// Best ask price
        ask: Decimal,
    },

    /// Negative price, or a size that cannot rest on the book
    #[error("Invalid quantity for order {order_id}: {value}")]
    InvalidQuantity {
        /// Order the event referred to
        order_id: OrderId,
        /// Offending value
        value: Decimal,
    },

    /// Control signal aimed at a different instrument
    #[error("Instrument mismatch: expected {expected}, got {got}")]
    InstrumentMismatch {
        /// Instrument owned by the book
        expected: String,
        /// Instrument named by the signal
        got: String,
    },

    /// Book state failed consistency verification
    #[error("Inconsistent book: {0}")]
    Inconsistent(String),

    /// Invalid configuration (missing fields, bad values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (config files, line-delimited feeds)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Feed adapter or connection failure
    #[error("Feed error: {0}")]
    Feed(String),

    /// Unit thread or runtime failure
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// Whether this is a per-event anomaly that is recovered by skipping the event
    pub fn is_anomaly(&self) -> bool {
        matches!(
            self,
            Error::DuplicateOrder(_)
                | Error::UnknownOrder(_)
                | Error::InvalidSide(_)
                | Error::CrossedBook { .. }
                | Error::InvalidQuantity { .. }
                | Error::InstrumentMismatch { .. }
        )
    }

    /// Create a feed error from any string-like message
    pub fn feed(msg: impl Into<String>) -> Self {
        Error::Feed(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_crossed_book_display() {
        let err = Error::CrossedBook {
            bid: dec!(101),
            ask: dec!(100),
        };
        assert!(err.to_string().contains("101"));
        assert!(err.to_string().contains("100"));
    }

    #[test]
    fn test_anomaly_classification() {
        assert!(Error::UnknownOrder(OrderId::from("9")).is_anomaly());
        assert!(Error::InvalidSide("x".into()).is_anomaly());
        assert!(!Error::Config("no pairs".into()).is_anomaly());
        assert!(!Error::feed("connection reset").is_anomaly());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Json(_)));
    }
}
