//! Structured concurrency for mirrored pairs.
//!
//! - [`unit`] - one pair: its books, feed tasks and periodic status tick,
//!   all on one cooperative scheduler
//! - [`supervisor`] - one isolated thread per pair, top-down cancellation and
//!   bounded shutdown

use std::any::Any;

pub mod supervisor;
pub mod unit;

pub use supervisor::{Supervisor, UnitOutcome};
pub use unit::{LegQuote, PairUnit, PendingLeg, StatusBody, StatusLine, UnitReport, UnitState};

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
