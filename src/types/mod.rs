//! Core types shared by the order book engine and the feed adapters.
//!
//! - [`order`] - Sides, venue side tags, order identifiers and resting orders
//! - [`messages`] - Canonical feed events and control signals

pub mod messages;
pub mod order;

pub use messages::{ControlSignal, FeedEvent, FeedMessage};
pub use order::{Order, OrderId, Side, SideTag};

/// Price of a resting order.
///
/// Venues quote with arbitrary decimal precision, so prices are exact
/// decimals rather than floats or fixed ticks.
pub type Price = rust_decimal::Decimal;

/// Resting or traded quantity.
pub type Size = rust_decimal::Decimal;

/// Wall-clock capture time for depth rows and status lines
pub type Timestamp = chrono::DateTime<chrono::Utc>;
