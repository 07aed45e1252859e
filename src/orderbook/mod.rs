//! Order book reconstruction engine.
//!
//! This module rebuilds a full order-by-order book from incremental events:
//!
//! - [`ladder`] - price level index with O(log n) upsert and best-level lookup
//! - [`book`] - one side (bids or asks) with per-order tracking
//! - [`instrument`] - both sides of one instrument on one venue
//!
//! # Example
//!
//! ```rust
//! use lob_mirror::orderbook::InstrumentBook;
//! use lob_mirror::types::{FeedEvent, Side};
//! use rust_decimal::Decimal;
//!
//! let mut book = InstrumentBook::new("coinbase", "BTC-USD", 15);
//!
//! book.route(FeedEvent::insert("1", Side::Bid, Decimal::new(10000, 2), Decimal::TWO)).unwrap();
//! book.route(FeedEvent::insert("2", Side::Ask, Decimal::new(10050, 2), Decimal::ONE)).unwrap();
//!
//! // Nothing is reported until the feed finishes its initial replay
//! assert!(!book.describe().is_ready());
//!
//! book.mark_side_ready(Side::Bid);
//! book.mark_side_ready(Side::Ask);
//! println!("BTC-USD >> {}", book.describe());
//! ```

pub mod book;
pub mod instrument;
pub mod ladder;

pub use book::{DepthRow, OrderBook};
pub use instrument::{BookStatus, InstrumentBook, Quote, TopOfBook};
pub use ladder::{Direction, PriceLevel, PriceLevelIndex};
