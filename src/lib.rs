//! # lob-mirror
//!
//! Real-time limit order book reconstruction for multi-venue market data feeds.
//!
//! ## Features
//!
//! - **Order-by-order books** - Every live order tracked, levels aggregated in O(log n)
//! - **Warm-up gating** - Nothing is reported until a feed finishes its initial replay
//! - **Pluggable feeds** - Venue quirks supplied by composition through [`feed::Normalizer`]
//! - **Isolated pairs** - One thread and one runtime per mirrored instrument pair
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use lob_mirror::config::{LegConfig, PairConfig};
//! use lob_mirror::feed::{AdapterFactory, CanonicalJson, FeedAdapter, LineFeed};
//! use lob_mirror::orchestrator::Supervisor;
//! use lob_mirror::{Config, Error};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let pair = PairConfig::new("BTC-USD")
//!         .with_leg("coinbase", "BTC-USD")
//!         .with_leg("bitfinex", "tBTCUSD");
//!     let config = Config::new(vec![pair]);
//!
//!     // Replay captured canonical JSON lines, one file per leg
//!     let factory: Arc<dyn AdapterFactory> =
//!         Arc::new(|leg: &LegConfig| -> Result<Box<dyn FeedAdapter>, Error> {
//!             let file = std::fs::File::open(format!("{}.jsonl", leg.venue))?;
//!             let reader = tokio::io::BufReader::new(tokio::fs::File::from_std(file));
//!             Ok(Box::new(LineFeed::new(&leg.venue, reader, CanonicalJson)))
//!         });
//!
//!     let (supervisor, mut status) = Supervisor::new(config, factory)?;
//!     tokio::spawn(async move {
//!         while let Some(line) = status.recv().await {
//!             println!("{line}");
//!         }
//!     });
//!     for outcome in supervisor.run_until_ctrl_c().await? {
//!         println!("{}: stopped cleanly = {}", outcome.instrument(), outcome.is_stopped());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Prices and Sizes
//!
//! Venues quote with arbitrary precision, so prices and sizes are
//! [`rust_decimal::Decimal`]. Level keys compare exactly and aggregated sizes
//! never drift.
//!
//! ## Architecture
//!
//! - [`types`] - Sides, order ids and the canonical feed messages
//! - [`orderbook`] - Price ladder, one-sided books, per-venue instrument books
//! - [`feed`] - Adapter and normalizer seams, the sink that applies messages
//! - [`orchestrator`] - Per-pair units and the supervisor that isolates them
//! - [`observe`] - Anomaly accounting
//! - [`config`] - Pairs, timings and JSON loading
//! - [`error`] - Error types for the crate
//!
//! ## Performance
//!
//! - `BTreeMap` for sorted price levels
//! - `FxHashMap` for order lookup by id
//! - `parking_lot` mutexes, never held across an `.await`
//! - Depth and top-of-book reads borrow instead of copying the ladder

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod feed;
pub mod observe;
pub mod orchestrator;
pub mod orderbook;
pub mod types;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use error::Error;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = Config::new(vec![config::PairConfig::new("BTC-USD").with_leg("coinbase", "BTC-USD")]);
        assert_eq!(config.pairs().len(), 1);
        assert!(config.validate().is_ok());
    }
}
