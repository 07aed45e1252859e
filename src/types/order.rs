//! Order-related types.
//!
//! This module contains the book side, the raw side label a venue delivers,
//! the opaque order identifier, and the resting order owned by a book side.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::{Price, Size};
use crate::error::Error;

/// Book side (bids or asks)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Resting buy interest; best = highest price
    Bid,
    /// Resting sell interest; best = lowest price
    Ask,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    /// Plural label used in logs and warm-up notices
    pub fn label(self) -> &'static str {
        match self {
            Side::Bid => "bids",
            Side::Ask => "asks",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Ask => write!(f, "ask"),
        }
    }
}

/// Side label exactly as a venue delivered it.
///
/// Venues disagree on vocabulary (`buy`/`sell`, `bid`/`ask`, `bids`/`asks`),
/// so events carry the raw tag and the book resolves it at routing time.
/// A tag that resolves to neither side is an [`Error::InvalidSide`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SideTag(String);

impl SideTag {
    /// Wrap a raw venue label
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw label
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve the label to a book side
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSide`] if the label names neither side.
    pub fn resolve(&self) -> Result<Side, Error> {
        let raw = self.0.trim();
        if ["bid", "bids", "buy"].iter().any(|t| raw.eq_ignore_ascii_case(t)) {
            Ok(Side::Bid)
        } else if ["ask", "asks", "sell", "offer"]
            .iter()
            .any(|t| raw.eq_ignore_ascii_case(t))
        {
            Ok(Side::Ask)
        } else {
            Err(Error::InvalidSide(self.0.clone()))
        }
    }
}

impl From<Side> for SideTag {
    fn from(side: Side) -> Self {
        Self(side.to_string())
    }
}

impl From<&str> for SideTag {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Opaque venue order identifier.
///
/// Some venues use UUID strings, others integers; both deserialize into the
/// same string-backed id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Create an id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for OrderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for OrderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => OrderId(s),
            RawId::Unsigned(n) => OrderId(n.to_string()),
            RawId::Signed(n) => OrderId(n.to_string()),
        })
    }
}

/// A live order resting on one side of the book
///
/// Owned by the [`OrderBook`](crate::orderbook::OrderBook) that inserted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Venue order id
    pub id: OrderId,
    /// Limit price
    pub price: Price,
    /// Quantity still resting
    pub remaining_size: Size,
    /// Book side
    pub side: Side,
}

impl Order {
    /// Create a resting order
    pub fn new(id: OrderId, side: Side, price: Price, size: Size) -> Self {
        Self {
            id,
            price,
            remaining_size: size,
            side,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Bid.opposite(), Side::Ask);
        assert_eq!(Side::Ask.opposite(), Side::Bid);
    }

    #[test]
    fn test_side_tag_vocabulary() {
        for raw in ["bid", "BIDS", "buy", " Buy "] {
            assert_eq!(SideTag::from(raw).resolve().unwrap(), Side::Bid, "{raw}");
        }
        for raw in ["ask", "asks", "SELL", "offer"] {
            assert_eq!(SideTag::from(raw).resolve().unwrap(), Side::Ask, "{raw}");
        }
    }

    #[test]
    fn test_side_tag_invalid() {
        let err = SideTag::from("middle").resolve().unwrap_err();
        assert!(matches!(err, Error::InvalidSide(ref s) if s == "middle"));
    }

    #[test]
    fn test_order_id_from_string_or_number() {
        let a: OrderId = serde_json::from_str("\"d50ec984-77a8-460a-b958-66f114b0de9b\"").unwrap();
        assert_eq!(a.as_str(), "d50ec984-77a8-460a-b958-66f114b0de9b");

        let b: OrderId = serde_json::from_str("1234567").unwrap();
        assert_eq!(b, OrderId::from(1234567u64));
    }

    #[test]
    fn test_serde_side() {
        let json = serde_json::to_string(&Side::Bid).unwrap();
        assert_eq!(json, "\"bid\"");

        let side: Side = serde_json::from_str("\"ask\"").unwrap();
        assert_eq!(side, Side::Ask);
    }
}
