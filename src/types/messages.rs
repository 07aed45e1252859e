//! Canonical feed message types.
//!
//! Feed adapters normalize venue payloads into these types before they reach
//! the book. The JSON form is internally tagged by `type`:
//!
//! ```json
//! {"type": "insert", "order_id": "a1", "side": "buy", "price": "100.50", "size": "2"}
//! {"type": "match", "maker_order_id": "a1", "side": "buy", "filled_size": "0.4"}
//! {"type": "side_ready", "instrument": "BTC-USD", "side": "bid"}
//! ```

use serde::{Deserialize, Serialize};

use super::order::{OrderId, Side, SideTag};
use super::{Price, Size};

/// Incremental book update in canonical form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// New resting order
    Insert {
        /// Venue order id
        order_id: OrderId,
        /// Raw venue side label
        side: SideTag,
        /// Limit price
        price: Price,
        /// Resting size
        size: Size,
    },
    /// Trade against a resting (maker) order
    Match {
        /// Resting order that was hit
        maker_order_id: OrderId,
        /// Raw venue side label of the maker order
        side: SideTag,
        /// Quantity traded
        filled_size: Size,
    },
    /// Resting order resized in place
    Change {
        /// Venue order id
        order_id: OrderId,
        /// Raw venue side label
        side: SideTag,
        /// Size after the change
        new_size: Size,
    },
    /// Resting order cancelled or done
    Remove {
        /// Venue order id
        order_id: OrderId,
        /// Raw venue side label
        side: SideTag,
    },
}

impl FeedEvent {
    /// Build an insert from an already-resolved side
    pub fn insert(order_id: impl Into<OrderId>, side: Side, price: Price, size: Size) -> Self {
        FeedEvent::Insert {
            order_id: order_id.into(),
            side: side.into(),
            price,
            size,
        }
    }

    /// Build a match from an already-resolved side
    pub fn matched(maker_order_id: impl Into<OrderId>, side: Side, filled_size: Size) -> Self {
        FeedEvent::Match {
            maker_order_id: maker_order_id.into(),
            side: side.into(),
            filled_size,
        }
    }

    /// Build a change from an already-resolved side
    pub fn change(order_id: impl Into<OrderId>, side: Side, new_size: Size) -> Self {
        FeedEvent::Change {
            order_id: order_id.into(),
            side: side.into(),
            new_size,
        }
    }

    /// Build a remove from an already-resolved side
    pub fn remove(order_id: impl Into<OrderId>, side: Side) -> Self {
        FeedEvent::Remove {
            order_id: order_id.into(),
            side: side.into(),
        }
    }

    /// The raw side label carried by the event
    pub fn side_tag(&self) -> &SideTag {
        match self {
            FeedEvent::Insert { side, .. }
            | FeedEvent::Match { side, .. }
            | FeedEvent::Change { side, .. }
            | FeedEvent::Remove { side, .. } => side,
        }
    }

    /// The order the event refers to
    pub fn order_id(&self) -> &OrderId {
        match self {
            FeedEvent::Insert { order_id, .. }
            | FeedEvent::Change { order_id, .. }
            | FeedEvent::Remove { order_id, .. } => order_id,
            FeedEvent::Match { maker_order_id, .. } => maker_order_id,
        }
    }

    /// Short event name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            FeedEvent::Insert { .. } => "insert",
            FeedEvent::Match { .. } => "match",
            FeedEvent::Change { .. } => "change",
            FeedEvent::Remove { .. } => "remove",
        }
    }
}

/// Lifecycle signal from a feed adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlSignal {
    /// Initial replay for one side is complete
    SideReady {
        /// Instrument the signal is aimed at
        instrument: String,
        /// Side that finished replaying
        side: Side,
    },
    /// Book side must be rebuilt (reconnect, detected gap)
    Resync {
        /// Instrument the signal is aimed at
        instrument: String,
        /// Side to clear
        side: Side,
    },
}

impl ControlSignal {
    /// Instrument the signal is aimed at
    pub fn instrument(&self) -> &str {
        match self {
            ControlSignal::SideReady { instrument, .. } | ControlSignal::Resync { instrument, .. } => {
                instrument
            }
        }
    }
}

/// Anything a feed adapter can deliver to a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedMessage {
    /// Incremental book update
    Event(FeedEvent),
    /// Lifecycle signal
    Control(ControlSignal),
}

impl From<FeedEvent> for FeedMessage {
    fn from(event: FeedEvent) -> Self {
        FeedMessage::Event(event)
    }
}

impl From<ControlSignal> for FeedMessage {
    fn from(signal: ControlSignal) -> Self {
        FeedMessage::Control(signal)
    }
}
