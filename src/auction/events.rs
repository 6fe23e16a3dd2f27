use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{Amount, AuctionId};

/// Changes pushed live to everyone watching an auction
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum AuctionEvent {
    // accepted bid
    PriceChanged {
        auction_id: AuctionId,
        current_price: Amount,
        highest_bidder: String,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },
    // picked up by the closing sweep
    AuctionEnded {
        auction_id: AuctionId,
        final_price: Amount,
        winner: Option<String>,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },
    AuctionDeleted {
        auction_id: AuctionId,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },
}

impl AuctionEvent {
    pub fn auction_id(&self) -> AuctionId {
        match self {
            AuctionEvent::PriceChanged { auction_id, .. }
            | AuctionEvent::AuctionEnded { auction_id, .. }
            | AuctionEvent::AuctionDeleted { auction_id, .. } => *auction_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            AuctionEvent::PriceChanged { .. } => "PriceChanged",
            AuctionEvent::AuctionEnded { .. } => "AuctionEnded",
            AuctionEvent::AuctionDeleted { .. } => "AuctionDeleted",
        }
    }
}
