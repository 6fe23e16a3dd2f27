//! Bid acceptance rule
// region:    --- Imports
use crate::auction::model::{Amount, Auction};
use chrono::{DateTime, Utc};
use serde::Serialize;

// endregion: --- Imports

// region:    --- Decision
/// Why a bid was turned down
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotStarted,
    AuctionEnded,
    BidTooLow,
}

/// Outcome of evaluating a proposed bid against an auction snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum BidDecision {
    Accept {
        new_price: Amount,
        new_bidder: String,
    },
    Reject(RejectReason),
}

impl BidDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, BidDecision::Accept { .. })
    }

    /// Writes an accepted bid into the snapshot. Rejections leave it untouched.
    pub fn apply(&self, auction: &mut Auction) {
        if let BidDecision::Accept {
            new_price,
            new_bidder,
        } = self
        {
            auction.current_price = *new_price;
            auction.highest_bidder = Some(new_bidder.clone());
        }
    }
}

// endregion: --- Decision

// region:    --- Rule
/// Checks, in order: started, not ended, strictly above the current price.
/// The first failing check decides the rejection.
pub fn evaluate_bid(
    auction: &Auction,
    proposed_amount: Amount,
    bidder: &str,
    now: DateTime<Utc>,
) -> BidDecision {
    if now < auction.start_time {
        return BidDecision::Reject(RejectReason::NotStarted);
    }
    if now >= auction.end_time {
        return BidDecision::Reject(RejectReason::AuctionEnded);
    }
    if !proposed_amount.is_finite() || proposed_amount <= auction.current_price {
        return BidDecision::Reject(RejectReason::BidTooLow);
    }

    BidDecision::Accept {
        new_price: proposed_amount,
        new_bidder: bidder.to_string(),
    }
}

// endregion: --- Rule

// endregion: --- Tests
