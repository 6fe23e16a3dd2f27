use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::model::Auction;

/// Temporal phase of an auction. Derived from the clock on every read, never stored.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuctionStatus {
    Upcoming,
    Active,
    Ended,
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuctionStatus::Upcoming => "Upcoming",
            AuctionStatus::Active => "Active",
            AuctionStatus::Ended => "Ended",
        })
    }
}

impl FromStr for AuctionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upcoming" => Ok(AuctionStatus::Upcoming),
            "active" => Ok(AuctionStatus::Active),
            "ended" => Ok(AuctionStatus::Ended),
            other => Err(format!("unknown auction status: {}", other)),
        }
    }
}

/// Status of an auction spanning `[start_time, end_time)` at `now`
pub fn derive_status(
    now: DateTime<Utc>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> AuctionStatus {
    if now < start_time {
        AuctionStatus::Upcoming
    } else if now < end_time {
        AuctionStatus::Active
    } else {
        AuctionStatus::Ended
    }
}

/// `identity` won `auction` if it holds the highest bid once the auction has ended.
/// The seller's `is_active` visibility flag plays no part.
pub fn is_winner(auction: &Auction, identity: &str, now: DateTime<Utc>) -> bool {
    auction.status_at(now) == AuctionStatus::Ended
        && auction
            .highest_bidder
            .as_deref()
            .is_some_and(|bidder| bidder.eq_ignore_ascii_case(identity))
}

// endregion: --- Tests
