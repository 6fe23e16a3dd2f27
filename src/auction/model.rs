use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::status::{derive_status, AuctionStatus};

pub type AuctionId = i64;
pub type Amount = f64;

/// Maximum number of images per listing
pub const MAX_IMAGES: usize = 5;

/// Settlement state of a sold item
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

/// A listed item and its running price
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub id: AuctionId,
    pub product_name: String,
    pub description: String,
    pub starting_price: Amount,
    pub current_price: Amount,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end_time: DateTime<Utc>,
    pub seller: String,
    pub highest_bidder: Option<String>,
    pub is_active: bool,
    pub payment_status: PaymentStatus,
    pub images: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Auction {
    pub fn status_at(&self, now: DateTime<Utc>) -> AuctionStatus {
        derive_status(now, self.start_time, self.end_time)
    }

    pub fn is_sold_by(&self, email: &str) -> bool {
        self.seller.eq_ignore_ascii_case(email)
    }
}

/// Fields a seller fixes when listing an item
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuction {
    pub product_name: String,
    pub description: String,
    pub starting_price: Amount,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub seller: String,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Whole-field overwrites an admin or the owning seller may apply
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionPatch {
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub payment_status: Option<PaymentStatus>,
}

impl AuctionPatch {
    pub fn is_empty(&self) -> bool {
        self.end_time.is_none() && self.is_active.is_none() && self.payment_status.is_none()
    }

    pub fn apply(&self, auction: &mut Auction) {
        if let Some(end_time) = self.end_time {
            auction.end_time = end_time;
        }
        if let Some(is_active) = self.is_active {
            auction.is_active = is_active;
        }
        if let Some(payment_status) = self.payment_status {
            auction.payment_status = payment_status;
        }
    }
}

/// An auction as shown to a reader, with its status derived at read time
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuctionView {
    #[serde(flatten)]
    pub auction: Auction,
    pub status: AuctionStatus,
}

impl AuctionView {
    pub fn at(auction: Auction, now: DateTime<Utc>) -> Self {
        let status = auction.status_at(now);
        Self { auction, status }
    }
}
