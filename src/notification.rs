use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::auction::model::AuctionId;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Outbid,
    AuctionClosed,
    AuctionWon,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Outbid => "Outbid",
            NotificationKind::AuctionClosed => "AuctionClosed",
            NotificationKind::AuctionWon => "AuctionWon",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Outbid" => Ok(NotificationKind::Outbid),
            "AuctionClosed" => Ok(NotificationKind::AuctionClosed),
            "AuctionWon" => Ok(NotificationKind::AuctionWon),
            other => Err(format!("unknown notification kind: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub recipient: String,
    pub auction_id: AuctionId,
    pub kind: NotificationKind,
    pub message: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub recipient: String,
    pub auction_id: AuctionId,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
