//! Bid placement
// region:    --- Imports
use super::rules::{evaluate_bid, BidDecision, RejectReason};
use crate::auction::events::AuctionEvent;
use crate::auction::model::{Amount, Auction, AuctionId};
use crate::error::{AuctionError, Result};
use crate::identity::{Capability, SessionContext};
use crate::live::EventPublisher;
use crate::notification::{NewNotification, NotificationKind};
use crate::store::{BidWrite, Store};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Commands
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBidCommand {
    /// Anything that is not a number, or no amount at all, counts as a bid of nothing
    #[serde(default = "no_amount", deserialize_with = "lenient_amount")]
    pub amount: Amount,
    /// Price the bidder was looking at. Absent means "whatever is stored now".
    #[serde(default)]
    pub observed_price: Option<Amount>,
}

fn no_amount() -> Amount {
    f64::NAN
}

fn lenient_amount<'de, D>(deserializer: D) -> std::result::Result<Amount, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}

fn rejection(reason: RejectReason, current_price: Amount) -> AuctionError {
    match reason {
        RejectReason::NotStarted => AuctionError::NotStarted,
        RejectReason::AuctionEnded => AuctionError::AuctionEnded,
        RejectReason::BidTooLow => AuctionError::BidTooLow { current_price },
    }
}

/// Places a bid for the signed-in identity.
///
/// The rule runs against the auction as the bidder saw it and the write only
/// lands if the stored price still matches, so two bidders who saw the same
/// price cannot both win.
pub async fn place_bid(
    store: &dyn Store,
    publisher: &dyn EventPublisher,
    session: &SessionContext,
    auction_id: AuctionId,
    cmd: PlaceBidCommand,
    now: DateTime<Utc>,
) -> Result<Auction> {
    info!(
        "{:<12} --> bid on auction {}: {:?} by {}",
        "Command",
        auction_id,
        cmd,
        session.email()
    );
    session.identity.require(Capability::Bid)?;

    let stored = store
        .get_auction(auction_id)
        .await?
        .ok_or_else(|| AuctionError::NotFound(format!("auction {}", auction_id)))?;

    if stored.is_sold_by(session.email()) {
        return Err(AuctionError::SellerCannotBid);
    }

    let mut observed = stored.clone();
    if let Some(price) = cmd.observed_price {
        observed.current_price = price;
    }
    let previous_bidder = stored.highest_bidder.clone();

    let (new_price, new_bidder) = match evaluate_bid(&observed, cmd.amount, session.email(), now) {
        BidDecision::Accept {
            new_price,
            new_bidder,
        } => (new_price, new_bidder),
        BidDecision::Reject(reason) => {
            info!("{:<12} --> bid rejected: {:?}", "Command", reason);
            return Err(rejection(reason, stored.current_price));
        }
    };

    let updated = match store
        .compare_and_set_bid(auction_id, observed.current_price, new_price, &new_bidder)
        .await?
    {
        BidWrite::Applied(auction) => auction,
        BidWrite::Conflict { current_price } => {
            warn!(
                "{:<12} --> stale bid on auction {}: saw {}, stored {}",
                "Command", auction_id, observed.current_price, current_price
            );
            return Err(AuctionError::StalePrice { current_price });
        }
        BidWrite::Missing => {
            return Err(AuctionError::NotFound(format!("auction {}", auction_id)));
        }
    };

    let event = AuctionEvent::PriceChanged {
        auction_id,
        current_price: new_price,
        highest_bidder: new_bidder.clone(),
        timestamp: now,
    };
    if let Err(e) = publisher.publish(&event).await {
        warn!("{:<12} --> failed to publish price change: {}", "Command", e);
    }

    if let Some(outbid) = previous_bidder.filter(|p| !p.eq_ignore_ascii_case(&new_bidder)) {
        let notification = NewNotification {
            recipient: outbid,
            auction_id,
            kind: NotificationKind::Outbid,
            message: format!(
                "You have been outbid on {}. The price is now {:.2}.",
                updated.product_name, new_price
            ),
            created_at: now,
        };
        if let Err(e) = store.push_notification(notification).await {
            warn!("{:<12} --> failed to record outbid notice: {}", "Command", e);
        }
    }

    Ok(updated)
}

// endregion: --- Commands

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::model::PaymentStatus;
    use crate::identity::{Identity, Role};
    use crate::live::LiveFeed;
    use crate::store::{AuctionStore, InMemoryStore, NotificationStore};
    use chrono::Duration;

    fn session(email: &str) -> SessionContext {
        SessionContext {
            token: format!("token-{}", email),
            identity: Identity {
                uid: format!("uid-{}", email),
                email: email.to_string(),
                role: Role::User,
            },
        }
    }

    fn bid(amount: Amount, observed_price: Option<Amount>) -> PlaceBidCommand {
        PlaceBidCommand {
            amount,
            observed_price,
        }
    }

    async fn running_auction(store: &InMemoryStore, now: DateTime<Utc>) -> Auction {
        store
            .seed_auction(Auction {
                id: 1,
                product_name: "Vintage Camera".to_string(),
                description: "A camera".to_string(),
                starting_price: 100.0,
                current_price: 100.0,
                start_time: now - Duration::hours(1),
                end_time: now + Duration::hours(1),
                seller: "seller@example.com".to_string(),
                highest_bidder: None,
                is_active: true,
                payment_status: PaymentStatus::Pending,
                images: vec![],
                created_at: now - Duration::hours(2),
            })
            .await
    }

    #[tokio::test]
    async fn accepted_bid_moves_price_and_publishes() {
        let store = InMemoryStore::new();
        let feed = LiveFeed::new(8);
        let mut events = feed.subscribe_all();
        let now = Utc::now();
        let auction = running_auction(&store, now).await;

        let alice = session("alice@example.com");
        let updated = place_bid(&store, &feed, &alice, auction.id, bid(150.0, None), now)
            .await
            .unwrap();

        assert_eq!(updated.current_price, 150.0);
        assert_eq!(updated.highest_bidder.as_deref(), Some("alice@example.com"));
        assert!(matches!(
            events.recv().await.unwrap(),
            AuctionEvent::PriceChanged { current_price, .. } if current_price == 150.0
        ));
    }

    #[tokio::test]
    async fn same_observed_price_lets_only_one_bidder_through() {
        let store = InMemoryStore::new();
        let feed = LiveFeed::new(8);
        let now = Utc::now();
        let auction = running_auction(&store, now).await;

        let (a, b) = (session("a@example.com"), session("b@example.com"));
        let first = place_bid(&store, &feed, &a, auction.id, bid(101.0, Some(100.0)), now).await;
        let second = place_bid(&store, &feed, &b, auction.id, bid(101.0, Some(100.0)), now).await;

        assert!(first.is_ok());
        assert_eq!(second, Err(AuctionError::StalePrice { current_price: 101.0 }));
        let stored = store.get_auction(auction.id).await.unwrap().unwrap();
        assert_eq!(stored.highest_bidder.as_deref(), Some("a@example.com"));
    }

    #[tokio::test]
    async fn low_bid_reports_current_price() {
        let store = InMemoryStore::new();
        let feed = LiveFeed::new(8);
        let now = Utc::now();
        let auction = running_auction(&store, now).await;

        let bidder = session("a@example.com");
        let result = place_bid(&store, &feed, &bidder, auction.id, bid(100.0, None), now).await;
        assert_eq!(result, Err(AuctionError::BidTooLow { current_price: 100.0 }));
    }

    #[tokio::test]
    async fn seller_cannot_bid_on_own_listing() {
        let store = InMemoryStore::new();
        let feed = LiveFeed::new(8);
        let now = Utc::now();
        let auction = running_auction(&store, now).await;

        let seller = session("SELLER@example.com");
        let result = place_bid(&store, &feed, &seller, auction.id, bid(500.0, None), now).await;
        assert_eq!(result, Err(AuctionError::SellerCannotBid));
    }

    #[tokio::test]
    async fn missing_auction_is_not_found() {
        let store = InMemoryStore::new();
        let feed = LiveFeed::new(8);
        let bidder = session("a@example.com");
        let result = place_bid(&store, &feed, &bidder, 42, bid(500.0, None), Utc::now()).await;
        assert!(matches!(result, Err(AuctionError::NotFound(_))));
    }

    #[tokio::test]
    async fn previous_bidder_gets_outbid_notice() {
        let store = InMemoryStore::new();
        let feed = LiveFeed::new(8);
        let now = Utc::now();
        let auction = running_auction(&store, now).await;

        let (a, b) = (session("a@example.com"), session("b@example.com"));
        for (bidder, amount) in [(&a, 110.0), (&b, 120.0), (&b, 130.0)] {
            place_bid(&store, &feed, bidder, auction.id, bid(amount, None), now)
                .await
                .unwrap();
        }

        let for_a = store.notifications_for("a@example.com").await.unwrap();
        assert_eq!(for_a.len(), 1);
        assert_eq!(for_a[0].kind, NotificationKind::Outbid);
        assert!(store.notifications_for("b@example.com").await.unwrap().is_empty());
    }

    #[test]
    fn non_numeric_amounts_become_nan() {
        let cmd: PlaceBidCommand = serde_json::from_str(r#"{"amount":"abc"}"#).unwrap();
        assert!(cmd.amount.is_nan());
        let cmd: PlaceBidCommand = serde_json::from_str("{}").unwrap();
        assert!(cmd.amount.is_nan());
        let cmd: PlaceBidCommand = serde_json::from_str(r#"{"amount":null}"#).unwrap();
        assert!(cmd.amount.is_nan());
        let cmd: PlaceBidCommand =
            serde_json::from_str(r#"{"amount":"150.5","observedPrice":100}"#).unwrap();
        assert_eq!(cmd.amount, 150.5);
        assert_eq!(cmd.observed_price, Some(100.0));
    }
}
// endregion: --- Tests
