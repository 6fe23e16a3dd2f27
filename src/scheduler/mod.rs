//! Closing sweep.
//!
//! Status is derived on read, so nothing here writes one. The sweep only announces
//! each ended auction once: a notice to the seller, one to the winner, and an
//! `AuctionEnded` event for live viewers.
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::auction::model::Auction;
use crate::error::StoreError;
use crate::live::EventPublisher;
use crate::notification::{NewNotification, NotificationKind};
use crate::store::Store;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

// endregion: --- Imports

// region:    --- Auction Scheduler
pub struct AuctionScheduler {
    store: Arc<dyn Store>,
    publisher: Arc<dyn EventPublisher>,
    period: Duration,
}

impl AuctionScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        publisher: Arc<dyn EventPublisher>,
        period: Duration,
    ) -> Self {
        Self {
            store,
            publisher,
            period,
        }
    }

    /// Spawns the sweep loop
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        info!("{:<12} --> closing sweep every {:?}", "Scheduler", self.period);
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep(Utc::now()).await {
                    error!("{:<12} --> closing sweep failed: {}", "Scheduler", e);
                }
            }
        })
    }

    /// Announces every auction ended by `now` that was not announced before.
    /// Returns the auctions announced by this call.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<Vec<Auction>, StoreError> {
        let ended = self.store.claim_ended_auctions(now).await?;
        if ended.is_empty() {
            return Ok(ended);
        }

        for auction in &ended {
            self.announce(auction, now).await;
        }
        debug!("{:<12} --> announced {} ended auctions", "Scheduler", ended.len());
        Ok(ended)
    }

    async fn announce(&self, auction: &Auction, now: DateTime<Utc>) {
        let mut notices = vec![NewNotification {
            recipient: auction.seller.clone(),
            auction_id: auction.id,
            kind: NotificationKind::AuctionClosed,
            message: match &auction.highest_bidder {
                Some(winner) => format!(
                    "Your auction for {} has ended. {} won it at {:.2}.",
                    auction.product_name, winner, auction.current_price
                ),
                None => format!(
                    "Your auction for {} has ended without any bids.",
                    auction.product_name
                ),
            },
            created_at: now,
        }];
        if let Some(winner) = &auction.highest_bidder {
            notices.push(NewNotification {
                recipient: winner.clone(),
                auction_id: auction.id,
                kind: NotificationKind::AuctionWon,
                message: format!(
                    "Congratulations! You won {} for {:.2}. Proceed to payment.",
                    auction.product_name, auction.current_price
                ),
                created_at: now,
            });
        }

        for notice in notices {
            if let Err(e) = self.store.push_notification(notice).await {
                warn!(
                    "{:<12} --> notice for auction {} not recorded: {}",
                    "Scheduler", auction.id, e
                );
            }
        }

        let event = AuctionEvent::AuctionEnded {
            auction_id: auction.id,
            final_price: auction.current_price,
            winner: auction.highest_bidder.clone(),
            timestamp: now,
        };
        if let Err(e) = self.publisher.publish(&event).await {
            warn!("{:<12} --> failed to publish auction end: {}", "Scheduler", e);
        }
    }
}
// endregion: --- Auction Scheduler

// endregion: --- Tests
