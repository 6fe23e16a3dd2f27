//! Store kept in process memory. Used by tests and local runs without PostgreSQL.
// region:    --- Imports
use super::{
    AccountStore, AuctionStore, BidWrite, Credentials, NotificationStore, PaymentStore,
    ProfileStore, StoreResult,
};
use crate::auction::model::{Amount, Auction, AuctionId, AuctionPatch, NewAuction, PaymentStatus};
use crate::error::StoreError;
use crate::identity::accounts::{SellerProfile, UserProfile};
use crate::notification::{NewNotification, Notification};
use crate::payment::model::Payment;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

// endregion: --- Imports

#[derive(Default)]
struct Tables {
    next_auction_id: AuctionId,
    next_notification_id: i64,
    auctions: BTreeMap<AuctionId, Auction>,
    // auction -> when the closing sweep claimed it
    claimed: HashMap<AuctionId, DateTime<Utc>>,
    payments: HashMap<AuctionId, Payment>,
    users: BTreeMap<String, UserProfile>,
    sellers: BTreeMap<String, SellerProfile>,
    notifications: Vec<Notification>,
    // keyed by uid
    accounts: BTreeMap<String, Credentials>,
}

/// Cloning shares the same tables
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail with [`StoreError::Unavailable`] until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    /// Inserts a fully formed auction as-is, keeping its id. Test fixtures use it to
    /// seed auctions whose start time already lies in the past.
    pub async fn seed_auction(&self, auction: Auction) -> Auction {
        let mut tables = self.tables.write().await;
        tables.next_auction_id = tables.next_auction_id.max(auction.id);
        tables.auctions.insert(auction.id, auction.clone());
        auction
    }
}

fn newest_first(mut auctions: Vec<Auction>) -> Vec<Auction> {
    auctions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    auctions
}

#[async_trait]
impl AuctionStore for InMemoryStore {
    async fn insert_auction(&self, new: NewAuction) -> StoreResult<Auction> {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;
        tables.next_auction_id += 1;
        let auction = Auction {
            id: tables.next_auction_id,
            product_name: new.product_name,
            description: new.description,
            starting_price: new.starting_price,
            current_price: new.starting_price,
            start_time: new.start_time,
            end_time: new.end_time,
            seller: new.seller,
            highest_bidder: None,
            is_active: false,
            payment_status: PaymentStatus::Pending,
            images: new.images,
            created_at: new.created_at,
        };
        tables.auctions.insert(auction.id, auction.clone());
        Ok(auction)
    }

    async fn get_auction(&self, id: AuctionId) -> StoreResult<Option<Auction>> {
        self.ensure_online()?;
        Ok(self.tables.read().await.auctions.get(&id).cloned())
    }

    async fn list_auctions(&self) -> StoreResult<Vec<Auction>> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        Ok(newest_first(tables.auctions.values().cloned().collect()))
    }

    async fn list_auctions_by_seller(&self, seller: &str) -> StoreResult<Vec<Auction>> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .auctions
                .values()
                .filter(|a| a.is_sold_by(seller))
                .cloned()
                .collect(),
        ))
    }

    async fn update_auction(
        &self,
        id: AuctionId,
        patch: &AuctionPatch,
    ) -> StoreResult<Option<Auction>> {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;
        let Some(auction) = tables.auctions.get_mut(&id) else {
            return Ok(None);
        };
        patch.apply(auction);
        let updated = auction.clone();

        // reopened past its closing announcement, so it has to be announced again
        if tables
            .claimed
            .get(&id)
            .is_some_and(|claimed_at| updated.end_time > *claimed_at)
        {
            tables.claimed.remove(&id);
        }
        Ok(Some(updated))
    }

    async fn delete_auction(&self, id: AuctionId) -> StoreResult<bool> {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;
        tables.claimed.remove(&id);
        Ok(tables.auctions.remove(&id).is_some())
    }

    async fn delete_auctions_by_seller(&self, seller: &str) -> StoreResult<Vec<AuctionId>> {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;
        let ids: Vec<AuctionId> = tables
            .auctions
            .values()
            .filter(|a| a.is_sold_by(seller))
            .map(|a| a.id)
            .collect();
        for id in &ids {
            tables.auctions.remove(id);
            tables.claimed.remove(id);
        }
        Ok(ids)
    }

    async fn compare_and_set_bid(
        &self,
        id: AuctionId,
        expected_price: Amount,
        amount: Amount,
        bidder: &str,
    ) -> StoreResult<BidWrite> {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;
        let Some(auction) = tables.auctions.get_mut(&id) else {
            return Ok(BidWrite::Missing);
        };
        if auction.current_price != expected_price {
            return Ok(BidWrite::Conflict {
                current_price: auction.current_price,
            });
        }
        auction.current_price = amount;
        auction.highest_bidder = Some(bidder.to_string());
        Ok(BidWrite::Applied(auction.clone()))
    }

    async fn claim_ended_auctions(&self, now: DateTime<Utc>) -> StoreResult<Vec<Auction>> {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;
        let ended: Vec<Auction> = tables
            .auctions
            .values()
            .filter(|a| a.end_time <= now && !tables.claimed.contains_key(&a.id))
            .cloned()
            .collect();
        for auction in &ended {
            tables.claimed.insert(auction.id, now);
        }
        Ok(ended)
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn insert_payment(&self, payment: &Payment) -> StoreResult<Payment> {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;
        if tables.payments.contains_key(&payment.auction_id) {
            return Err(StoreError::Duplicate(format!(
                "payment for auction {}",
                payment.auction_id
            )));
        }
        tables.payments.insert(payment.auction_id, payment.clone());
        if let Some(auction) = tables.auctions.get_mut(&payment.auction_id) {
            auction.payment_status = payment.status;
        }
        Ok(payment.clone())
    }

    async fn find_payment(&self, auction_id: AuctionId) -> StoreResult<Option<Payment>> {
        self.ensure_online()?;
        Ok(self.tables.read().await.payments.get(&auction_id).cloned())
    }

    async fn list_payments(&self) -> StoreResult<Vec<Payment>> {
        self.ensure_online()?;
        let mut payments: Vec<Payment> =
            self.tables.read().await.payments.values().cloned().collect();
        payments.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
        Ok(payments)
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn put_user(&self, profile: &UserProfile) -> StoreResult<()> {
        self.ensure_online()?;
        self.tables
            .write()
            .await
            .users
            .insert(profile.uid.clone(), profile.clone());
        Ok(())
    }

    async fn get_user(&self, uid: &str) -> StoreResult<Option<UserProfile>> {
        self.ensure_online()?;
        Ok(self.tables.read().await.users.get(uid).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<UserProfile>> {
        self.ensure_online()?;
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn delete_user(&self, uid: &str) -> StoreResult<Option<UserProfile>> {
        self.ensure_online()?;
        Ok(self.tables.write().await.users.remove(uid))
    }

    async fn put_seller(&self, profile: &SellerProfile) -> StoreResult<()> {
        self.ensure_online()?;
        self.tables
            .write()
            .await
            .sellers
            .insert(profile.uid.clone(), profile.clone());
        Ok(())
    }

    async fn get_seller(&self, uid: &str) -> StoreResult<Option<SellerProfile>> {
        self.ensure_online()?;
        Ok(self.tables.read().await.sellers.get(uid).cloned())
    }

    async fn list_sellers(&self) -> StoreResult<Vec<SellerProfile>> {
        self.ensure_online()?;
        Ok(self.tables.read().await.sellers.values().cloned().collect())
    }

    async fn delete_seller(&self, uid: &str) -> StoreResult<Option<SellerProfile>> {
        self.ensure_online()?;
        Ok(self.tables.write().await.sellers.remove(uid))
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn push_notification(&self, new: NewNotification) -> StoreResult<Notification> {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;
        tables.next_notification_id += 1;
        let notification = Notification {
            id: tables.next_notification_id,
            recipient: new.recipient,
            auction_id: new.auction_id,
            kind: new.kind,
            message: new.message,
            created_at: new.created_at,
            read: false,
        };
        tables.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn notifications_for(&self, recipient: &str) -> StoreResult<Vec<Notification>> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        let mut found: Vec<Notification> = tables
            .notifications
            .iter()
            .filter(|n| n.recipient.eq_ignore_ascii_case(recipient))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(found)
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn insert_account(&self, credentials: &Credentials) -> StoreResult<()> {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;
        let email = &credentials.identity.email;
        if tables
            .accounts
            .values()
            .any(|a| a.identity.email.eq_ignore_ascii_case(email))
        {
            return Err(StoreError::Duplicate(format!("account {}", email)));
        }
        tables
            .accounts
            .insert(credentials.identity.uid.clone(), credentials.clone());
        Ok(())
    }

    async fn account_by_email(&self, email: &str) -> StoreResult<Option<Credentials>> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .values()
            .find(|a| a.identity.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn account_by_uid(&self, uid: &str) -> StoreResult<Option<Credentials>> {
        self.ensure_online()?;
        Ok(self.tables.read().await.accounts.get(uid).cloned())
    }

    async fn delete_account(&self, uid: &str) -> StoreResult<Option<Credentials>> {
        self.ensure_online()?;
        Ok(self.tables.write().await.accounts.remove(uid))
    }
}

// endregion: --- Tests
