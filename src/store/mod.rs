//! Persistence seams.
//!
//! Records live under `auctions/{id}`, `payments/{auction_id}`, `users/{uid}`,
//! `sellers/{uid}` and `notifications/{id}`. Every write touches a single record
//! except [`PaymentStore::insert_payment`], which also flips the auction's payment
//! status in the same transaction. Sign-in credentials sit apart from profiles in
//! an [`AccountStore`].
pub mod in_memory;
pub mod postgres;

// region:    --- Imports
use crate::auction::model::{Amount, Auction, AuctionId, AuctionPatch, NewAuction};
use crate::error::StoreError;
use crate::identity::accounts::{SellerProfile, UserProfile};
use crate::identity::Identity;
use crate::notification::{NewNotification, Notification};
use crate::payment::model::Payment;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

// endregion: --- Imports

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a conditional bid write
#[derive(Debug, Clone, PartialEq)]
pub enum BidWrite {
    /// The price still matched and the bid was written
    Applied(Auction),
    /// Someone else moved the price first; carries the price now stored
    Conflict { current_price: Amount },
    Missing,
}

/// Salted password hash of one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identity: Identity,
    pub salt: String,
    pub password_hash: String,
}

// region:    --- Store Traits
#[async_trait]
pub trait AuctionStore: Send + Sync {
    async fn insert_auction(&self, auction: NewAuction) -> StoreResult<Auction>;

    async fn get_auction(&self, id: AuctionId) -> StoreResult<Option<Auction>>;

    /// Newest first
    async fn list_auctions(&self) -> StoreResult<Vec<Auction>>;

    async fn list_auctions_by_seller(&self, seller: &str) -> StoreResult<Vec<Auction>>;

    async fn update_auction(&self, id: AuctionId, patch: &AuctionPatch)
        -> StoreResult<Option<Auction>>;

    async fn delete_auction(&self, id: AuctionId) -> StoreResult<bool>;

    async fn delete_auctions_by_seller(&self, seller: &str) -> StoreResult<Vec<AuctionId>>;

    /// Writes `amount`/`bidder` only if the stored price still equals `expected_price`.
    async fn compare_and_set_bid(
        &self,
        id: AuctionId,
        expected_price: Amount,
        amount: Amount,
        bidder: &str,
    ) -> StoreResult<BidWrite>;

    /// Claims every auction ended by `now` that was not claimed before.
    /// Each auction is returned by exactly one call.
    async fn claim_ended_auctions(&self, now: DateTime<Utc>) -> StoreResult<Vec<Auction>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the auction already has a payment.
    async fn insert_payment(&self, payment: &Payment) -> StoreResult<Payment>;

    async fn find_payment(&self, auction_id: AuctionId) -> StoreResult<Option<Payment>>;

    async fn list_payments(&self) -> StoreResult<Vec<Payment>>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn put_user(&self, profile: &UserProfile) -> StoreResult<()>;

    async fn get_user(&self, uid: &str) -> StoreResult<Option<UserProfile>>;

    async fn list_users(&self) -> StoreResult<Vec<UserProfile>>;

    async fn delete_user(&self, uid: &str) -> StoreResult<Option<UserProfile>>;

    async fn put_seller(&self, profile: &SellerProfile) -> StoreResult<()>;

    async fn get_seller(&self, uid: &str) -> StoreResult<Option<SellerProfile>>;

    async fn list_sellers(&self) -> StoreResult<Vec<SellerProfile>>;

    async fn delete_seller(&self, uid: &str) -> StoreResult<Option<SellerProfile>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn push_notification(&self, notification: NewNotification) -> StoreResult<Notification>;

    /// Newest first
    async fn notifications_for(&self, recipient: &str) -> StoreResult<Vec<Notification>>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the email is taken, ignoring case.
    async fn insert_account(&self, credentials: &Credentials) -> StoreResult<()>;

    async fn account_by_email(&self, email: &str) -> StoreResult<Option<Credentials>>;

    async fn account_by_uid(&self, uid: &str) -> StoreResult<Option<Credentials>>;

    async fn delete_account(&self, uid: &str) -> StoreResult<Option<Credentials>>;
}

/// Everything the service persists apart from credentials
pub trait Store: AuctionStore + PaymentStore + ProfileStore + NotificationStore {}

impl<T> Store for T where T: AuctionStore + PaymentStore + ProfileStore + NotificationStore {}

// endregion: --- Store Traits
