// region:    --- Imports
use super::{
    AccountStore, AuctionStore, BidWrite, Credentials, NotificationStore, PaymentStore,
    ProfileStore, StoreResult,
};
use crate::auction::model::{Amount, Auction, AuctionId, AuctionPatch, NewAuction};
use crate::database::DatabaseManager;
use crate::error::StoreError;
use crate::identity::accounts::{SellerProfile, UserProfile};
use crate::identity::{Identity, Role};
use crate::notification::{NewNotification, Notification};
use crate::payment::model::Payment;
use crate::query::queries;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Row};
use std::sync::Arc;
use tracing::{debug, info};

// endregion: --- Imports

// region:    --- Rows
#[derive(FromRow)]
struct AuctionRow {
    id: i64,
    product_name: String,
    description: String,
    starting_price: f64,
    current_price: f64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    seller: String,
    highest_bidder: Option<String>,
    is_active: bool,
    payment_status: String,
    images: Vec<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuctionRow> for Auction {
    type Error = StoreError;

    fn try_from(row: AuctionRow) -> Result<Self, Self::Error> {
        Ok(Auction {
            id: row.id,
            product_name: row.product_name,
            description: row.description,
            starting_price: row.starting_price,
            current_price: row.current_price,
            start_time: row.start_time,
            end_time: row.end_time,
            seller: row.seller,
            highest_bidder: row.highest_bidder,
            is_active: row.is_active,
            payment_status: row.payment_status.parse().map_err(StoreError::Unavailable)?,
            images: row.images,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct PaymentRow {
    auction_id: i64,
    payer: String,
    amount: f64,
    method: String,
    status: String,
    seller: String,
    paid_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            auction_id: row.auction_id,
            payer: row.payer,
            amount: row.amount,
            method: row.method.parse().map_err(StoreError::Unavailable)?,
            status: row.status.parse().map_err(StoreError::Unavailable)?,
            seller: row.seller,
            paid_at: row.paid_at,
        })
    }
}

#[derive(FromRow)]
struct UserRow {
    uid: String,
    name: String,
    email: String,
    gender: String,
    city: String,
    role: String,
}

impl TryFrom<UserRow> for UserProfile {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(UserProfile {
            uid: row.uid,
            name: row.name,
            email: row.email,
            gender: row.gender,
            city: row.city,
            role: row.role.parse::<Role>().map_err(StoreError::Unavailable)?,
        })
    }
}

#[derive(FromRow)]
struct SellerRow {
    uid: String,
    business_name: String,
    seller_name: String,
    email: String,
    phone: String,
    address: String,
    city: String,
    role: String,
    approved: bool,
    date_joined: DateTime<Utc>,
}

impl TryFrom<SellerRow> for SellerProfile {
    type Error = StoreError;

    fn try_from(row: SellerRow) -> Result<Self, Self::Error> {
        Ok(SellerProfile {
            uid: row.uid,
            business_name: row.business_name,
            seller_name: row.seller_name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            city: row.city,
            role: row.role.parse::<Role>().map_err(StoreError::Unavailable)?,
            approved: row.approved,
            date_joined: row.date_joined,
        })
    }
}

#[derive(FromRow)]
struct NotificationRow {
    id: i64,
    recipient: String,
    auction_id: i64,
    kind: String,
    message: String,
    created_at: DateTime<Utc>,
    read: bool,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            recipient: row.recipient,
            auction_id: row.auction_id,
            kind: row.kind.parse().map_err(StoreError::Unavailable)?,
            message: row.message,
            created_at: row.created_at,
            read: row.read,
        })
    }
}

#[derive(FromRow)]
struct AccountRow {
    uid: String,
    email: String,
    role: String,
    salt: String,
    password_hash: String,
}

impl TryFrom<AccountRow> for Credentials {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Credentials {
            identity: Identity {
                uid: row.uid,
                email: row.email,
                role: row.role.parse::<Role>().map_err(StoreError::Unavailable)?,
            },
            salt: row.salt,
            password_hash: row.password_hash,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

fn convert_opt<R, T>(row: Option<R>) -> StoreResult<Option<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    row.map(T::try_from).transpose()
}

// endregion: --- Rows

// region:    --- Postgres Store
/// Store backed by the PostgreSQL schema in `src/sql`
#[derive(Clone)]
pub struct PostgresStore {
    db_manager: Arc<DatabaseManager>,
}

impl PostgresStore {
    pub fn new(db_manager: Arc<DatabaseManager>) -> Self {
        Self { db_manager }
    }
}

#[async_trait]
impl AuctionStore for PostgresStore {
    async fn insert_auction(&self, new: NewAuction) -> StoreResult<Auction> {
        let row = sqlx::query_as::<_, AuctionRow>(queries::INSERT_AUCTION)
            .bind(&new.product_name)
            .bind(&new.description)
            .bind(new.starting_price)
            .bind(new.start_time)
            .bind(new.end_time)
            .bind(&new.seller)
            .bind(&new.images)
            .bind(new.created_at)
            .fetch_one(self.db_manager.pool())
            .await?;
        info!("{:<12} --> auction stored id: {}", "Postgres", row.id);
        row.try_into()
    }

    async fn get_auction(&self, id: AuctionId) -> StoreResult<Option<Auction>> {
        debug!("{:<12} --> auction lookup id: {}", "Postgres", id);
        let row = sqlx::query_as::<_, AuctionRow>(queries::GET_AUCTION)
            .bind(id)
            .fetch_optional(self.db_manager.pool())
            .await?;
        convert_opt(row)
    }

    async fn list_auctions(&self) -> StoreResult<Vec<Auction>> {
        let rows = sqlx::query_as::<_, AuctionRow>(queries::GET_ALL_AUCTIONS)
            .fetch_all(self.db_manager.pool())
            .await?;
        convert_all(rows)
    }

    async fn list_auctions_by_seller(&self, seller: &str) -> StoreResult<Vec<Auction>> {
        let rows = sqlx::query_as::<_, AuctionRow>(queries::GET_SELLER_AUCTIONS)
            .bind(seller)
            .fetch_all(self.db_manager.pool())
            .await?;
        convert_all(rows)
    }

    async fn update_auction(
        &self,
        id: AuctionId,
        patch: &AuctionPatch,
    ) -> StoreResult<Option<Auction>> {
        let row = sqlx::query_as::<_, AuctionRow>(queries::UPDATE_AUCTION)
            .bind(id)
            .bind(patch.end_time)
            .bind(patch.is_active)
            .bind(patch.payment_status.map(|s| s.as_str()))
            .fetch_optional(self.db_manager.pool())
            .await?;
        convert_opt(row)
    }

    async fn delete_auction(&self, id: AuctionId) -> StoreResult<bool> {
        let result = sqlx::query(queries::DELETE_AUCTION)
            .bind(id)
            .execute(self.db_manager.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_auctions_by_seller(&self, seller: &str) -> StoreResult<Vec<AuctionId>> {
        let ids = sqlx::query_scalar::<_, i64>(queries::DELETE_SELLER_AUCTIONS)
            .bind(seller)
            .fetch_all(self.db_manager.pool())
            .await?;
        Ok(ids)
    }

    async fn compare_and_set_bid(
        &self,
        id: AuctionId,
        expected_price: Amount,
        amount: Amount,
        bidder: &str,
    ) -> StoreResult<BidWrite> {
        let bidder = bidder.to_string();
        self.db_manager
            .transaction(|tx| {
                Box::pin(async move {
                    let updated = sqlx::query_as::<_, AuctionRow>(queries::COMPARE_AND_SET_BID)
                        .bind(id)
                        .bind(expected_price)
                        .bind(amount)
                        .bind(&bidder)
                        .fetch_optional(&mut **tx)
                        .await?;
                    if let Some(row) = updated {
                        return Ok(BidWrite::Applied(row.try_into()?));
                    }

                    let current = sqlx::query(queries::GET_AUCTION_CURRENT_PRICE)
                        .bind(id)
                        .fetch_optional(&mut **tx)
                        .await?;
                    Ok(match current {
                        Some(row) => BidWrite::Conflict {
                            current_price: row.try_get("current_price")?,
                        },
                        None => BidWrite::Missing,
                    })
                })
            })
            .await
    }

    async fn claim_ended_auctions(&self, now: DateTime<Utc>) -> StoreResult<Vec<Auction>> {
        let rows = sqlx::query_as::<_, AuctionRow>(queries::CLAIM_ENDED_AUCTIONS)
            .bind(now)
            .fetch_all(self.db_manager.pool())
            .await?;
        convert_all(rows)
    }
}

#[async_trait]
impl PaymentStore for PostgresStore {
    async fn insert_payment(&self, payment: &Payment) -> StoreResult<Payment> {
        let payment = payment.clone();
        self.db_manager
            .transaction(|tx| {
                Box::pin(async move {
                    let row = sqlx::query_as::<_, PaymentRow>(queries::INSERT_PAYMENT)
                        .bind(payment.auction_id)
                        .bind(&payment.payer)
                        .bind(payment.amount)
                        .bind(payment.method.as_str())
                        .bind(payment.status.as_str())
                        .bind(&payment.seller)
                        .bind(payment.paid_at)
                        .fetch_one(&mut **tx)
                        .await?;

                    sqlx::query(queries::UPDATE_AUCTION_PAYMENT_STATUS)
                        .bind(payment.auction_id)
                        .bind(payment.status.as_str())
                        .execute(&mut **tx)
                        .await?;

                    Payment::try_from(row)
                })
            })
            .await
    }

    async fn find_payment(&self, auction_id: AuctionId) -> StoreResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(queries::GET_PAYMENT)
            .bind(auction_id)
            .fetch_optional(self.db_manager.pool())
            .await?;
        convert_opt(row)
    }

    async fn list_payments(&self) -> StoreResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(queries::GET_ALL_PAYMENTS)
            .fetch_all(self.db_manager.pool())
            .await?;
        convert_all(rows)
    }
}

#[async_trait]
impl ProfileStore for PostgresStore {
    async fn put_user(&self, profile: &UserProfile) -> StoreResult<()> {
        sqlx::query(queries::PUT_USER)
            .bind(&profile.uid)
            .bind(&profile.name)
            .bind(&profile.email)
            .bind(&profile.gender)
            .bind(&profile.city)
            .bind(profile.role.as_str())
            .execute(self.db_manager.pool())
            .await?;
        Ok(())
    }

    async fn get_user(&self, uid: &str) -> StoreResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, UserRow>(queries::GET_USER)
            .bind(uid)
            .fetch_optional(self.db_manager.pool())
            .await?;
        convert_opt(row)
    }

    async fn list_users(&self) -> StoreResult<Vec<UserProfile>> {
        let rows = sqlx::query_as::<_, UserRow>(queries::GET_ALL_USERS)
            .fetch_all(self.db_manager.pool())
            .await?;
        convert_all(rows)
    }

    async fn delete_user(&self, uid: &str) -> StoreResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, UserRow>(queries::DELETE_USER)
            .bind(uid)
            .fetch_optional(self.db_manager.pool())
            .await?;
        convert_opt(row)
    }

    async fn put_seller(&self, profile: &SellerProfile) -> StoreResult<()> {
        sqlx::query(queries::PUT_SELLER)
            .bind(&profile.uid)
            .bind(&profile.business_name)
            .bind(&profile.seller_name)
            .bind(&profile.email)
            .bind(&profile.phone)
            .bind(&profile.address)
            .bind(&profile.city)
            .bind(profile.role.as_str())
            .bind(profile.approved)
            .bind(profile.date_joined)
            .execute(self.db_manager.pool())
            .await?;
        Ok(())
    }

    async fn get_seller(&self, uid: &str) -> StoreResult<Option<SellerProfile>> {
        let row = sqlx::query_as::<_, SellerRow>(queries::GET_SELLER)
            .bind(uid)
            .fetch_optional(self.db_manager.pool())
            .await?;
        convert_opt(row)
    }

    async fn list_sellers(&self) -> StoreResult<Vec<SellerProfile>> {
        let rows = sqlx::query_as::<_, SellerRow>(queries::GET_ALL_SELLERS)
            .fetch_all(self.db_manager.pool())
            .await?;
        convert_all(rows)
    }

    async fn delete_seller(&self, uid: &str) -> StoreResult<Option<SellerProfile>> {
        let row = sqlx::query_as::<_, SellerRow>(queries::DELETE_SELLER)
            .bind(uid)
            .fetch_optional(self.db_manager.pool())
            .await?;
        convert_opt(row)
    }
}

#[async_trait]
impl NotificationStore for PostgresStore {
    async fn push_notification(&self, new: NewNotification) -> StoreResult<Notification> {
        let row = sqlx::query_as::<_, NotificationRow>(queries::INSERT_NOTIFICATION)
            .bind(&new.recipient)
            .bind(new.auction_id)
            .bind(new.kind.as_str())
            .bind(&new.message)
            .bind(new.created_at)
            .fetch_one(self.db_manager.pool())
            .await?;
        row.try_into()
    }

    async fn notifications_for(&self, recipient: &str) -> StoreResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(queries::GET_NOTIFICATIONS)
            .bind(recipient)
            .fetch_all(self.db_manager.pool())
            .await?;
        convert_all(rows)
    }
}

#[async_trait]
impl AccountStore for PostgresStore {
    async fn insert_account(&self, credentials: &Credentials) -> StoreResult<()> {
        sqlx::query(queries::INSERT_ACCOUNT)
            .bind(&credentials.identity.uid)
            .bind(&credentials.identity.email)
            .bind(credentials.identity.role.as_str())
            .bind(&credentials.salt)
            .bind(&credentials.password_hash)
            .execute(self.db_manager.pool())
            .await?;
        debug!("{:<12} --> account {} stored", "Postgres", credentials.identity.uid);
        Ok(())
    }

    async fn account_by_email(&self, email: &str) -> StoreResult<Option<Credentials>> {
        let row = sqlx::query_as::<_, AccountRow>(queries::GET_ACCOUNT_BY_EMAIL)
            .bind(email)
            .fetch_optional(self.db_manager.pool())
            .await?;
        convert_opt(row)
    }

    async fn account_by_uid(&self, uid: &str) -> StoreResult<Option<Credentials>> {
        let row = sqlx::query_as::<_, AccountRow>(queries::GET_ACCOUNT_BY_UID)
            .bind(uid)
            .fetch_optional(self.db_manager.pool())
            .await?;
        convert_opt(row)
    }

    async fn delete_account(&self, uid: &str) -> StoreResult<Option<Credentials>> {
        let row = sqlx::query_as::<_, AccountRow>(queries::DELETE_ACCOUNT)
            .bind(uid)
            .fetch_optional(self.db_manager.pool())
            .await?;
        convert_opt(row)
    }
}

// endregion: --- Postgres Store
