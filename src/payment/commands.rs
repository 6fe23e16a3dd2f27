//! Checkout, receipts and the won-items list
// region:    --- Imports
use super::model::{Payment, PaymentMethod};
use crate::auction::model::{AuctionId, AuctionView, PaymentStatus};
use crate::auction::status::is_winner;
use crate::error::{AuctionError, Result, StoreError};
use crate::identity::SessionContext;
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

// endregion: --- Imports

// region:    --- Submit
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPaymentCommand {
    pub method: Option<String>,
}

/// Keyed lookup; at most one payment exists per auction
pub async fn find_payment(store: &dyn Store, auction_id: AuctionId) -> Result<Option<Payment>> {
    Ok(store.find_payment(auction_id).await?)
}

/// Payer, payee and admins may see a payment
fn may_view(payment: &Payment, session: &SessionContext) -> bool {
    payment.payer.eq_ignore_ascii_case(session.email())
        || payment.seller.eq_ignore_ascii_case(session.email())
        || session.identity.is_admin()
}

/// The payment of one auction as seen by the caller
pub async fn view_payment(
    store: &dyn Store,
    session: &SessionContext,
    auction_id: AuctionId,
) -> Result<Payment> {
    let payment = find_payment(store, auction_id)
        .await?
        .ok_or_else(|| AuctionError::NotFound(format!("payment for auction {}", auction_id)))?;
    if !may_view(&payment, session) {
        return Err(AuctionError::Forbidden);
    }
    Ok(payment)
}

/// Records the winner's payment for the final price and marks the auction paid.
pub async fn submit_payment(
    store: &dyn Store,
    session: &SessionContext,
    auction_id: AuctionId,
    cmd: SubmitPaymentCommand,
    now: DateTime<Utc>,
) -> Result<Payment> {
    let auction = store
        .get_auction(auction_id)
        .await?
        .ok_or_else(|| AuctionError::NotFound(format!("auction {}", auction_id)))?;

    if !is_winner(&auction, session.email(), now) {
        return Err(AuctionError::NotWinner);
    }

    let method: PaymentMethod = cmd
        .method
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AuctionError::InvalidInput("please select a payment method".to_string()))?
        .parse()
        .map_err(AuctionError::InvalidInput)?;

    let payment = Payment {
        auction_id,
        payer: session.email().to_string(),
        amount: auction.current_price,
        method,
        status: PaymentStatus::Completed,
        seller: auction.seller.clone(),
        paid_at: now,
    };

    let stored = store.insert_payment(&payment).await.map_err(|e| match e {
        StoreError::Duplicate(_) => AuctionError::PaymentExists,
        other => other.into(),
    })?;
    info!(
        "{:<12} --> auction {} paid by {} via {}",
        "Payment", auction_id, stored.payer, stored.method
    );
    Ok(stored)
}

// endregion: --- Submit

// region:    --- Receipt
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub auction_id: AuctionId,
    /// `None` once the listing was deleted
    pub auction: Option<AuctionView>,
    pub auction_available: bool,
    pub payment: Option<Payment>,
    pub status: PaymentStatus,
}

/// A payment outlives its auction; the receipt then says the listing is gone.
pub async fn receipt(
    store: &dyn Store,
    session: &SessionContext,
    auction_id: AuctionId,
    now: DateTime<Utc>,
) -> Result<Receipt> {
    let auction = store.get_auction(auction_id).await?;
    let payment = store.find_payment(auction_id).await?;

    if auction.is_none() && payment.is_none() {
        return Err(AuctionError::NotFound(format!("auction {}", auction_id)));
    }

    if payment.as_ref().is_some_and(|p| !may_view(p, session)) {
        return Err(AuctionError::Forbidden);
    }

    let status = payment
        .as_ref()
        .map(|p| p.status)
        .unwrap_or(PaymentStatus::Pending);

    Ok(Receipt {
        auction_id,
        auction_available: auction.is_some(),
        auction: auction.map(|a| AuctionView::at(a, now)),
        payment,
        status,
    })
}

// endregion: --- Receipt

// region:    --- Won Items
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WonItem {
    #[serde(flatten)]
    pub auction: AuctionView,
    pub payment_status: PaymentStatus,
    pub can_pay: bool,
}

pub async fn won_items(
    store: &dyn Store,
    session: &SessionContext,
    now: DateTime<Utc>,
) -> Result<Vec<WonItem>> {
    let mut items = Vec::new();
    for auction in store.list_auctions().await? {
        if !is_winner(&auction, session.email(), now) {
            continue;
        }
        let payment_status = store
            .find_payment(auction.id)
            .await?
            .map(|p| p.status)
            .unwrap_or(PaymentStatus::Pending);
        items.push(WonItem {
            auction: AuctionView::at(auction, now),
            payment_status,
            can_pay: payment_status != PaymentStatus::Completed,
        });
    }
    Ok(items)
}

// endregion: --- Won Items

// endregion: --- Tests
