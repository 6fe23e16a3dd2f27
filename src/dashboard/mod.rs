//! Seller and admin dashboards, and the admin's account edits and removals
// region:    --- Imports
use crate::auction::commands::{filter_views, ListFilter};
use crate::auction::events::AuctionEvent;
use crate::auction::model::{AuctionView, PaymentStatus};
use crate::auction::status::AuctionStatus;
use crate::error::{AuctionError, Result};
use crate::identity::accounts::{SellerPatch, SellerProfile, UserPatch, UserProfile};
use crate::identity::{Capability, IdentityProvider, SessionContext};
use crate::live::EventPublisher;
use crate::notification::Notification;
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Seller Dashboard
#[derive(Debug, Serialize, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: usize,
    pub active: usize,
    pub upcoming: usize,
    pub ended: usize,
}

impl StatusCounts {
    fn tally<'a>(views: impl IntoIterator<Item = &'a AuctionView>) -> Self {
        let mut counts = StatusCounts::default();
        for view in views {
            counts.total += 1;
            match view.status {
                AuctionStatus::Active => counts.active += 1,
                AuctionStatus::Upcoming => counts.upcoming += 1,
                AuctionStatus::Ended => counts.ended += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SellerListing {
    #[serde(flatten)]
    pub auction: AuctionView,
    /// From the payment record; `Pending` until one exists
    pub settlement: PaymentStatus,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SellerDashboard {
    pub profile: SellerProfile,
    pub counts: StatusCounts,
    pub auctions: Vec<SellerListing>,
    pub notifications: Vec<Notification>,
}

pub async fn seller_dashboard(
    store: &dyn Store,
    session: &SessionContext,
    status: Option<AuctionStatus>,
    now: DateTime<Utc>,
) -> Result<SellerDashboard> {
    let profile = store
        .get_seller(&session.identity.uid)
        .await?
        .ok_or(AuctionError::Forbidden)?;

    let all = filter_views(
        store.list_auctions_by_seller(&profile.email).await?,
        &ListFilter::default(),
        now,
    );
    let counts = StatusCounts::tally(&all);

    let mut auctions = Vec::new();
    for view in all.into_iter().filter(|v| status.map_or(true, |s| v.status == s)) {
        let settlement = store
            .find_payment(view.auction.id)
            .await?
            .map(|p| p.status)
            .unwrap_or(PaymentStatus::Pending);
        auctions.push(SellerListing {
            auction: view,
            settlement,
        });
    }

    let notifications = store.notifications_for(&profile.email).await?;

    Ok(SellerDashboard {
        profile,
        counts,
        auctions,
        notifications,
    })
}

// endregion: --- Seller Dashboard

// region:    --- Admin Dashboard
#[derive(Debug, Serialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: usize,
    pub total_sellers: usize,
    pub active_auctions: usize,
    pub pending_payments: usize,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    pub stats: AdminStats,
    pub users: Vec<UserProfile>,
    pub sellers: Vec<SellerProfile>,
    pub auctions: Vec<AuctionView>,
}

fn contains_term(fields: &[&str], term: &str) -> bool {
    fields.iter().any(|f| f.to_lowercase().contains(term))
}

/// Stats cover everything; `search` narrows only the listed rows.
pub async fn admin_dashboard(
    store: &dyn Store,
    session: &SessionContext,
    search: Option<&str>,
    now: DateTime<Utc>,
) -> Result<AdminDashboard> {
    session.identity.require(Capability::Administer)?;

    let users = store.list_users().await?;
    let sellers = store.list_sellers().await?;
    let auctions = store.list_auctions().await?;

    let stats = AdminStats {
        total_users: users.len(),
        total_sellers: sellers.len(),
        active_auctions: auctions.iter().filter(|a| a.is_active).count(),
        pending_payments: auctions
            .iter()
            .filter(|a| a.payment_status == PaymentStatus::Pending)
            .count(),
    };

    let term = search.map(str::trim).unwrap_or_default().to_lowercase();
    let users = users
        .into_iter()
        .filter(|u| contains_term(&[u.name.as_str(), u.email.as_str(), u.city.as_str()], &term))
        .collect();
    let sellers = sellers
        .into_iter()
        .filter(|s| {
            contains_term(
                &[
                    s.business_name.as_str(),
                    s.seller_name.as_str(),
                    s.email.as_str(),
                    s.city.as_str(),
                ],
                &term,
            )
        })
        .collect();
    let auctions = auctions
        .into_iter()
        .filter(|a| {
            contains_term(
                &[
                    a.product_name.as_str(),
                    a.seller.as_str(),
                    a.payment_status.as_str(),
                ],
                &term,
            )
        })
        .map(|a| AuctionView::at(a, now))
        .collect();

    Ok(AdminDashboard {
        stats,
        users,
        sellers,
        auctions,
    })
}

// endregion: --- Admin Dashboard

// region:    --- Account Edits
pub async fn update_user(
    store: &dyn Store,
    session: &SessionContext,
    uid: &str,
    patch: UserPatch,
) -> Result<UserProfile> {
    session.identity.require(Capability::Administer)?;
    if patch.is_empty() {
        return Err(AuctionError::InvalidInput("nothing to update".to_string()));
    }
    let mut profile = store
        .get_user(uid)
        .await?
        .ok_or_else(|| AuctionError::NotFound(format!("user {}", uid)))?;
    patch.apply_to(&mut profile)?;
    store.put_user(&profile).await?;
    info!("{:<12} --> user {} edited by {}", "Admin", profile.email, session.email());
    Ok(profile)
}

pub async fn update_seller(
    store: &dyn Store,
    session: &SessionContext,
    uid: &str,
    patch: SellerPatch,
) -> Result<SellerProfile> {
    session.identity.require(Capability::Administer)?;
    if patch.is_empty() {
        return Err(AuctionError::InvalidInput("nothing to update".to_string()));
    }
    let mut profile = store
        .get_seller(uid)
        .await?
        .ok_or_else(|| AuctionError::NotFound(format!("seller {}", uid)))?;
    patch.apply_to(&mut profile)?;
    store.put_seller(&profile).await?;
    info!("{:<12} --> seller {} edited by {}", "Admin", profile.email, session.email());
    Ok(profile)
}

// endregion: --- Account Edits

// region:    --- Account Removal
pub async fn delete_user(
    store: &dyn Store,
    identity: &dyn IdentityProvider,
    session: &SessionContext,
    uid: &str,
) -> Result<UserProfile> {
    session.identity.require(Capability::Administer)?;
    let profile = store
        .delete_user(uid)
        .await?
        .ok_or_else(|| AuctionError::NotFound(format!("user {}", uid)))?;
    identity.remove(uid).await?;
    info!("{:<12} --> user {} removed by {}", "Admin", profile.email, session.email());
    Ok(profile)
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SellerRemoval {
    pub seller: SellerProfile,
    pub deleted_auctions: Vec<i64>,
}

/// Removes a seller together with every listing they own.
pub async fn delete_seller(
    store: &dyn Store,
    identity: &dyn IdentityProvider,
    publisher: &dyn EventPublisher,
    session: &SessionContext,
    uid: &str,
    now: DateTime<Utc>,
) -> Result<SellerRemoval> {
    session.identity.require(Capability::Administer)?;
    let seller = store
        .delete_seller(uid)
        .await?
        .ok_or_else(|| AuctionError::NotFound(format!("seller {}", uid)))?;
    let deleted_auctions = store.delete_auctions_by_seller(&seller.email).await?;
    identity.remove(uid).await?;
    info!(
        "{:<12} --> seller {} and {} auctions removed by {}",
        "Admin",
        seller.email,
        deleted_auctions.len(),
        session.email()
    );

    for auction_id in &deleted_auctions {
        let event = AuctionEvent::AuctionDeleted {
            auction_id: *auction_id,
            timestamp: now,
        };
        if let Err(e) = publisher.publish(&event).await {
            warn!("{:<12} --> failed to publish deletion: {}", "Admin", e);
        }
    }

    Ok(SellerRemoval {
        seller,
        deleted_auctions,
    })
}

// endregion: --- Account Removal

// endregion: --- Tests
