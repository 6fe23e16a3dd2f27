//! Listing lifecycle: create, read, hide, edit, delete
// region:    --- Imports
use super::events::AuctionEvent;
use super::model::{Amount, Auction, AuctionId, AuctionPatch, AuctionView, NewAuction, MAX_IMAGES};
use super::status::AuctionStatus;
use crate::error::{AuctionError, Result};
use crate::identity::{Capability, SessionContext};
use crate::images::{encode_images, ImageUpload};
use crate::live::EventPublisher;
use crate::store::Store;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::str::FromStr;
use tracing::{info, warn};

// endregion: --- Imports

/// Forms carry minute precision, so a start inside the current minute is not "past"
const START_TIME_GRACE_SECS: i64 = 60;

// region:    --- Create
/// Listing form. Every field is optional on the wire so a missing one is reported
/// as a validation error rather than a decode failure.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuctionCommand {
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub starting_price: Option<Amount>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub images: Vec<ImageUpload>,
}

fn required_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Validates the form in order and builds the record to insert.
pub fn validate_listing(
    cmd: &CreateAuctionCommand,
    seller: &str,
    now: DateTime<Utc>,
) -> Result<NewAuction> {
    let (
        Some(product_name),
        Some(description),
        Some(starting_price),
        Some(start_time),
        Some(end_time),
    ) = (
        required_text(&cmd.product_name),
        required_text(&cmd.description),
        cmd.starting_price,
        cmd.start_time,
        cmd.end_time,
    ) else {
        return Err(AuctionError::InvalidInput(
            "please fill in all required fields".to_string(),
        ));
    };

    if cmd.images.is_empty() {
        return Err(AuctionError::InvalidInput(
            "please upload at least one image".to_string(),
        ));
    }
    if cmd.images.len() > MAX_IMAGES {
        return Err(AuctionError::InvalidInput(format!(
            "you can upload a maximum of {} images",
            MAX_IMAGES
        )));
    }
    if !starting_price.is_finite() || starting_price <= 0.0 {
        return Err(AuctionError::InvalidInput(
            "starting price must be a positive number".to_string(),
        ));
    }
    if start_time < now - Duration::seconds(START_TIME_GRACE_SECS) {
        return Err(AuctionError::InvalidInput(
            "start time cannot be in the past".to_string(),
        ));
    }
    if end_time <= start_time {
        return Err(AuctionError::InvalidInput(
            "end time must be after the start time".to_string(),
        ));
    }

    let images = encode_images(&cmd.images)?;

    Ok(NewAuction {
        product_name,
        description,
        starting_price,
        start_time,
        end_time,
        seller: seller.to_string(),
        images,
        created_at: now,
    })
}

pub async fn create_auction(
    store: &dyn Store,
    session: &SessionContext,
    cmd: CreateAuctionCommand,
    now: DateTime<Utc>,
) -> Result<AuctionView> {
    session.identity.require(Capability::Sell)?;
    let new_auction = validate_listing(&cmd, session.email(), now)?;

    let auction = store.insert_auction(new_auction).await?;
    info!(
        "{:<12} --> listed auction {} ({}) for {}",
        "Command", auction.id, auction.product_name, auction.seller
    );
    Ok(AuctionView::at(auction, now))
}

// endregion: --- Create

// region:    --- Read
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            "priceasc" | "price-asc" => Ok(SortOrder::PriceAsc),
            "pricedesc" | "price-desc" => Ok(SortOrder::PriceDesc),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}

impl SortOrder {
    /// Ties keep the newest-first order the store returns
    fn apply(self, views: &mut [AuctionView]) {
        match self {
            SortOrder::Newest => {}
            SortOrder::Oldest => views.sort_by(|a, b| {
                a.auction
                    .created_at
                    .cmp(&b.auction.created_at)
                    .then(a.auction.id.cmp(&b.auction.id))
            }),
            SortOrder::PriceAsc => {
                views.sort_by(|a, b| a.auction.current_price.total_cmp(&b.auction.current_price))
            }
            SortOrder::PriceDesc => {
                views.sort_by(|a, b| b.auction.current_price.total_cmp(&a.auction.current_price))
            }
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ListFilter {
    pub status: Option<AuctionStatus>,
    pub search: Option<String>,
    pub sort: SortOrder,
}

/// Case-insensitive match over product name and description
pub fn matches_search(auction: &Auction, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    auction.product_name.to_lowercase().contains(&term)
        || auction.description.to_lowercase().contains(&term)
}

/// Filters auctions already in newest-first order, then sorts them.
pub fn filter_views(
    auctions: Vec<Auction>,
    filter: &ListFilter,
    now: DateTime<Utc>,
) -> Vec<AuctionView> {
    let mut views: Vec<AuctionView> = auctions
        .into_iter()
        .filter(|a| filter.search.as_deref().map_or(true, |t| matches_search(a, t)))
        .map(|a| AuctionView::at(a, now))
        .filter(|v| filter.status.map_or(true, |s| v.status == s))
        .collect();
    filter.sort.apply(&mut views);
    views
}

pub async fn list_auctions(
    store: &dyn Store,
    filter: &ListFilter,
    now: DateTime<Utc>,
) -> Result<Vec<AuctionView>> {
    let auctions = store.list_auctions().await?;
    Ok(filter_views(auctions, filter, now))
}

pub async fn get_auction(
    store: &dyn Store,
    id: AuctionId,
    now: DateTime<Utc>,
) -> Result<AuctionView> {
    let auction = store
        .get_auction(id)
        .await?
        .ok_or_else(|| AuctionError::NotFound(format!("auction {}", id)))?;
    Ok(AuctionView::at(auction, now))
}

// endregion: --- Read

// region:    --- Owner Or Admin
async fn load_owned(store: &dyn Store, session: &SessionContext, id: AuctionId) -> Result<Auction> {
    let auction = store
        .get_auction(id)
        .await?
        .ok_or_else(|| AuctionError::NotFound(format!("auction {}", id)))?;
    if auction.is_sold_by(session.email()) || session.identity.is_admin() {
        Ok(auction)
    } else {
        Err(AuctionError::Forbidden)
    }
}

pub async fn delete_auction(
    store: &dyn Store,
    publisher: &dyn EventPublisher,
    session: &SessionContext,
    id: AuctionId,
    now: DateTime<Utc>,
) -> Result<()> {
    load_owned(store, session, id).await?;
    if !store.delete_auction(id).await? {
        return Err(AuctionError::NotFound(format!("auction {}", id)));
    }
    info!("{:<12} --> auction {} deleted by {}", "Command", id, session.email());

    let event = AuctionEvent::AuctionDeleted {
        auction_id: id,
        timestamp: now,
    };
    if let Err(e) = publisher.publish(&event).await {
        warn!("{:<12} --> failed to publish deletion: {}", "Command", e);
    }
    Ok(())
}

pub async fn set_visibility(
    store: &dyn Store,
    session: &SessionContext,
    id: AuctionId,
    is_active: bool,
    now: DateTime<Utc>,
) -> Result<AuctionView> {
    load_owned(store, session, id).await?;
    let patch = AuctionPatch {
        is_active: Some(is_active),
        ..AuctionPatch::default()
    };
    let auction = store
        .update_auction(id, &patch)
        .await?
        .ok_or_else(|| AuctionError::NotFound(format!("auction {}", id)))?;
    Ok(AuctionView::at(auction, now))
}

// endregion: --- Owner Or Admin

// region:    --- Admin Edit
/// Admin overwrite of end time, visibility and payment status
pub async fn update_auction(
    store: &dyn Store,
    session: &SessionContext,
    id: AuctionId,
    patch: AuctionPatch,
    now: DateTime<Utc>,
) -> Result<AuctionView> {
    session.identity.require(Capability::Administer)?;
    if patch.is_empty() {
        return Err(AuctionError::InvalidInput("nothing to update".to_string()));
    }

    let current = store
        .get_auction(id)
        .await?
        .ok_or_else(|| AuctionError::NotFound(format!("auction {}", id)))?;
    if let Some(end_time) = patch.end_time {
        if end_time <= current.start_time {
            return Err(AuctionError::InvalidInput(
                "end time must be after the start time".to_string(),
            ));
        }
    }

    let auction = store
        .update_auction(id, &patch)
        .await?
        .ok_or_else(|| AuctionError::NotFound(format!("auction {}", id)))?;
    info!("{:<12} --> auction {} edited by {}", "Command", id, session.email());
    Ok(AuctionView::at(auction, now))
}

// endregion: --- Admin Edit

// endregion: --- Tests
