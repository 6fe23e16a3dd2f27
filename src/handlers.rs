// region:    --- Imports
use crate::auction::commands::{self as auctions, CreateAuctionCommand, ListFilter, SortOrder};
use crate::auction::model::{Auction, AuctionId, AuctionPatch, AuctionView};
use crate::auction::status::AuctionStatus;
use crate::bidding::commands::{place_bid, PlaceBidCommand};
use crate::dashboard::{self, AdminDashboard, SellerDashboard, SellerRemoval};
use crate::error::{AuctionError, Result};
use crate::extract::{Body, PathParam, QueryParams};
use crate::identity::accounts::{
    SellerPatch, SellerProfile, SellerRegistration, UserPatch, UserProfile, UserRegistration,
};
use crate::identity::commands::{self as accounts, Registered, SignInCommand};
use crate::identity::{Identity, Session, SessionContext};
use crate::images::ImageUpload;
use crate::notification::Notification;
use crate::payment::commands::{self as payments, Receipt, SubmitPaymentCommand, WonItem};
use crate::payment::model::Payment;
use crate::state::AppState;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::convert::Infallible;
use std::str::FromStr;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

// endregion: --- Imports

/// Up to five images per listing travel in one request
const MAX_BODY_BYTES: usize = 1024 * 1024 * 20;

// region:    --- Router
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/auth/register", post(handle_register_user))
        .route("/auth/register-seller", post(handle_register_seller))
        .route("/auth/login", post(handle_sign_in))
        .route("/auth/seller-login", post(handle_seller_sign_in))
        .route("/auth/logout", post(handle_sign_out))
        .route("/auth/me", get(handle_me))
        .route("/auctions", get(handle_list_auctions).post(handle_create_auction))
        .route(
            "/auctions/:id",
            get(handle_get_auction)
                .patch(handle_update_auction)
                .delete(handle_delete_auction),
        )
        .route("/auctions/:id/visibility", put(handle_set_visibility))
        .route("/auctions/:id/bids", post(handle_bid))
        .route("/auctions/:id/live", get(handle_live))
        .route(
            "/auctions/:id/payment",
            get(handle_get_payment).post(handle_submit_payment),
        )
        .route("/auctions/:id/receipt", get(handle_receipt))
        .route("/me/won", get(handle_won_items))
        .route("/me/notifications", get(handle_notifications))
        .route("/seller/dashboard", get(handle_seller_dashboard))
        .route("/admin/dashboard", get(handle_admin_dashboard))
        .route(
            "/admin/users/:uid",
            patch(handle_update_user).delete(handle_delete_user),
        )
        .route(
            "/admin/sellers/:uid",
            patch(handle_update_seller).delete(handle_delete_seller),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

// endregion: --- Router

// region:    --- Account Handlers
pub async fn handle_register_user(
    State(state): State<AppState>,
    Body(form): Body<UserRegistration>,
) -> Result<(StatusCode, Json<Registered<UserProfile>>)> {
    let registered =
        accounts::register_user(state.store.as_ref(), state.identity.as_ref(), form).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

pub async fn handle_register_seller(
    State(state): State<AppState>,
    Body(form): Body<SellerRegistration>,
) -> Result<(StatusCode, Json<Registered<SellerProfile>>)> {
    let registered = accounts::register_seller(
        state.store.as_ref(),
        state.identity.as_ref(),
        form,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

pub async fn handle_sign_in(
    State(state): State<AppState>,
    Body(cmd): Body<SignInCommand>,
) -> Result<Json<Session>> {
    Ok(Json(accounts::sign_in(state.identity.as_ref(), cmd).await?))
}

pub async fn handle_seller_sign_in(
    State(state): State<AppState>,
    Body(cmd): Body<SignInCommand>,
) -> Result<Json<Session>> {
    let session =
        accounts::sign_in_seller(state.store.as_ref(), state.identity.as_ref(), cmd).await?;
    Ok(Json(session))
}

pub async fn handle_sign_out(
    State(state): State<AppState>,
    session: SessionContext,
) -> Result<StatusCode> {
    accounts::sign_out(state.identity.as_ref(), &session).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_me(session: SessionContext) -> Json<Identity> {
    Json(session.identity)
}

// endregion: --- Account Handlers

// region:    --- Auction Handlers
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
}

/// Blank means "not given"
fn parse_optional<T>(raw: Option<&str>) -> Result<Option<T>>
where
    T: FromStr<Err = String>,
{
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(AuctionError::InvalidInput))
        .transpose()
}

pub async fn handle_list_auctions(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<Vec<AuctionView>>> {
    let filter = ListFilter {
        status: parse_optional::<AuctionStatus>(query.status.as_deref())?,
        search: query.search,
        sort: parse_optional::<SortOrder>(query.sort.as_deref())?.unwrap_or_default(),
    };
    let views = auctions::list_auctions(state.store.as_ref(), &filter, Utc::now()).await?;
    Ok(Json(views))
}

pub async fn handle_get_auction(
    State(state): State<AppState>,
    PathParam(id): PathParam<AuctionId>,
) -> Result<Json<AuctionView>> {
    Ok(Json(auctions::get_auction(state.store.as_ref(), id, Utc::now()).await?))
}

/// Milliseconds since the epoch or RFC 3339
fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(millis) = raw.parse::<i64>() {
        return Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| AuctionError::InvalidInput(format!("invalid time: {}", raw)));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| AuctionError::InvalidInput(format!("invalid time: {}", raw)))
}

async fn read_listing_form(
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<CreateAuctionCommand> {
    let mut multipart = multipart?;
    let mut cmd = CreateAuctionCommand::default();
    let bad_form =
        |e: axum::extract::multipart::MultipartError| AuctionError::InvalidInput(e.body_text());

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        if name.starts_with("image") {
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(bad_form)?;
            cmd.images.push(ImageUpload::new(content_type, bytes.to_vec()));
            continue;
        }

        let text = field.text().await.map_err(bad_form)?;
        if text.trim().is_empty() {
            continue;
        }
        match name.as_str() {
            "productName" => cmd.product_name = Some(text),
            "description" => cmd.description = Some(text),
            // unparsable prices fail the positive-number check
            "startingPrice" => cmd.starting_price = Some(text.trim().parse().unwrap_or(f64::NAN)),
            "startTime" => cmd.start_time = Some(parse_time(&text)?),
            "endTime" => cmd.end_time = Some(parse_time(&text)?),
            other => debug!("{:<12} --> ignoring form field {}", "Handler", other),
        }
    }
    Ok(cmd)
}

pub async fn handle_create_auction(
    State(state): State<AppState>,
    session: SessionContext,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<AuctionView>)> {
    let cmd = read_listing_form(multipart).await?;
    let view = auctions::create_auction(state.store.as_ref(), &session, cmd, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn handle_update_auction(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(id): PathParam<AuctionId>,
    Body(patch): Body<AuctionPatch>,
) -> Result<Json<AuctionView>> {
    let view =
        auctions::update_auction(state.store.as_ref(), &session, id, patch, Utc::now()).await?;
    Ok(Json(view))
}

pub async fn handle_delete_auction(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(id): PathParam<AuctionId>,
) -> Result<StatusCode> {
    auctions::delete_auction(
        state.store.as_ref(),
        state.publisher.as_ref(),
        &session,
        id,
        Utc::now(),
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityBody {
    pub is_active: bool,
}

pub async fn handle_set_visibility(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(id): PathParam<AuctionId>,
    Body(body): Body<VisibilityBody>,
) -> Result<Json<AuctionView>> {
    let now = Utc::now();
    let view =
        auctions::set_visibility(state.store.as_ref(), &session, id, body.is_active, now).await?;
    Ok(Json(view))
}

pub async fn handle_bid(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(id): PathParam<AuctionId>,
    Body(cmd): Body<PlaceBidCommand>,
) -> Result<Json<Auction>> {
    let auction = place_bid(
        state.store.as_ref(),
        state.publisher.as_ref(),
        &session,
        id,
        cmd,
        Utc::now(),
    )
    .await?;
    info!(
        "{:<12} --> auction {} now at {} by {}",
        "Handler",
        id,
        auction.current_price,
        session.email()
    );
    Ok(Json(auction))
}

/// Server-sent events for one auction: `PriceChanged`, `AuctionEnded`, `AuctionDeleted`
pub async fn handle_live(
    State(state): State<AppState>,
    PathParam(id): PathParam<AuctionId>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    auctions::get_auction(state.store.as_ref(), id, Utc::now()).await?;
    debug!("{:<12} --> viewer joined auction {}", "Handler", id);

    let stream = state.live.watch(id).filter_map(|event| {
        Event::default()
            .event(event.event_type())
            .json_data(&event)
            .ok()
            .map(Ok)
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// endregion: --- Auction Handlers

// region:    --- Payment Handlers
pub async fn handle_submit_payment(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(id): PathParam<AuctionId>,
    Body(cmd): Body<SubmitPaymentCommand>,
) -> Result<(StatusCode, Json<Payment>)> {
    let payment =
        payments::submit_payment(state.store.as_ref(), &session, id, cmd, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn handle_get_payment(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(id): PathParam<AuctionId>,
) -> Result<Json<Payment>> {
    Ok(Json(payments::view_payment(state.store.as_ref(), &session, id).await?))
}

pub async fn handle_receipt(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(id): PathParam<AuctionId>,
) -> Result<Json<Receipt>> {
    Ok(Json(payments::receipt(state.store.as_ref(), &session, id, Utc::now()).await?))
}

pub async fn handle_won_items(
    State(state): State<AppState>,
    session: SessionContext,
) -> Result<Json<Vec<WonItem>>> {
    Ok(Json(payments::won_items(state.store.as_ref(), &session, Utc::now()).await?))
}

pub async fn handle_notifications(
    State(state): State<AppState>,
    session: SessionContext,
) -> Result<Json<Vec<Notification>>> {
    Ok(Json(state.store.notifications_for(session.email()).await?))
}

// endregion: --- Payment Handlers

// region:    --- Dashboard Handlers
pub async fn handle_seller_dashboard(
    State(state): State<AppState>,
    session: SessionContext,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<SellerDashboard>> {
    let status = parse_optional::<AuctionStatus>(query.status.as_deref())?;
    let view =
        dashboard::seller_dashboard(state.store.as_ref(), &session, status, Utc::now()).await?;
    Ok(Json(view))
}

pub async fn handle_admin_dashboard(
    State(state): State<AppState>,
    session: SessionContext,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<AdminDashboard>> {
    let view = dashboard::admin_dashboard(
        state.store.as_ref(),
        &session,
        query.search.as_deref(),
        Utc::now(),
    )
    .await?;
    Ok(Json(view))
}

pub async fn handle_update_user(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(uid): PathParam<String>,
    Body(patch): Body<UserPatch>,
) -> Result<Json<UserProfile>> {
    let profile = dashboard::update_user(state.store.as_ref(), &session, &uid, patch).await?;
    Ok(Json(profile))
}

pub async fn handle_update_seller(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(uid): PathParam<String>,
    Body(patch): Body<SellerPatch>,
) -> Result<Json<SellerProfile>> {
    let profile = dashboard::update_seller(state.store.as_ref(), &session, &uid, patch).await?;
    Ok(Json(profile))
}

pub async fn handle_delete_user(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(uid): PathParam<String>,
) -> Result<Json<UserProfile>> {
    let (store, identity) = (state.store.as_ref(), state.identity.as_ref());
    let removed = dashboard::delete_user(store, identity, &session, &uid).await?;
    Ok(Json(removed))
}

pub async fn handle_delete_seller(
    State(state): State<AppState>,
    session: SessionContext,
    PathParam(uid): PathParam<String>,
) -> Result<Json<SellerRemoval>> {
    let removed = dashboard::delete_seller(
        state.store.as_ref(),
        state.identity.as_ref(),
        state.publisher.as_ref(),
        &session,
        &uid,
        Utc::now(),
    )
    .await?;
    Ok(Json(removed))
}

// endregion: --- Dashboard Handlers
