// region:    --- Imports
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

// endregion: --- Imports

// region:    --- Store Error
/// Errors raised by a store implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("duplicate key: {0}")]
    Duplicate(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::Duplicate(db.message().to_string());
            }
        }
        StoreError::Unavailable(e.to_string())
    }
}

// endregion: --- Store Error

// region:    --- Auction Error
/// Every failure surfaced to a caller of the service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuctionError {
    #[error("this auction has not yet started")]
    NotStarted,
    #[error("this auction has ended")]
    AuctionEnded,
    #[error("your bid must be higher than the current price")]
    BidTooLow { current_price: f64 },
    #[error("the price changed since you last saw it, please bid again")]
    StalePrice { current_price: f64 },
    #[error("sellers cannot bid on their own listings")]
    SellerCannotBid,
    #[error("only the winner of an ended auction can pay for it")]
    NotWinner,
    #[error("a payment for this auction already exists")]
    PaymentExists,
    #[error("please log in to continue")]
    NotAuthenticated,
    #[error("you are not authorized to perform this action")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("service temporarily unavailable: {0}")]
    StoreUnavailable(String),
}

impl AuctionError {
    /// Machine readable code sent along with the message
    pub fn code(&self) -> &'static str {
        match self {
            AuctionError::NotStarted => "NOT_STARTED",
            AuctionError::AuctionEnded => "AUCTION_ENDED",
            AuctionError::BidTooLow { .. } => "BID_TOO_LOW",
            AuctionError::StalePrice { .. } => "STALE_PRICE",
            AuctionError::SellerCannotBid => "SELLER_CANNOT_BID",
            AuctionError::NotWinner => "NOT_WINNER",
            AuctionError::PaymentExists => "PAYMENT_EXISTS",
            AuctionError::NotAuthenticated => "NOT_AUTHENTICATED",
            AuctionError::Forbidden => "FORBIDDEN",
            AuctionError::NotFound(_) => "NOT_FOUND",
            AuctionError::InvalidInput(_) => "INVALID_INPUT",
            AuctionError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuctionError::NotStarted
            | AuctionError::AuctionEnded
            | AuctionError::BidTooLow { .. }
            | AuctionError::SellerCannotBid
            | AuctionError::NotWinner
            | AuctionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuctionError::StalePrice { .. } | AuctionError::PaymentExists => StatusCode::CONFLICT,
            AuctionError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            AuctionError::Forbidden => StatusCode::FORBIDDEN,
            AuctionError::NotFound(_) => StatusCode::NOT_FOUND,
            AuctionError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<StoreError> for AuctionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => AuctionError::StoreUnavailable(msg),
            StoreError::Duplicate(msg) => AuctionError::InvalidInput(msg),
        }
    }
}

// Requests that never reach a handler are reported as bad input
macro_rules! reject_as_invalid_input {
    ($($rejection:ty),+) => {
        $(
            impl From<$rejection> for AuctionError {
                fn from(rejection: $rejection) -> Self {
                    AuctionError::InvalidInput(rejection.body_text())
                }
            }
        )+
    };
}

reject_as_invalid_input!(JsonRejection, PathRejection, QueryRejection, MultipartRejection);

impl IntoResponse for AuctionError {
    fn into_response(self) -> Response {
        if let AuctionError::StoreUnavailable(msg) = &self {
            error!("{:<12} --> store failure: {}", "Error", msg);
        }

        let mut body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        if let AuctionError::BidTooLow { current_price }
        | AuctionError::StalePrice { current_price } = &self
        {
            body["current_price"] = serde_json::json!(current_price);
        }

        (self.status_code(), Json(body)).into_response()
    }
}

// endregion: --- Auction Error

pub type Result<T, E = AuctionError> = std::result::Result<T, E>;
