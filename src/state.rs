// region:    --- Imports
use crate::config::Config;
use crate::error::AuctionError;
use crate::identity::{IdentityProvider, SessionContext};
use crate::live::{EventPublisher, LiveFeed};
use crate::store::Store;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::sync::Arc;

// endregion: --- Imports

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
    pub publisher: Arc<dyn EventPublisher>,
    pub live: LiveFeed,
    pub config: Arc<Config>,
}

impl AppState {
    /// Everything in process: live events go straight to the local feed.
    pub fn in_process(
        store: Arc<dyn Store>,
        identity: Arc<dyn IdentityProvider>,
        config: Config,
    ) -> Self {
        let live = LiveFeed::default();
        Self {
            store,
            identity,
            publisher: Arc::new(live.clone()),
            live,
            config: Arc::new(config),
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

/// Resolves `Authorization: Bearer <token>` into the caller's session.
#[async_trait]
impl FromRequestParts<AppState> for SessionContext {
    type Rejection = AuctionError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuctionError::NotAuthenticated)?;
        let identity = state
            .identity
            .current_identity(&token)
            .await?
            .ok_or(AuctionError::NotAuthenticated)?;
        Ok(SessionContext { token, identity })
    }
}

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc123"))), Some("abc123".to_string()));
        assert_eq!(bearer_token(&parts(Some("bearer  abc123 "))), Some("abc123".to_string()));
        assert_eq!(bearer_token(&parts(Some("Basic abc123"))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer"))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }
}
// endregion: --- Tests
