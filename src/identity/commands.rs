//! Registration and sign-in flows on top of an [`IdentityProvider`]
// region:    --- Imports
use super::accounts::{SellerProfile, SellerRegistration, UserProfile, UserRegistration};
use super::{IdentityProvider, Role, Session, SessionContext};
use crate::error::{AuctionError, Result};
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// endregion: --- Imports

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SignInCommand {
    pub email: String,
    pub password: String,
}

/// Session plus the profile written at registration
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Registered<P> {
    #[serde(flatten)]
    pub session: Session,
    pub profile: P,
}

/// The account exists without a profile if the profile write fails, so drop it again.
async fn undo_sign_up(identity: &dyn IdentityProvider, session: &Session) {
    if let Err(e) = identity.remove(&session.identity.uid).await {
        warn!(
            "{:<12} --> could not roll back account {}: {}",
            "Accounts", session.identity.email, e
        );
    }
}

pub async fn register_user(
    store: &dyn Store,
    identity: &dyn IdentityProvider,
    form: UserRegistration,
) -> Result<Registered<UserProfile>> {
    form.validate()?;
    let session = identity.sign_up(&form.email, &form.password, Role::User).await?;

    let mut profile = form.into_profile(session.identity.uid.clone());
    profile.role = session.identity.role;
    if let Err(e) = store.put_user(&profile).await {
        undo_sign_up(identity, &session).await;
        return Err(e.into());
    }

    info!("{:<12} --> registered bidder {}", "Accounts", profile.email);
    Ok(Registered { session, profile })
}

pub async fn register_seller(
    store: &dyn Store,
    identity: &dyn IdentityProvider,
    form: SellerRegistration,
    now: DateTime<Utc>,
) -> Result<Registered<SellerProfile>> {
    form.validate()?;
    let session = identity
        .sign_up(&form.email, &form.password, Role::Seller)
        .await?;

    let mut profile = form.into_profile(session.identity.uid.clone(), now);
    profile.role = session.identity.role;
    if let Err(e) = store.put_seller(&profile).await {
        undo_sign_up(identity, &session).await;
        return Err(e.into());
    }

    info!(
        "{:<12} --> registered seller {} ({})",
        "Accounts", profile.email, profile.business_name
    );
    Ok(Registered { session, profile })
}

pub async fn sign_in(identity: &dyn IdentityProvider, cmd: SignInCommand) -> Result<Session> {
    identity.sign_in(&cmd.email, &cmd.password).await
}

/// Seller portal sign-in: the account must have a seller profile.
pub async fn sign_in_seller(
    store: &dyn Store,
    identity: &dyn IdentityProvider,
    cmd: SignInCommand,
) -> Result<Session> {
    let session = identity.sign_in(&cmd.email, &cmd.password).await?;
    match store.get_seller(&session.identity.uid).await {
        Ok(Some(_)) => Ok(session),
        Ok(None) => {
            identity.sign_out(&session.token).await?;
            Err(AuctionError::Forbidden)
        }
        Err(e) => {
            identity.sign_out(&session.token).await?;
            Err(e.into())
        }
    }
}

pub async fn sign_out(identity: &dyn IdentityProvider, session: &SessionContext) -> Result<()> {
    identity.sign_out(&session.token).await
}

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::LocalIdentityProvider;
    use crate::store::{InMemoryStore, ProfileStore};

    fn bidder_form(email: &str) -> UserRegistration {
        UserRegistration {
            name: "Asha Verma".to_string(),
            email: email.to_string(),
            password: "secret1".to_string(),
            gender: "female".to_string(),
            city: "Mumbai".to_string(),
        }
    }

    fn seller_form(email: &str) -> SellerRegistration {
        SellerRegistration {
            business_name: "Ravi Antiques".to_string(),
            seller_name: "Ravi Kumar".to_string(),
            email: email.to_string(),
            phone: "9876543210".to_string(),
            password: "hunter22".to_string(),
            address: "14 MG Road, Bengaluru".to_string(),
            city: "Bengaluru".to_string(),
            terms_accepted: true,
        }
    }

    fn credentials(email: &str, password: &str) -> SignInCommand {
        SignInCommand {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn registration_writes_profile_with_role_claim() {
        let store = InMemoryStore::new();
        let identity = LocalIdentityProvider::new(["boss@example.com"]);

        let bidder = register_user(&store, &identity, bidder_form("asha@example.com"))
            .await
            .unwrap();
        assert_eq!(bidder.profile.role, Role::User);
        let admin = register_user(&store, &identity, bidder_form("Boss@example.com"))
            .await
            .unwrap();
        assert_eq!(admin.profile.role, Role::Admin);
        assert_eq!(store.list_users().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalid_form_creates_no_account() {
        let store = InMemoryStore::new();
        let identity = LocalIdentityProvider::new(Vec::<String>::new());
        let mut form = bidder_form("asha@example.com");
        form.password = "123".to_string();

        assert!(matches!(
            register_user(&store, &identity, form).await,
            Err(AuctionError::InvalidInput(_))
        ));
        assert!(identity.sign_in("asha@example.com", "123").await.is_err());
    }

    #[tokio::test]
    async fn failed_profile_write_rolls_back_account() {
        let store = InMemoryStore::new();
        let identity = LocalIdentityProvider::new(Vec::<String>::new());
        store.set_offline(true);

        let form = seller_form("ravi@antiques.in");
        let result = register_seller(&store, &identity, form, Utc::now()).await;
        assert!(matches!(result, Err(AuctionError::StoreUnavailable(_))));
        assert!(identity.sign_in("ravi@antiques.in", "hunter22").await.is_err());
    }

    #[tokio::test]
    async fn seller_portal_requires_seller_profile() {
        let store = InMemoryStore::new();
        let identity = LocalIdentityProvider::new(Vec::<String>::new());
        register_user(&store, &identity, bidder_form("asha@example.com"))
            .await
            .unwrap();
        register_seller(&store, &identity, seller_form("ravi@antiques.in"), Utc::now())
            .await
            .unwrap();

        let bidder =
            sign_in_seller(&store, &identity, credentials("asha@example.com", "secret1")).await;
        assert_eq!(bidder, Err(AuctionError::Forbidden));

        let seller = sign_in_seller(&store, &identity, credentials("ravi@antiques.in", "hunter22"))
            .await
            .unwrap();
        assert_eq!(seller.identity.role, Role::Seller);
    }
}
// endregion: --- Tests
