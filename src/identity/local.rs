//! Identity provider over an [`AccountStore`]. Credentials are persisted there;
//! sessions live in process memory and end with the process.
// region:    --- Imports
use super::{Identity, IdentityChange, IdentityProvider, Role, Session};
use crate::error::{AuctionError, Result, StoreError};
use crate::store::{AccountStore, Credentials, InMemoryStore};
use async_trait::async_trait;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

// endregion: --- Imports

pub struct LocalIdentityProvider {
    admin_emails: HashSet<String>,
    accounts: Arc<dyn AccountStore>,
    // token -> uid
    sessions: RwLock<HashMap<String, String>>,
    changes: broadcast::Sender<IdentityChange>,
}

impl LocalIdentityProvider {
    /// Keeps accounts in memory. Accounts signing up with an email in
    /// `admin_emails` receive the admin role claim.
    pub fn new<I, S>(admin_emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_accounts(admin_emails, Arc::new(InMemoryStore::new()))
    }

    pub fn with_accounts<I, S>(admin_emails: I, accounts: Arc<dyn AccountStore>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (changes, _) = broadcast::channel(64);
        Self {
            admin_emails: admin_emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_ascii_lowercase())
                .collect(),
            accounts,
            sessions: RwLock::new(HashMap::new()),
            changes,
        }
    }

    fn role_for(&self, email: &str, requested: Role) -> Role {
        if self.admin_emails.contains(&email.to_ascii_lowercase()) {
            Role::Admin
        } else {
            requested
        }
    }

    async fn open_session(&self, uid: &str) -> String {
        let token = random_hex(32);
        self.sessions
            .write()
            .await
            .insert(token.clone(), uid.to_string());
        token
    }

    fn notify(&self, change: IdentityChange) {
        // no subscribers is fine
        let _ = self.changes.send(change);
    }
}

fn random_hex(len: usize) -> String {
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn invalid_credentials() -> AuctionError {
    AuctionError::InvalidInput("invalid email or password".to_string())
}

fn email_in_use() -> AuctionError {
    AuctionError::InvalidInput("the email address is already in use".to_string())
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str, role: Role) -> Result<Session> {
        let email = email.trim();
        if self.accounts.account_by_email(email).await?.is_some() {
            return Err(email_in_use());
        }

        let identity = Identity {
            uid: random_hex(14),
            email: email.to_string(),
            role: self.role_for(email, role),
        };
        let salt = random_hex(16);
        let credentials = Credentials {
            identity: identity.clone(),
            password_hash: hash_password(&salt, password),
            salt,
        };
        match self.accounts.insert_account(&credentials).await {
            Ok(()) => {}
            // lost a race with a concurrent sign-up
            Err(StoreError::Duplicate(_)) => return Err(email_in_use()),
            Err(e) => return Err(e.into()),
        }

        let token = self.open_session(&identity.uid).await;
        info!(
            "{:<12} --> sign up: {} ({})",
            "Identity", identity.email, identity.role
        );
        self.notify(IdentityChange::SignedUp(identity.clone()));
        Ok(Session { token, identity })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let identity = match self.accounts.account_by_email(email.trim()).await? {
            Some(account) if hash_password(&account.salt, password) == account.password_hash => {
                account.identity
            }
            _ => return Err(invalid_credentials()),
        };

        let token = self.open_session(&identity.uid).await;
        debug!("{:<12} --> sign in: {}", "Identity", identity.email);
        self.notify(IdentityChange::SignedIn(identity.clone()));
        Ok(Session { token, identity })
    }

    async fn sign_out(&self, token: &str) -> Result<()> {
        let uid = self.sessions.write().await.remove(token);
        let Some(uid) = uid else {
            return Err(AuctionError::NotAuthenticated);
        };

        match self.accounts.account_by_uid(&uid).await? {
            Some(account) => {
                self.notify(IdentityChange::SignedOut(account.identity));
                Ok(())
            }
            None => Err(AuctionError::NotAuthenticated),
        }
    }

    async fn current_identity(&self, token: &str) -> Result<Option<Identity>> {
        let uid = self.sessions.read().await.get(token).cloned();
        let Some(uid) = uid else {
            return Ok(None);
        };
        Ok(self
            .accounts
            .account_by_uid(&uid)
            .await?
            .map(|account| account.identity))
    }

    async fn remove(&self, uid: &str) -> Result<Option<Identity>> {
        let removed = self
            .accounts
            .delete_account(uid)
            .await?
            .map(|account| account.identity);
        self.sessions.write().await.retain(|_, owner| owner != uid);

        if let Some(identity) = &removed {
            info!("{:<12} --> removed account: {}", "Identity", identity.email);
            self.notify(IdentityChange::Removed(identity.clone()));
        }
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<IdentityChange> {
        self.changes.subscribe()
    }
}

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let provider = LocalIdentityProvider::new(Vec::<String>::new());
        let session = provider
            .sign_up("Bidder@Mail.com", "secret1", Role::User)
            .await
            .unwrap();
        assert_eq!(session.identity.role, Role::User);

        let again = provider.sign_in("bidder@mail.com", "secret1").await.unwrap();
        assert_eq!(again.identity, session.identity);
        assert_ne!(again.token, session.token);

        assert!(provider.sign_in("bidder@mail.com", "wrong").await.is_err());
    }

    #[tokio::test]
    async fn admin_role_comes_from_the_configured_set_only() {
        let provider = LocalIdentityProvider::new(["admin@bidsphere.in"]);
        let admin = provider
            .sign_up("Admin@BidSphere.in", "secret1", Role::User)
            .await
            .unwrap();
        assert_eq!(admin.identity.role, Role::Admin);

        let other = provider
            .sign_up("vivek@mail.com", "secret1", Role::User)
            .await
            .unwrap();
        assert_eq!(other.identity.role, Role::User);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let provider = LocalIdentityProvider::new(Vec::<String>::new());
        provider
            .sign_up("a@mail.com", "secret1", Role::User)
            .await
            .unwrap();
        assert!(provider
            .sign_up("A@mail.com", "other12", Role::Seller)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn sign_out_ends_the_session_and_notifies() {
        let provider = LocalIdentityProvider::new(Vec::<String>::new());
        let mut changes = provider.subscribe();
        let session = provider
            .sign_up("a@mail.com", "secret1", Role::User)
            .await
            .unwrap();

        provider.sign_out(&session.token).await.unwrap();
        assert_eq!(provider.current_identity(&session.token).await.unwrap(), None);

        assert!(matches!(changes.recv().await, Ok(IdentityChange::SignedUp(_))));
        assert!(matches!(changes.recv().await, Ok(IdentityChange::SignedOut(_))));
    }

    #[tokio::test]
    async fn remove_invalidates_sessions() {
        let provider = LocalIdentityProvider::new(Vec::<String>::new());
        let session = provider
            .sign_up("a@mail.com", "secret1", Role::User)
            .await
            .unwrap();

        let removed = provider.remove(&session.identity.uid).await.unwrap();
        assert_eq!(removed, Some(session.identity));
        assert_eq!(provider.current_identity(&session.token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn accounts_outlive_the_provider() {
        let store = Arc::new(InMemoryStore::new());
        let first = LocalIdentityProvider::with_accounts(Vec::<String>::new(), store.clone());
        let session = first
            .sign_up("asha@mail.com", "secret1", Role::Seller)
            .await
            .unwrap();
        drop(first);

        let restarted = LocalIdentityProvider::with_accounts(Vec::<String>::new(), store);
        assert_eq!(restarted.current_identity(&session.token).await.unwrap(), None);
        let again = restarted.sign_in("Asha@mail.com", "secret1").await.unwrap();
        assert_eq!(again.identity, session.identity);
        assert!(restarted
            .sign_up("ASHA@mail.com", "secret2", Role::User)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn unavailable_account_store_fails_sign_in() {
        let store = Arc::new(InMemoryStore::new());
        let provider = LocalIdentityProvider::with_accounts(Vec::<String>::new(), store.clone());
        provider
            .sign_up("a@mail.com", "secret1", Role::User)
            .await
            .unwrap();

        store.set_offline(true);
        assert!(matches!(
            provider.sign_in("a@mail.com", "secret1").await,
            Err(AuctionError::StoreUnavailable(_))
        ));
    }
}
// endregion: --- Tests
