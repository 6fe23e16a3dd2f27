//! Who is calling and what they may do.
//!
//! The service never keeps an ambient "current user". Every request resolves its
//! bearer token through an [`IdentityProvider`] into a [`SessionContext`] that is
//! handed to the handler explicitly.
pub mod accounts;
pub mod commands;
pub mod local;

// region:    --- Imports
use crate::error::{AuctionError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::broadcast;

pub use local::LocalIdentityProvider;

// endregion: --- Imports

// region:    --- Roles
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Seller,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Bid,
    Sell,
    Administer,
}

impl Role {
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::User => &[Capability::Bid],
            Role::Seller => &[Capability::Bid, Capability::Sell],
            Role::Admin => &[Capability::Bid, Capability::Sell, Capability::Administer],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Seller => "seller",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "seller" => Ok(Role::Seller),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

// endregion: --- Roles

// region:    --- Identity
/// An authenticated account. `role` is the claim stored on the identity record.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn can(&self, capability: Capability) -> bool {
        self.role.capabilities().contains(&capability)
    }

    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(AuctionError::Forbidden)
        }
    }

    pub fn is_admin(&self) -> bool {
        self.can(Capability::Administer)
    }
}

/// Issued by sign-up and sign-in
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
}

/// Per-request session resolved from the bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub token: String,
    pub identity: Identity,
}

impl SessionContext {
    pub fn email(&self) -> &str {
        &self.identity.email
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityChange {
    SignedUp(Identity),
    SignedIn(Identity),
    SignedOut(Identity),
    Removed(Identity),
}

// endregion: --- Identity

// region:    --- Identity Provider
/// Sign-up, sign-in and session lookup
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, role: Role) -> Result<Session>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_out(&self, token: &str) -> Result<()>;

    async fn current_identity(&self, token: &str) -> Result<Option<Identity>>;

    /// Drops the account and every session it holds
    async fn remove(&self, uid: &str) -> Result<Option<Identity>>;

    fn subscribe(&self) -> broadcast::Receiver<IdentityChange>;
}

// endregion: --- Identity Provider

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: Role) -> Identity {
        Identity {
            uid: "u1".to_string(),
            email: "someone@mail.com".to_string(),
            role,
        }
    }

    #[test]
    fn capabilities_follow_the_role_claim() {
        assert!(identity(Role::User).can(Capability::Bid));
        assert!(!identity(Role::User).can(Capability::Sell));
        assert!(identity(Role::Seller).can(Capability::Sell));
        assert!(!identity(Role::Seller).is_admin());
        assert!(identity(Role::Admin).is_admin());
    }

    #[test]
    fn require_maps_to_forbidden() {
        assert_eq!(
            identity(Role::User).require(Capability::Administer),
            Err(AuctionError::Forbidden)
        );
        assert_eq!(identity(Role::Admin).require(Capability::Administer), Ok(()));
    }
}
// endregion: --- Tests
