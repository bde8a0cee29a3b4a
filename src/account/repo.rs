use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::access::Role;
use crate::otp::PendingSignup;

use super::error::{AccountError, AccountResult};

/// Stored account. Only verified accounts exist; signups park their data
/// in the code store until the phone check passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    /// Materializes a verified account from signup data that passed the
    /// code check.
    pub fn activated(pending: PendingSignup, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: pending.username,
            email: pending.email,
            phone: pending.phone,
            password_hash: pending.password_hash,
            role: pending.role,
            verified: true,
            created_at: now,
        }
    }
}

/// Projection safe to hand to callers; never carries the hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub verified: bool,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            phone: user.phone,
            role: user.role,
            verified: user.verified,
        }
    }
}

/// Durable account storage.
///
/// `create` enforces email and phone uniqueness, so activation stays
/// correct even when two verified signups race each other to the store.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: User) -> AccountResult<User>;
    async fn find_by_email(&self, email: &str) -> AccountResult<Option<User>>;
    async fn find_by_phone(&self, phone: &str) -> AccountResult<Option<User>>;
    /// Resolves a login as a username first, then as an email.
    async fn find_by_login(&self, login: &str) -> AccountResult<Option<User>>;
}

/// Process-local store used by tests and single-node deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: User) -> AccountResult<User> {
        let mut users = self.users.write().await;
        let duplicate = users
            .values()
            .any(|u| u.email == user.email || u.phone == user.phone);
        if duplicate {
            return Err(AccountError::AlreadyRegistered);
        }
        users.insert(user.id, user.clone());
        tracing::info!(user_id = %user.id, "user created");
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AccountResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> AccountResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.phone == phone).cloned())
    }

    async fn find_by_login(&self, login: &str) -> AccountResult<Option<User>> {
        let users = self.users.read().await;
        let found = users
            .values()
            .find(|u| u.username == login)
            .or_else(|| {
                let email = login.to_lowercase();
                users.values().find(move |u| u.email == email)
            })
            .cloned();
        Ok(found)
    }
}
