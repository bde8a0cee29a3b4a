use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::access::Role;
use crate::clock::Clock;
use crate::otp::{IssueReceipt, OtpManager, PendingSignup};

use super::error::{AccountError, AccountResult};
use super::password::{hash_password, verify_password};
use super::repo::{PublicUser, User, UserStore};
use super::validate;

/// Signup application as it arrives from the outer layer. `role` is what
/// the applicant asked for; anything privileged gets coerced to attendee.
#[derive(Clone, Deserialize)]
pub struct NewSignup {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

// The plaintext password must not reach logs.
impl fmt::Debug for NewSignup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewSignup")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("password", &"[redacted]")
            .field("role", &self.role)
            .finish()
    }
}

/// Signup, activation, and login.
///
/// An account only reaches the user store once its phone is verified;
/// until then the whole application lives in the code store and expires
/// with the code.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    otp: OtpManager,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>, otp: OtpManager, clock: Arc<dyn Clock>) -> Self {
        Self { users, otp, clock }
    }

    /// Validates the application, parks it keyed by the normalized phone,
    /// and dispatches the first code. No user row is written yet.
    pub async fn begin_signup(&self, signup: NewSignup) -> AccountResult<IssueReceipt> {
        let username = validate::validate_username(&signup.username)?.to_string();
        let email = validate::normalize_email(&signup.email)?;
        let phone = validate::normalize_phone(&signup.phone)?;
        let password = signup.password.trim();
        validate::validate_password(password)?;
        let role = validate::signup_role(signup.role);

        if self.users.find_by_email(&email).await?.is_some()
            || self.users.find_by_phone(&phone).await?.is_some()
        {
            warn!(%email, "signup against an existing account");
            return Err(AccountError::AlreadyRegistered);
        }

        let payload = PendingSignup {
            username,
            email,
            phone: phone.clone(),
            role,
            password_hash: hash_password(password)?,
        };
        let receipt = self.otp.issue(&phone, payload).await?;
        info!(%phone, "signup pending verification");
        Ok(receipt)
    }

    /// Rotates the pending code for a phone, spelled however the user
    /// typed it.
    pub async fn resend_code(&self, phone: &str) -> AccountResult<IssueReceipt> {
        let phone = validate::normalize_phone(phone)?;
        Ok(self.otp.resend(&phone).await?)
    }

    /// Completes activation: checks the code, then writes the verified
    /// user. The code is consumed before the write, so losing a race to
    /// `create` cannot leave a replayable code behind.
    pub async fn confirm_signup(&self, phone: &str, code: &str) -> AccountResult<PublicUser> {
        let phone = validate::normalize_phone(phone)?;
        let pending = self.otp.verify(&phone, code.trim()).await?;
        let user = User::activated(pending, self.clock.now());
        let created = self.users.create(user).await?;
        info!(user_id = %created.id, "account activated");
        Ok(created.into())
    }

    /// Password login against an explicit expected role. Checks run in a
    /// fixed order: lookup, password, role, verification status.
    pub async fn authenticate(
        &self,
        login: &str,
        password: &str,
        role: Role,
    ) -> AccountResult<PublicUser> {
        let login = login.trim();
        let user = match self.users.find_by_login(login).await? {
            Some(user) => user,
            None => return Err(AccountError::UnknownUser),
        };
        if !verify_password(password.trim(), &user.password_hash)? {
            warn!(user_id = %user.id, "login with invalid password");
            return Err(AccountError::InvalidCredentials);
        }
        if user.role != role {
            return Err(AccountError::RoleMismatch);
        }
        if !user.verified {
            return Err(AccountError::NotVerified);
        }
        Ok(user.into())
    }
}
