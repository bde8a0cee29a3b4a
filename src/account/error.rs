use thiserror::Error;

use crate::otp::OtpError;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),
    #[error("an account with this email or phone already exists")]
    AlreadyRegistered,
    #[error(transparent)]
    Code(#[from] OtpError),
    #[error("no account matches that username or email")]
    UnknownUser,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account exists under a different role")]
    RoleMismatch,
    #[error("account is not verified yet")]
    NotVerified,
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("user store error: {0}")]
    Store(String),
}

pub type AccountResult<T> = Result<T, AccountError>;
