use thiserror::Error;

/// Verification outcomes a caller must distinguish.
///
/// The order of checks in `OtpManager::verify` is fixed, so a single call
/// reports exactly one of these even when several conditions hold at once.
#[derive(Debug, Error)]
pub enum OtpError {
    #[error("no outstanding code for this identifier")]
    NotFound,
    #[error("code has expired; request a new one")]
    Expired,
    #[error("too many attempts; request a new code")]
    TooManyAttempts,
    #[error("code does not match")]
    Mismatch,
    #[error("code store unavailable")]
    Store(#[source] anyhow::Error),
}

pub type OtpResult<T> = Result<T, OtpError>;
