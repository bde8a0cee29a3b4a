use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::access::Role;

/// Signup data parked until the applicant proves they hold the phone.
///
/// No user row exists while this is pending; abandoning verification leaks
/// nothing into the user store. The password is already hashed by the time
/// it lands here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSignup {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub password_hash: String,
}

/// One outstanding verification code.
///
/// Keyed by the identifier it was sent to; a reissue for the same
/// identifier replaces the whole record, counter included.
#[derive(Clone, Serialize, Deserialize)]
pub struct OtpRecord {
    pub identifier: String,
    pub code: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub attempts: u32,
    pub payload: PendingSignup,
}

impl OtpRecord {
    /// Expiry is exclusive: a code checked exactly at `expires_at` is
    /// still good.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }
}

// Keeps the plaintext code out of logs wherever a record gets debugged.
impl fmt::Debug for OtpRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtpRecord")
            .field("identifier", &self.identifier)
            .field("code", &"[redacted]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("attempts", &self.attempts)
            .field("payload", &self.payload)
            .finish()
    }
}
