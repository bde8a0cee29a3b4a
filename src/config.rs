use serde::Deserialize;

/// Tunables for code issuance and verification.
///
/// Every field has a default, so construction never fails; deployments
/// override via environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    /// Minutes a freshly issued code stays valid (`OTP_EXP_MINUTES`).
    pub ttl_minutes: i64,
    /// Verification attempts allowed per code (`OTP_MAX_ATTEMPTS`).
    pub max_attempts: u32,
    /// When set, issue receipts carry the plaintext code (`OTP_EXPOSE_CODES`).
    /// Development only; must stay off in production.
    pub expose_codes: bool,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 5,
            max_attempts: 5,
            expose_codes: false,
        }
    }
}

impl OtpConfig {
    pub fn from_env() -> Self {
        Self {
            ttl_minutes: std::env::var("OTP_EXP_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(5),
            max_attempts: std::env::var("OTP_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(5),
            expose_codes: std::env::var("OTP_EXPOSE_CODES")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    /// Reads `.env` if present, then the process environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    pub fn ttl(&self) -> time::Duration {
        time::Duration::minutes(self.ttl_minutes)
    }
}
