use lazy_static::lazy_static;
use regex::Regex;

use crate::access::Role;

use super::error::{AccountError, AccountResult};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trims and lowercases, then shape-checks. Lowercasing here keeps lookup
/// by email case-insensitive without the store having to care.
pub(crate) fn normalize_email(raw: &str) -> AccountResult<String> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AccountError::Validation("Invalid email".into()));
    }
    Ok(email)
}

/// Strips common separators and keeps an optional leading `+`. The result
/// is the canonical identifier codes are keyed by, so two spellings of the
/// same number cannot hold two pending signups.
pub(crate) fn normalize_phone(raw: &str) -> AccountResult<String> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    if digits.is_empty()
        || !(7..=15).contains(&digits.len())
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(AccountError::Validation("Invalid phone number".into()));
    }
    Ok(compact)
}

pub(crate) fn validate_username(raw: &str) -> AccountResult<&str> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(AccountError::Validation("Username required".into()));
    }
    if username.len() > 120 {
        return Err(AccountError::Validation("Username too long".into()));
    }
    Ok(username)
}

pub(crate) fn validate_password(password: &str) -> AccountResult<()> {
    if password.len() < 8 {
        return Err(AccountError::Validation("Password too short".into()));
    }
    Ok(())
}

/// Self-service signups never mint privileged accounts: anything other
/// than attendee or organizer falls back to attendee.
pub(crate) fn signup_role(requested: Option<Role>) -> Role {
    match requested {
        Some(Role::Organizer) => Role::Organizer,
        Some(Role::Attendee) | None => Role::Attendee,
        Some(Role::Admin) => Role::Attendee,
    }
}
