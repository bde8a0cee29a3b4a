use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::guard::AccessError;

/// Account role, ordered weakest to strongest.
///
/// `attendee` is the default for self-service signups; `admin` can only be
/// granted by another admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Attendee,
    Organizer,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Attendee => write!(f, "attendee"),
            Role::Organizer => write!(f, "organizer"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "attendee" => Ok(Role::Attendee),
            "organizer" => Ok(Role::Organizer),
            "admin" => Ok(Role::Admin),
            other => Err(AccessError::InvalidRole(other.to_string())),
        }
    }
}
