//! Role and ownership checks for event and account administration.

mod guard;
mod role;

pub use guard::{authorize, AccessError, Action, Principal, ResourceKind, ResourceRef};
pub use role::Role;
