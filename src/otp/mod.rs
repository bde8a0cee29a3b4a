//! One-time verification codes: issue, verify, resend, expire.
//!
//! The manager owns all sequencing; stores are dumb key-value CRUD so the
//! in-memory implementation can be swapped for a networked cache.

mod code;
mod error;
mod locks;
mod manager;
mod record;
mod store;

pub use code::CODE_LEN;
pub use error::{OtpError, OtpResult};
pub use manager::{Delivery, IssueReceipt, OtpManager};
pub use record::{OtpRecord, PendingSignup};
pub use store::{InMemoryOtpStore, OtpStore};
