//! Core of the EventHive backend: phone-verified account activation and
//! role/ownership authorization for event administration.
//!
//! The crate is transport-agnostic. An HTTP layer drives
//! [`AccountService`] for signup, code confirmation, and login, and calls
//! [`access::authorize`] before every privileged event or user mutation.
//! Storage is behind the [`OtpStore`] and [`UserStore`] traits; the
//! in-memory implementations back tests and single-node deployments.

pub mod access;
pub mod account;
pub mod clock;
pub mod config;
pub mod notify;
pub mod otp;

pub use access::{authorize, AccessError, Action, Principal, ResourceKind, ResourceRef, Role};
pub use account::{
    AccountError, AccountResult, AccountService, InMemoryUserStore, NewSignup, PublicUser, User,
    UserStore,
};
pub use clock::{Clock, SystemClock};
pub use config::OtpConfig;
pub use notify::{LogNotifier, Notifier};
pub use otp::{
    Delivery, InMemoryOtpStore, IssueReceipt, OtpError, OtpManager, OtpRecord, OtpResult, OtpStore,
    PendingSignup,
};
