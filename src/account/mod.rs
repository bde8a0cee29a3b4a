//! Account signup, activation, and login.

mod error;
mod password;
mod repo;
mod service;
mod validate;

pub use error::{AccountError, AccountResult};
pub use password::{hash_password, verify_password};
pub use repo::{InMemoryUserStore, PublicUser, User, UserStore};
pub use service::{AccountService, NewSignup};
