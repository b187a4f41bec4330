//! Accounts, credentials, and session orchestration.

pub mod flow;
pub mod password;
pub mod user;

pub use flow::AuthFlow;
pub use password::{Argon2Hasher, PasswordHasher};
pub use user::{MemoryUserDirectory, User, UserDirectory};
