//! Token lifecycle: claims, HS256 signing and verification, and the
//! soft revocation cache.

pub mod cache;
pub mod claims;
pub mod issuer;

pub use cache::{CacheOutcome, InMemoryTokenStore, TokenCache, TokenStore};
pub use claims::{Claims, TokenKind};
pub use issuer::TokenIssuer;

#[cfg(feature = "redis-cache")]
pub use cache::RedisTokenStore;
