//! Role-based authorization across isolated policy domains
//!
//! The [`Enforcer`] composes a role hierarchy ([`RoleGraph`]) with an ordered
//! allow-rule set ([`PolicyStore`]) to answer enforcement queries, and writes
//! every administrative mutation through a [`PolicyAdapter`] to durable
//! storage.

pub mod adapter;
pub mod engine;
pub mod graph;
pub mod store;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use adapter::{MemoryAdapter, PolicyAdapter};
pub use engine::Enforcer;
pub use graph::RoleGraph;
pub use store::PolicyStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresAdapter;
