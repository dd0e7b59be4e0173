//! Storage traits for the refresh token manager.
//!
//! These traits define the interface for persisting refresh tokens and for
//! looking up users. Implement them for your database layer; the in-memory
//! store is suitable for tests and single-process deployments.

pub mod in_memory;
pub mod token;
pub mod user;

pub use in_memory::InMemoryRefreshTokenStore;
pub use token::{ConsumeOutcome, RefreshTokenStore};
pub use user::UserDirectory;
