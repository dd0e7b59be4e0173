//! Testing utilities for code built on authguard
//!
//! This module provides:
//! - An in-memory identity collaborator with fixture users
//! - A refresh token store wrapper that fails on demand, for exercising
//!   partial-failure paths of token rotation
//!
//! # Example
//!
//! ```rust,ignore
//! use authguard::testing::{FailingRefreshTokenStore, StaticUserDirectory};
//! use authguard::auth::storage::InMemoryRefreshTokenStore;
//!
//! let users = StaticUserDirectory::new().with_user("user-1", "a@example.com");
//! let store = FailingRefreshTokenStore::new(InMemoryRefreshTokenStore::new());
//! store.fail_inserts(true);
//! ```

mod failing;
mod fixtures;

pub use failing::FailingRefreshTokenStore;
pub use fixtures::{StaticUserDirectory, TestUser, fake};
