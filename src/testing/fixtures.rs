//! Test fixtures for identity data

use crate::auth::storage::UserDirectory;
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Helper functions for generating fake test data
pub mod fake {
    use super::*;

    /// Generate a fake email address
    pub fn email() -> String {
        format!("test-{}@example.com", Uuid::new_v4().simple())
    }

    /// Generate a fake UUID as a string
    pub fn uuid() -> String {
        Uuid::new_v4().to_string()
    }

    /// Generate a fake name
    pub fn name() -> String {
        format!("Test User {}", &Uuid::new_v4().simple().to_string()[..8])
    }
}

/// A user known to a [`StaticUserDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

impl TestUser {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: None,
        }
    }

    /// Create a TestUser with generated values
    pub fn generate() -> Self {
        Self {
            id: fake::uuid(),
            email: fake::email(),
            name: Some(fake::name()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// In-memory identity collaborator.
///
/// Clones share the same user set, so a test can remove a user after handing
/// the directory to a manager.
#[derive(Debug, Clone, Default)]
pub struct StaticUserDirectory {
    users: Arc<DashMap<String, TestUser>>,
}

impl StaticUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with the given ID and email.
    pub fn with_user(self, id: impl Into<String>, email: impl Into<String>) -> Self {
        self.insert(TestUser::new(id, email));
        self
    }

    pub fn insert(&self, user: TestUser) {
        self.users.insert(user.id.clone(), user);
    }

    /// Remove a user. Returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        self.users.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    type User = TestUser;

    async fn exists_user(&self, user_id: &str) -> Result<bool> {
        Ok(self.users.contains_key(user_id))
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<TestUser>> {
        Ok(self.users.get(user_id).map(|u| u.value().clone()))
    }

    fn user_email(&self, user: &TestUser) -> Option<String> {
        Some(user.email.clone())
    }

    fn user_name(&self, user: &TestUser) -> Option<String> {
        user.name.clone()
    }
}
