use super::storage::{TwoFactorRecord, TwoFactorStore};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

/// Two-factor store held in process memory.
///
/// Each operation runs under the shard lock of the user's entry.
#[derive(Default)]
pub struct InMemoryTwoFactorStore {
    records: DashMap<String, TwoFactorRecord>,
}

impl InMemoryTwoFactorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl TwoFactorStore for InMemoryTwoFactorStore {
    async fn find(&self, user_id: &str) -> Result<Option<TwoFactorRecord>> {
        Ok(self.records.get(user_id).map(|r| r.value().clone()))
    }

    async fn insert_pending(&self, record: TwoFactorRecord) -> Result<bool> {
        match self.records.entry(record.user_id.clone()) {
            Entry::Occupied(existing) if existing.get().enabled => Ok(false),
            Entry::Occupied(mut existing) => {
                existing.insert(record);
                Ok(true)
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(true)
            }
        }
    }

    async fn activate(&self, user_id: &str, record_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        Ok(match self.records.get_mut(user_id) {
            Some(mut record) if record.id == record_id => {
                record.enabled = true;
                record.verified = true;
                record.updated_at = now;
                true
            }
            _ => false,
        })
    }

    async fn delete(&self, user_id: &str) -> Result<bool> {
        Ok(self.records.remove(user_id).is_some())
    }

    async fn consume_backup_code(
        &self,
        user_id: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(mut record) = self.records.get_mut(user_id) else {
            return Ok(false);
        };
        if !record.enabled {
            return Ok(false);
        }
        let consumed = record.backup_codes.consume(code);
        if consumed {
            record.updated_at = now;
        }
        Ok(consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::mfa::backup::BackupCodes;
    use crate::auth::mfa::storage::TwoFactorStatus;
    use std::sync::Arc;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn pending(user: &str, secret: &str) -> TwoFactorRecord {
        TwoFactorRecord::pending(
            user,
            secret.to_string(),
            BackupCodes::new(["11111111", "22222222"]),
            at(0),
        )
    }

    #[tokio::test]
    async fn test_pending_replaced_active_kept() {
        let store = InMemoryTwoFactorStore::new();
        let first = pending("u1", "A");
        let second = pending("u1", "B");
        assert!(store.insert_pending(first.clone()).await.unwrap());
        assert!(store.insert_pending(second.clone()).await.unwrap());
        assert_eq!(store.find("u1").await.unwrap().unwrap().secret, "B");

        // The replaced enrollment can no longer be activated
        assert!(!store.activate("u1", first.id, at(5)).await.unwrap());
        assert_eq!(
            store.find("u1").await.unwrap().unwrap().status(),
            TwoFactorStatus::Pending
        );

        assert!(store.activate("u1", second.id, at(5)).await.unwrap());
        let record = store.find("u1").await.unwrap().unwrap();
        assert_eq!(record.status(), TwoFactorStatus::Active);
        assert!(record.verified);

        assert!(!store.insert_pending(pending("u1", "C")).await.unwrap());
        assert_eq!(store.find("u1").await.unwrap().unwrap().secret, "B");
    }

    #[tokio::test]
    async fn test_backup_code_requires_active_record() {
        let store = InMemoryTwoFactorStore::new();
        assert!(!store.consume_backup_code("u1", "11111111", at(1)).await.unwrap());

        let record = pending("u1", "A");
        store.insert_pending(record.clone()).await.unwrap();
        assert!(!store.consume_backup_code("u1", "11111111", at(1)).await.unwrap());

        store.activate("u1", record.id, at(1)).await.unwrap();
        assert!(store.consume_backup_code("u1", "11111111", at(2)).await.unwrap());
        assert!(!store.consume_backup_code("u1", "11111111", at(3)).await.unwrap());
        assert_eq!(
            store.find("u1").await.unwrap().unwrap().backup_codes.remaining(),
            1
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryTwoFactorStore::new();
        let record = pending("u1", "A");
        store.insert_pending(record.clone()).await.unwrap();
        assert!(store.delete("u1").await.unwrap());
        assert!(!store.delete("u1").await.unwrap());
        assert!(store.is_empty());
        assert!(!store.activate("u1", record.id, at(1)).await.unwrap());
    }

    #[test]
    fn test_concurrent_backup_code_single_winner() {
        let store = Arc::new(InMemoryTwoFactorStore::new());
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let record = pending("u1", "A");
            store.insert_pending(record.clone()).await.unwrap();
            store.activate("u1", record.id, at(0)).await.unwrap();
        });

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                    rt.block_on(store.consume_backup_code("u1", "22222222", at(1)))
                        .unwrap()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
