//! Storage for activity history and accounts.
//!
//! The production deployment talks to a hosted database; everything the handlers need from
//! it is captured by [`ActivityStore`]. [`MemoryStore`] is the bundled implementation and
//! publishes every history change to a [`ChangeFeed`], the same way the database's
//! realtime channel does.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::activity::ActivityRecord;
use crate::realtime::{ChangeEvent, ChangeFeed, Keyed};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Unavailable(String),

    #[error("no {table} row with id {id}")]
    NotFound { table: &'static str, id: u64 },
}

/// History row as stored, with its assigned id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredActivity {
    pub id: u64,
    #[serde(flatten)]
    pub record: ActivityRecord,
}

impl Keyed for StoredActivity {
    type Id = u64;

    fn id(&self) -> u64 {
        self.id
    }

    fn owner(&self) -> Option<&str> {
        self.record.owner()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub company_name: String,
    pub owner_referenceid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub company_name: String,
    pub owner_referenceid: String,
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn insert_history(&self, record: ActivityRecord) -> Result<StoredActivity, StoreError>;

    /// Rows whose `activity_reference_number` is any of `references`, in insertion order.
    async fn history_by_reference(&self, references: &[String]) -> Result<Vec<StoredActivity>, StoreError>;

    async fn delete_history(&self, id: u64) -> Result<StoredActivity, StoreError>;

    async fn insert_account(&self, account: NewAccount) -> Result<Account, StoreError>;

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;
}

/// In-process store; ids start at 1
pub struct MemoryStore {
    history: RwLock<Vec<StoredActivity>>,
    accounts: RwLock<Vec<Account>>,
    next_id: AtomicU64,
    feed: ChangeFeed<StoredActivity>,
}

impl MemoryStore {
    pub fn new(feed: ChangeFeed<StoredActivity>) -> Self {
        Self {
            history: RwLock::new(Vec::new()),
            accounts: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            feed,
        }
    }

    pub fn feed(&self) -> &ChangeFeed<StoredActivity> {
        &self.feed
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn insert_history(&self, mut record: ActivityRecord) -> Result<StoredActivity, StoreError> {
        let now = Value::String(Utc::now().to_rfc3339());
        record.details.date_created.get_or_insert_with(|| now.clone());
        record.details.date_updated.get_or_insert(now);

        let stored = StoredActivity {
            id: self.allocate_id(),
            record,
        };
        self.history.write().await.push(stored.clone());

        self.feed.publish(
            stored.owner().map(str::to_string),
            ChangeEvent::Insert(stored.clone()),
        );
        Ok(stored)
    }

    async fn history_by_reference(&self, references: &[String]) -> Result<Vec<StoredActivity>, StoreError> {
        let history = self.history.read().await;
        Ok(history
            .iter()
            .filter(|row| references.contains(&row.record.activity_reference_number))
            .cloned()
            .collect())
    }

    async fn delete_history(&self, id: u64) -> Result<StoredActivity, StoreError> {
        let mut history = self.history.write().await;
        let index = history
            .iter()
            .position(|row| row.id == id)
            .ok_or(StoreError::NotFound { table: "history", id })?;
        let removed = history.remove(index);
        drop(history);

        self.feed
            .publish(removed.owner().map(str::to_string), ChangeEvent::Delete(removed.id));
        Ok(removed)
    }

    async fn insert_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let account = Account {
            id: self.allocate_id(),
            company_name: account.company_name,
            owner_referenceid: account.owner_referenceid,
        };
        self.accounts.write().await.push(account.clone());
        Ok(account)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.accounts.read().await.clone())
    }
}
