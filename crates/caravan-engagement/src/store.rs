//! Content store contract and the in-memory reference store.
//!
//! The hosted document store is a collaborator; this module defines what the
//! engagement core needs from it: revisioned point reads, a commit that
//! checks every expectation and applies every write as one atomic step, and
//! a whole-collection swap for reconciliation. `MemoryContentStore` is the
//! reference implementation for tests and standalone use.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace};

use crate::model::{
    AttendanceRecord, ContentId, ContentItem, LedgerEntry, Participant, UploadRecord, UserId,
};

type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A revision check failed at commit time. Nothing was written.
    #[error("write conflict on {0}")]
    Conflict(String),
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// A document together with the revision the read observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub revision: u64,
}

/// Keys addressable by a write batch's expect-set.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DocKey {
    Item(ContentId),
    Ledger(UserId),
    /// The upload log for one (owner, context) pair. Its revision is its
    /// length, so appending under a stale count conflicts.
    Uploads(UserId, String),
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocKey::Item(id) => write!(f, "item/{id}"),
            DocKey::Ledger(user) => write!(f, "ledger/{user}"),
            DocKey::Uploads(owner, context) => write!(f, "uploads/{owner}/{context}"),
        }
    }
}

/// Unit of work for one logical interaction: an explicit expect-set and
/// write-set. Commit applies every write or none of them.
#[derive(Debug, Default)]
pub struct WriteBatch {
    expects: Vec<(DocKey, Option<u64>)>,
    items: Vec<ContentItem>,
    ledgers: Vec<LedgerEntry>,
    uploads: Vec<UploadRecord>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to still be at `revision` at commit time.
    /// `None` means the document must still be absent.
    pub fn expect(&mut self, key: DocKey, revision: Option<u64>) {
        self.expects.push((key, revision));
    }

    pub fn put_item(&mut self, item: ContentItem) {
        self.items.push(item);
    }

    pub fn put_ledger(&mut self, entry: LedgerEntry) {
        self.ledgers.push(entry);
    }

    pub fn push_upload(&mut self, record: UploadRecord) {
        self.uploads.push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.ledgers.is_empty() && self.uploads.is_empty()
    }
}

/// What the engagement core needs from the document store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn item(&self, id: &str) -> Result<Option<Versioned<ContentItem>>>;
    async fn ledger(&self, user: &str) -> Result<Option<Versioned<LedgerEntry>>>;
    /// Number of uploads recorded for `owner` under `context`.
    async fn upload_count(&self, owner: &str, context: &str) -> Result<u64>;
    async fn list_items(&self) -> Result<Vec<ContentItem>>;
    async fn list_ledgers(&self) -> Result<Vec<LedgerEntry>>;
    async fn list_attendance(&self) -> Result<Vec<AttendanceRecord>>;
    /// Apply a batch if every expectation still holds, atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
    /// Atomically replace the whole ledger collection.
    async fn replace_ledgers(&self, entries: Vec<LedgerEntry>) -> Result<()>;
}

/// Roster collaborator: who exists, in stable enrollment order.
#[async_trait]
pub trait Roster: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserId>>;
}

#[async_trait]
impl<S: ContentStore + ?Sized> ContentStore for Arc<S> {
    async fn item(&self, id: &str) -> Result<Option<Versioned<ContentItem>>> {
        (**self).item(id).await
    }
    async fn ledger(&self, user: &str) -> Result<Option<Versioned<LedgerEntry>>> {
        (**self).ledger(user).await
    }
    async fn upload_count(&self, owner: &str, context: &str) -> Result<u64> {
        (**self).upload_count(owner, context).await
    }
    async fn list_items(&self) -> Result<Vec<ContentItem>> {
        (**self).list_items().await
    }
    async fn list_ledgers(&self) -> Result<Vec<LedgerEntry>> {
        (**self).list_ledgers().await
    }
    async fn list_attendance(&self) -> Result<Vec<AttendanceRecord>> {
        (**self).list_attendance().await
    }
    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        (**self).commit(batch).await
    }
    async fn replace_ledgers(&self, entries: Vec<LedgerEntry>) -> Result<()> {
        (**self).replace_ledgers(entries).await
    }
}

#[async_trait]
impl<R: Roster + ?Sized> Roster for Arc<R> {
    async fn list_users(&self) -> Result<Vec<UserId>> {
        (**self).list_users().await
    }
}

/// Fixed roster seeded at startup. Enrollment itself is a collaborator
/// concern; the engagement core only ever reads identifiers.
pub struct StaticRoster {
    participants: Vec<Participant>,
}

impl StaticRoster {
    pub fn new(participants: Vec<Participant>) -> Self {
        Self { participants }
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }
}

#[async_trait]
impl Roster for StaticRoster {
    async fn list_users(&self) -> Result<Vec<UserId>> {
        Ok(self.participants.iter().map(|p| p.id.clone()).collect())
    }
}

#[derive(Default)]
struct MemoryState {
    items: HashMap<ContentId, Versioned<ContentItem>>,
    ledgers: HashMap<UserId, Versioned<LedgerEntry>>,
    uploads: HashMap<(UserId, String), Vec<UploadRecord>>,
    attendance: Vec<AttendanceRecord>,
}

impl MemoryState {
    /// Current revision for an expect-set key. Items and ledgers report
    /// `None` while absent; an upload log's revision is its length.
    fn revision_of(&self, key: &DocKey) -> Option<u64> {
        match key {
            DocKey::Item(id) => self.items.get(id).map(|v| v.revision),
            DocKey::Ledger(user) => self.ledgers.get(user).map(|v| v.revision),
            DocKey::Uploads(owner, context) => Some(
                self.uploads
                    .get(&(owner.clone(), context.clone()))
                    .map(|log| log.len() as u64)
                    .unwrap_or(0),
            ),
        }
    }

    fn put_item(&mut self, item: ContentItem) {
        let revision = self.items.get(&item.id).map(|v| v.revision).unwrap_or(0) + 1;
        self.items.insert(item.id.clone(), Versioned { value: item, revision });
    }

    fn put_ledger(&mut self, entry: LedgerEntry) {
        let revision = self.ledgers.get(&entry.user).map(|v| v.revision).unwrap_or(0) + 1;
        self.ledgers.insert(entry.user.clone(), Versioned { value: entry, revision });
    }
}

/// In-memory content store.
///
/// One lock covers all collections, so a commit's revision checks and
/// writes happen in a single critical section, the isolation the hosted
/// document store provides with native transactions.
#[derive(Default)]
pub struct MemoryContentStore {
    state: Mutex<MemoryState>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a content item directly. Upload/file plumbing sits outside the
    /// engagement core, so callers insert the item and then score it.
    pub fn insert_item(&self, item: ContentItem) {
        let mut state = self.state.lock();
        trace!(item = %item.id, "Seeding content item");
        state.put_item(item);
    }

    /// Seed an attendance mark. Schedule plumbing sits outside the core.
    pub fn record_attendance(&self, record: AttendanceRecord) {
        let mut state = self.state.lock();
        state.attendance.push(record);
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn item(&self, id: &str) -> Result<Option<Versioned<ContentItem>>> {
        Ok(self.state.lock().items.get(id).cloned())
    }

    async fn ledger(&self, user: &str) -> Result<Option<Versioned<LedgerEntry>>> {
        Ok(self.state.lock().ledgers.get(user).cloned())
    }

    async fn upload_count(&self, owner: &str, context: &str) -> Result<u64> {
        Ok(self
            .state
            .lock()
            .uploads
            .get(&(owner.to_string(), context.to_string()))
            .map(|log| log.len() as u64)
            .unwrap_or(0))
    }

    async fn list_items(&self) -> Result<Vec<ContentItem>> {
        Ok(self.state.lock().items.values().map(|v| v.value.clone()).collect())
    }

    async fn list_ledgers(&self) -> Result<Vec<LedgerEntry>> {
        Ok(self.state.lock().ledgers.values().map(|v| v.value.clone()).collect())
    }

    async fn list_attendance(&self) -> Result<Vec<AttendanceRecord>> {
        Ok(self.state.lock().attendance.clone())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut state = self.state.lock();

        for (key, expected) in &batch.expects {
            let current = state.revision_of(key);
            if current != *expected {
                debug!(key = %key, ?expected, ?current, "Commit rejected by revision check");
                return Err(StoreError::Conflict(key.to_string()));
            }
        }

        for item in batch.items {
            trace!(item = %item.id, "Committing content item");
            state.put_item(item);
        }
        for entry in batch.ledgers {
            trace!(user = %entry.user, total = entry.total_score(), "Committing ledger entry");
            state.put_ledger(entry);
        }
        for record in batch.uploads {
            state
                .uploads
                .entry((record.owner.clone(), record.context.clone()))
                .or_default()
                .push(record);
        }
        Ok(())
    }

    async fn replace_ledgers(&self, entries: Vec<LedgerEntry>) -> Result<()> {
        let mut state = self.state.lock();
        debug!(count = entries.len(), "Replacing ledger collection");
        state.ledgers = entries
            .into_iter()
            .map(|entry| (entry.user.clone(), Versioned { value: entry, revision: 1 }))
            .collect();
        Ok(())
    }
}
