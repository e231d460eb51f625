//! Full-ledger reconciliation.
//!
//! Rebuilds every ledger entry from raw activity records (content items
//! with their embedded reactions and comments, plus attendance marks),
//! replacing
//! the incremental ledger wholesale. Corrects drift from partial failures,
//! manual edits, or schema migrations.
//!
//! Historical bonus amounts are intentionally discarded: the rebuild
//! reconstructs deterministic base totals only, so `bonus_score` is zero in
//! every reconciled entry. This is a design decision, not a bug.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::EngagementError;
use crate::model::{LedgerEntry, UserId};
use crate::store::{ContentStore, Roster};

type Result<T> = std::result::Result<T, EngagementError>;

/// What one reconciliation run processed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub users: usize,
    pub items_scanned: usize,
    pub attendance_records: usize,
}

/// Per-user counter accumulator, preserving roster order for rank ties.
#[derive(Debug, Default)]
struct Tally {
    order: Vec<UserId>,
    entries: HashMap<UserId, LedgerEntry>,
}

impl Tally {
    fn new(roster: Vec<UserId>) -> Self {
        let mut tally = Tally::default();
        for user in roster {
            if !tally.entries.contains_key(&user) {
                tally.entries.insert(user.clone(), LedgerEntry::new(user.clone()));
                tally.order.push(user);
            }
        }
        tally
    }

    /// Apply `f` to the user's counters. Users unknown to the roster are
    /// skipped silently; stale authors in old documents must not fail a run.
    fn bump<F: FnOnce(&mut LedgerEntry)>(&mut self, user: &str, f: F) {
        if let Some(entry) = self.entries.get_mut(user) {
            f(entry);
        }
    }

    /// Finish: weigh the counters into base scores, zero the bonuses, and
    /// assign dense ranks 1..N by descending total. The sort is stable, so
    /// ties keep roster order.
    fn into_entries(mut self) -> Vec<LedgerEntry> {
        let mut entries: Vec<LedgerEntry> = self
            .order
            .iter()
            .filter_map(|user| self.entries.remove(user))
            .collect();
        for entry in &mut entries {
            entry.base_score = entry.weighted_base();
            entry.bonus_score = 0;
        }
        entries.sort_by(|a, b| b.total_score().cmp(&a.total_score()));
        for (index, entry) in entries.iter_mut().enumerate() {
            entry.rank = Some(index as u32 + 1);
        }
        entries
    }
}

/// Rebuilds the whole ledger collection from raw records.
pub struct LedgerReconciler<S, T> {
    store: S,
    roster: T,
}

impl<S: ContentStore, T: Roster> LedgerReconciler<S, T> {
    pub fn new(store: S, roster: T) -> Self {
        Self { store, roster }
    }

    /// Recompute every ledger entry and atomically swap the collection.
    ///
    /// All reads complete before the single write; any read failure aborts
    /// the run with the prior ledger untouched. Re-running with unchanged
    /// inputs produces an identical ledger.
    pub async fn reconcile(&self) -> Result<ReconcileSummary> {
        let users = self.roster.list_users().await?;
        let items = self.store.list_items().await?;
        let attendance = self.store.list_attendance().await?;

        let mut tally = Tally::new(users);

        for item in &items {
            tally.bump(&item.owner, |entry| entry.photo_uploads += 1);
            for comment in &item.comments {
                tally.bump(&comment.author, |entry| entry.comments_added += 1);
            }
            for reactors in item.reactions.values() {
                for reactor in reactors {
                    tally.bump(reactor, |entry| entry.emojis_added += 1);
                    if reactor != &item.owner {
                        tally.bump(&item.owner, |entry| entry.emojis_received += 1);
                    }
                }
            }
        }
        for record in &attendance {
            tally.bump(&record.user, |entry| entry.attendance += 1);
        }

        let entries = tally.into_entries();
        let summary = ReconcileSummary {
            users: entries.len(),
            items_scanned: items.len(),
            attendance_records: attendance.len(),
        };
        debug!(?summary, "Reconciliation computed, swapping ledger collection");
        self.store.replace_ledgers(entries).await?;
        info!(
            users = summary.users,
            items = summary.items_scanned,
            "Ledger reconciled"
        );
        Ok(summary)
    }
}
