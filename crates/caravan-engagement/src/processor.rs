//! The transactional core: one user action in, one atomic commit out.
//!
//! Every operation reads its full pre-image, computes the new state, and
//! commits a single revision-checked batch. A conflicting concurrent write
//! surfaces as [`EngagementError::Retryable`]; the caller re-attempts the
//! whole operation from a fresh read, so no partial application is ever
//! visible. The processor itself holds no locks across its store calls.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

use crate::bonus::{Bonus, BonusSchedule, compute_bonus};
use crate::error::EngagementError;
use crate::model::{
    COMMENT_POINTS, Comment, LedgerEntry, REACTION_POINTS, REACTION_RECEIVED_POINTS,
    UPLOAD_POINTS, UploadRecord,
};
use crate::store::{ContentStore, DocKey, WriteBatch};

type Result<T> = std::result::Result<T, EngagementError>;

/// Direction a toggle resolved to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleAction {
    Added,
    Removed,
}

/// Result of [`InteractionProcessor::toggle_emoji`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub action: ToggleAction,
    pub emoji: String,
    /// Reactor count for this emoji after the toggle.
    pub reactor_count: usize,
    /// Celebration messages for any bonuses won. Cosmetic only.
    pub notes: Vec<String>,
}

/// Result of [`InteractionProcessor::record_upload`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    pub first_in_context: bool,
    pub bonus: Bonus,
}

/// Applies one user action to one content item and the affected ledgers.
///
/// Generic over the store; the RNG behind the bonus rolls is injected so
/// tests can drive deterministic sequences.
pub struct InteractionProcessor<S, R = StdRng> {
    store: S,
    rng: Mutex<R>,
}

impl<S: ContentStore> InteractionProcessor<S> {
    /// A processor with an OS-seeded RNG.
    pub fn new(store: S) -> Self {
        Self::with_rng(store, StdRng::from_os_rng())
    }
}

impl<S: ContentStore, R: Rng + Send> InteractionProcessor<S, R> {
    pub fn with_rng(store: S, rng: R) -> Self {
        Self { store, rng: Mutex::new(rng) }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn roll(&self, schedule: BonusSchedule, first_of_kind: bool) -> Bonus {
        compute_bonus(&mut *self.rng.lock(), schedule, first_of_kind)
    }

    /// Toggle `actor`'s `emoji` reaction on a content item.
    ///
    /// Addition pays the flat reaction point plus a bonus roll to the actor
    /// and, when the actor is not the owner, the flat received point plus an
    /// independent bonus roll (same first-of-kind flag) to the owner.
    /// Removal reverses only the flat points; a previously paid bonus is
    /// never reclaimed.
    pub async fn toggle_emoji(
        &self,
        item_id: &str,
        emoji: &str,
        actor: &str,
    ) -> Result<ToggleOutcome> {
        if item_id.is_empty() || actor.is_empty() {
            return Err(EngagementError::InvalidInput("item id and actor are required"));
        }
        if emoji.is_empty() {
            return Err(EngagementError::InvalidInput("emoji is required"));
        }

        let versioned = self
            .store
            .item(item_id)
            .await?
            .ok_or_else(|| EngagementError::NotFound(item_id.to_string()))?;
        let mut item = versioned.value;
        let owner = item.owner.clone();

        let mut batch = WriteBatch::new();
        batch.expect(DocKey::Item(item_id.to_string()), Some(versioned.revision));

        if item.has_reaction(emoji, actor) {
            item.remove_reaction(emoji, actor);
            let reactor_count = item.reactor_count(emoji);

            // Removal against a missing ledger is a scoring no-op; the
            // reactor-set change still commits.
            if let Some(ledger) = self.store.ledger(actor).await? {
                batch.expect(DocKey::Ledger(actor.to_string()), Some(ledger.revision));
                let mut entry = ledger.value;
                entry.emojis_added = entry.emojis_added.saturating_sub(1);
                entry.base_score = entry.base_score.saturating_sub(REACTION_POINTS);
                batch.put_ledger(entry);
            }
            if actor != owner {
                if let Some(ledger) = self.store.ledger(&owner).await? {
                    batch.expect(DocKey::Ledger(owner.clone()), Some(ledger.revision));
                    let mut entry = ledger.value;
                    entry.emojis_received = entry.emojis_received.saturating_sub(1);
                    entry.base_score = entry.base_score.saturating_sub(REACTION_RECEIVED_POINTS);
                    batch.put_ledger(entry);
                }
            }

            batch.put_item(item);
            self.store.commit(batch).await?;
            debug!(item = %item_id, emoji, actor, "Reaction removed");
            return Ok(ToggleOutcome {
                action: ToggleAction::Removed,
                emoji: emoji.to_string(),
                reactor_count,
                notes: Vec::new(),
            });
        }

        // First-of-kind is decided once, from the pre-image.
        let first_of_kind = item.has_no_reactions();
        item.add_reaction(emoji, actor);
        let reactor_count = item.reactor_count(emoji);

        let mut notes = Vec::new();

        let actor_bonus = self.roll(BonusSchedule::Reaction, first_of_kind);
        let (mut entry, revision) = self.ledger_or_new(actor).await?;
        batch.expect(DocKey::Ledger(actor.to_string()), revision);
        entry.emojis_added += 1;
        entry.base_score += REACTION_POINTS;
        entry.bonus_score += actor_bonus.points;
        if let Some(label) = actor_bonus.label {
            notes.push(label);
        }
        batch.put_ledger(entry);

        if actor != owner {
            // The owner rolls their own bonus for the reaction received,
            // with the same first-of-kind flag. Both parties can win on the
            // same event.
            let owner_bonus = self.roll(BonusSchedule::Reaction, first_of_kind);
            let (mut entry, revision) = self.ledger_or_new(&owner).await?;
            batch.expect(DocKey::Ledger(owner.clone()), revision);
            entry.emojis_received += 1;
            entry.base_score += REACTION_RECEIVED_POINTS;
            entry.bonus_score += owner_bonus.points;
            if let Some(label) = owner_bonus.label {
                notes.push(format!("{label} (to {owner})"));
            }
            batch.put_ledger(entry);
        }

        batch.put_item(item);
        self.store.commit(batch).await?;
        debug!(item = %item_id, emoji, actor, first_of_kind, "Reaction added");
        Ok(ToggleOutcome {
            action: ToggleAction::Added,
            emoji: emoji.to_string(),
            reactor_count,
            notes,
        })
    }

    /// Append a comment and pay the author the flat comment points.
    /// Comments never roll bonuses.
    pub async fn add_comment(
        &self,
        item_id: &str,
        author: &str,
        text: &str,
        now: i64,
    ) -> Result<Comment> {
        if item_id.is_empty() || author.is_empty() {
            return Err(EngagementError::InvalidInput("item id and author are required"));
        }
        if text.is_empty() {
            return Err(EngagementError::InvalidInput("comment text is required"));
        }

        let versioned = self
            .store
            .item(item_id)
            .await?
            .ok_or_else(|| EngagementError::NotFound(item_id.to_string()))?;
        let mut item = versioned.value;

        let comment = Comment {
            author: author.to_string(),
            text: text.to_string(),
            timestamp: now,
        };
        item.push_comment(comment.clone());

        let mut batch = WriteBatch::new();
        batch.expect(DocKey::Item(item_id.to_string()), Some(versioned.revision));

        let (mut entry, revision) = self.ledger_or_new(author).await?;
        batch.expect(DocKey::Ledger(author.to_string()), revision);
        entry.comments_added += 1;
        entry.base_score += COMMENT_POINTS;
        batch.put_ledger(entry);

        batch.put_item(item);
        self.store.commit(batch).await?;
        debug!(item = %item_id, author, "Comment added");
        Ok(comment)
    }

    /// Score an upload by `owner` under an opaque `context` key.
    ///
    /// First-of-kind iff the owner has no prior upload under an equal
    /// context. The upload log's length takes part in the commit's
    /// revision check, so two racing first uploads cannot both win the
    /// first bonus.
    pub async fn record_upload(
        &self,
        owner: &str,
        context: &str,
        now: i64,
    ) -> Result<UploadOutcome> {
        if owner.is_empty() || context.is_empty() {
            return Err(EngagementError::InvalidInput("owner and context are required"));
        }

        let prior = self.store.upload_count(owner, context).await?;
        let first_in_context = prior == 0;
        let bonus = self.roll(BonusSchedule::Upload, first_in_context);

        let mut batch = WriteBatch::new();
        batch.expect(DocKey::Uploads(owner.to_string(), context.to_string()), Some(prior));

        let (mut entry, revision) = self.ledger_or_new(owner).await?;
        batch.expect(DocKey::Ledger(owner.to_string()), revision);
        entry.photo_uploads += 1;
        entry.base_score += UPLOAD_POINTS;
        entry.bonus_score += bonus.points;
        batch.put_ledger(entry);

        batch.push_upload(UploadRecord {
            owner: owner.to_string(),
            context: context.to_string(),
            timestamp: now,
        });

        self.store.commit(batch).await?;
        debug!(owner, context, first_in_context, bonus = bonus.points, "Upload recorded");
        Ok(UploadOutcome { first_in_context, bonus })
    }

    /// Read a ledger entry and the revision to expect at commit, creating a
    /// zeroed entry (expected absent) for first-time users.
    async fn ledger_or_new(&self, user: &str) -> Result<(LedgerEntry, Option<u64>)> {
        Ok(match self.store.ledger(user).await? {
            Some(versioned) => (versioned.value, Some(versioned.revision)),
            None => (LedgerEntry::new(user), None),
        })
    }
}
