//! Domain models for the engagement subsystem.
//!
//! Everything here is a plain document shape: content items with embedded
//! reaction and comment data, per-user ledger entries, and the raw activity
//! records the reconciler scans. Mutation rules live in the processor, not
//! in these types.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Participant identity as issued by the login collaborator.
pub type UserId = String;

/// Content item identity as issued by the document store.
pub type ContentId = String;

// Fixed per-action point weights. Tunable constants, not derived.
pub const ATTENDANCE_POINTS: u64 = 10;
pub const UPLOAD_POINTS: u64 = 5;
pub const COMMENT_POINTS: u64 = 2;
pub const REACTION_POINTS: u64 = 1;
pub const REACTION_RECEIVED_POINTS: u64 = 1;

/// A participant in a training trip. Created at login, never mutated here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: UserId,
    pub display_name: String,
    /// Group/region affiliation, e.g. a squad name.
    pub squad: Option<String>,
}

/// A comment on a content item. Order is chronological, duplicates allowed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: UserId,
    pub text: String,
    pub timestamp: i64,
}

/// A photo/post record carrying reactions and comments.
///
/// `reactions` maps an emoji symbol to the set of users currently reacting
/// with it. Membership-only semantics: a user reacts with a given emoji at
/// most once. Emptied sets are pruned so a serialized item stays canonical.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub owner: UserId,
    #[serde(default)]
    pub reactions: BTreeMap<String, BTreeSet<UserId>>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub created_at: i64,
}

impl ContentItem {
    pub fn new(id: impl Into<ContentId>, owner: impl Into<UserId>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            reactions: BTreeMap::new(),
            comments: Vec::new(),
            created_at,
        }
    }

    pub fn has_reaction(&self, emoji: &str, user: &str) -> bool {
        self.reactions
            .get(emoji)
            .map(|set| set.contains(user))
            .unwrap_or(false)
    }

    pub fn reactor_count(&self, emoji: &str) -> usize {
        self.reactions.get(emoji).map(|set| set.len()).unwrap_or(0)
    }

    /// True while no emoji on this item has any reactor.
    pub fn has_no_reactions(&self) -> bool {
        self.reactions.values().all(|set| set.is_empty())
    }

    /// Add `user` to the reactor set for `emoji`. Returns false if already present.
    pub fn add_reaction(&mut self, emoji: &str, user: &str) -> bool {
        self.reactions
            .entry(emoji.to_string())
            .or_default()
            .insert(user.to_string())
    }

    /// Remove `user` from the reactor set for `emoji`, pruning an emptied set.
    /// Returns false if the user was not reacting.
    pub fn remove_reaction(&mut self, emoji: &str, user: &str) -> bool {
        let Some(set) = self.reactions.get_mut(emoji) else {
            return false;
        };
        let removed = set.remove(user);
        if set.is_empty() {
            self.reactions.remove(emoji);
        }
        removed
    }

    pub fn push_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }
}

/// Per-user accumulated score record.
///
/// `total_score()` is base plus bonus by construction. Counters never go
/// negative (decrements saturate). `rank` is assigned only by the
/// reconciler; live increments leave it untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub user: UserId,
    pub base_score: u64,
    pub bonus_score: u64,
    pub photo_uploads: u64,
    pub comments_added: u64,
    pub emojis_added: u64,
    pub emojis_received: u64,
    pub attendance: u64,
    pub rank: Option<u32>,
}

impl LedgerEntry {
    /// An entry with zero counters, as created lazily on a first action.
    pub fn new(user: impl Into<UserId>) -> Self {
        Self {
            user: user.into(),
            base_score: 0,
            bonus_score: 0,
            photo_uploads: 0,
            comments_added: 0,
            emojis_added: 0,
            emojis_received: 0,
            attendance: 0,
            rank: None,
        }
    }

    pub fn total_score(&self) -> u64 {
        self.base_score + self.bonus_score
    }

    /// Fixed-weight sum over the counters, as the reconciler recomputes base
    /// scores. The live path applies the same weights incrementally.
    pub fn weighted_base(&self) -> u64 {
        self.attendance * ATTENDANCE_POINTS
            + self.photo_uploads * UPLOAD_POINTS
            + self.comments_added * COMMENT_POINTS
            + self.emojis_added * REACTION_POINTS
            + self.emojis_received * REACTION_RECEIVED_POINTS
    }
}

/// Attendance mark for one session, written by trip-schedule plumbing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub user: UserId,
    pub session: String,
    pub timestamp: i64,
}

/// One recorded upload under an opaque scoping context (a meal slot, a
/// schedule item). Contexts are equality-compared, nothing more.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub owner: UserId,
    pub context: String,
    pub timestamp: i64,
}
