//! Engagement scoring core for Caravan.
//!
//! Turns user interactions on trip content (emoji toggles, comments, photo
//! uploads) into point changes for one or two ledgers, with probabilistic
//! bonus rewards and idempotent toggle semantics, plus a full-ledger
//! reconciliation job that rebuilds every score from raw activity records.
//!
//! The hosted document store and the participant roster are collaborators
//! behind the [`store::ContentStore`] and [`store::Roster`] traits;
//! [`store::MemoryContentStore`] is the in-process reference implementation.

pub mod bonus;
pub mod error;
pub mod model;
pub mod processor;
pub mod reconcile;
pub mod store;

pub use bonus::{Bonus, BonusSchedule, compute_bonus};
pub use error::EngagementError;
pub use model::{
    AttendanceRecord, Comment, ContentId, ContentItem, LedgerEntry, Participant, UploadRecord,
    UserId,
};
pub use processor::{InteractionProcessor, ToggleAction, ToggleOutcome, UploadOutcome};
pub use reconcile::{LedgerReconciler, ReconcileSummary};
pub use store::{
    ContentStore, DocKey, MemoryContentStore, Roster, StaticRoster, StoreError, Versioned,
    WriteBatch,
};
