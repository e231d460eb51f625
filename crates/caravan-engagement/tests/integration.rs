use std::sync::Arc;

use rand::RngCore;

use caravan_engagement::*;

// Test participants
const ANA: &str = "ana";
const BEN: &str = "ben";
const CAM: &str = "cam";

const LUNCH: &str = "2025-08-06-lunch";

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// RNG that always yields the same u64, so every `random::<f64>()` draw
/// lands on a chosen point in [0, 1).
struct FixedRng(u64);

impl RngCore for FixedRng {
    fn next_u32(&mut self) -> u32 {
        self.0 as u32
    }
    fn next_u64(&mut self) -> u64 {
        self.0
    }
    fn fill_bytes(&mut self, dst: &mut [u8]) {
        dst.fill(0);
    }
}

/// The u64 the standard f64 sampler (53 high bits) maps to `p`.
fn raw_for(p: f64) -> u64 {
    ((p * (1u64 << 53) as f64) as u64) << 11
}

/// An RNG whose draws always land outside both bonus bands, so only
/// first-of-kind bonuses pay out. Keeps scoring arithmetic exact.
fn losing_rng() -> FixedRng {
    FixedRng(raw_for(0.5))
}

fn fixture() -> (Arc<MemoryContentStore>, InteractionProcessor<Arc<MemoryContentStore>, FixedRng>) {
    let store = Arc::new(MemoryContentStore::new());
    let processor = InteractionProcessor::with_rng(store.clone(), losing_rng());
    (store, processor)
}

async fn ledger(store: &MemoryContentStore, user: &str) -> LedgerEntry {
    store
        .ledger(user)
        .await
        .unwrap()
        .expect("ledger entry should exist")
        .value
}

fn roster(users: &[&str]) -> StaticRoster {
    StaticRoster::new(
        users
            .iter()
            .map(|id| Participant {
                id: id.to_string(),
                display_name: id.to_string(),
                squad: None,
            })
            .collect(),
    )
}

// ----------------------------------------------------------------------------
// Emoji toggle
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_toggle_adds_then_removes() {
    let (store, processor) = fixture();
    store.insert_item(ContentItem::new("photo-1", ANA, 1_000));

    let added = processor.toggle_emoji("photo-1", "👍", BEN).await.unwrap();
    assert_eq!(added.action, ToggleAction::Added);
    assert_eq!(added.reactor_count, 1);

    let removed = processor.toggle_emoji("photo-1", "👍", BEN).await.unwrap();
    assert_eq!(removed.action, ToggleAction::Removed);
    assert_eq!(removed.reactor_count, 0);

    let item = store.item("photo-1").await.unwrap().unwrap().value;
    assert!(item.has_no_reactions());
}

#[tokio::test]
async fn test_toggle_reversibility_keeps_bonus() {
    let (store, processor) = fixture();
    store.insert_item(ContentItem::new("photo-1", ANA, 1_000));

    // First reaction on the item: both parties win the fixed first bonus
    processor.toggle_emoji("photo-1", "👍", BEN).await.unwrap();
    let ben_after_add = ledger(&store, BEN).await;
    let ana_after_add = ledger(&store, ANA).await;
    assert_eq!(ben_after_add.base_score, 1);
    assert_eq!(ben_after_add.bonus_score, 1);
    assert_eq!(ana_after_add.base_score, 1);
    assert_eq!(ana_after_add.bonus_score, 1);

    processor.toggle_emoji("photo-1", "👍", BEN).await.unwrap();
    let ben = ledger(&store, BEN).await;
    let ana = ledger(&store, ANA).await;

    // Flat points net to zero; the paid bonus is never reclaimed
    assert_eq!(ben.base_score, 0);
    assert_eq!(ben.emojis_added, 0);
    assert_eq!(ben.bonus_score, 1);
    assert_eq!(ana.base_score, 0);
    assert_eq!(ana.emojis_received, 0);
    assert_eq!(ana.bonus_score, 1);
}

#[tokio::test]
async fn test_first_of_kind_is_exclusive() {
    let (store, processor) = fixture();
    store.insert_item(ContentItem::new("photo-1", ANA, 1_000));

    processor.toggle_emoji("photo-1", "👍", BEN).await.unwrap();
    let ana_bonus_after_first = ledger(&store, ANA).await.bonus_score;
    assert_eq!(ledger(&store, BEN).await.bonus_score, 1);
    assert_eq!(ana_bonus_after_first, 1);

    // A second reaction, even with a different emoji, is no longer first
    // of kind, and the losing RNG pays nothing.
    processor.toggle_emoji("photo-1", "🔥", CAM).await.unwrap();
    assert_eq!(ledger(&store, CAM).await.bonus_score, 0);
    assert_eq!(ledger(&store, ANA).await.bonus_score, ana_bonus_after_first);
}

#[tokio::test]
async fn test_self_reaction_touches_one_ledger() {
    let (store, processor) = fixture();
    store.insert_item(ContentItem::new("photo-1", ANA, 1_000));

    let outcome = processor.toggle_emoji("photo-1", "👍", ANA).await.unwrap();
    assert_eq!(outcome.action, ToggleAction::Added);

    let ana = ledger(&store, ANA).await;
    assert_eq!(ana.emojis_added, 1);
    assert_eq!(ana.emojis_received, 0, "owner reacting to own photo receives nothing");
    assert_eq!(ana.base_score, 1);
    assert_eq!(ana.bonus_score, 1); // first-of-kind still pays the actor side
}

#[tokio::test]
async fn test_removal_without_ledger_is_scoring_noop() {
    let (store, processor) = fixture();
    let mut item = ContentItem::new("photo-1", ANA, 1_000);
    item.add_reaction("👍", BEN);
    store.insert_item(item);

    // Neither Ben nor Ana has a ledger entry; the toggle must still remove
    // the reaction and must not create negative-count ledgers.
    let outcome = processor.toggle_emoji("photo-1", "👍", BEN).await.unwrap();
    assert_eq!(outcome.action, ToggleAction::Removed);

    assert!(store.ledger(BEN).await.unwrap().is_none());
    assert!(store.ledger(ANA).await.unwrap().is_none());
    let item = store.item("photo-1").await.unwrap().unwrap().value;
    assert!(item.has_no_reactions());
}

#[tokio::test]
async fn test_counters_never_go_negative() {
    let (store, processor) = fixture();
    store.insert_item(ContentItem::new("photo-1", ANA, 1_000));

    // Ben comments (creating a ledger), then a seeded reaction he never
    // paid for is toggled off. Saturating arithmetic keeps everything at 0.
    processor.add_comment("photo-1", BEN, "great view", 1_500).await.unwrap();
    let mut item = store.item("photo-1").await.unwrap().unwrap().value;
    item.add_reaction("👍", BEN);
    store.insert_item(item);

    processor.toggle_emoji("photo-1", "👍", BEN).await.unwrap();
    let ben = ledger(&store, BEN).await;
    assert_eq!(ben.emojis_added, 0);
    assert_eq!(ben.base_score, 1, "comment points minus one reaction point, floored per field");
}

#[tokio::test]
async fn test_toggle_missing_item_is_not_found() {
    let (_, processor) = fixture();
    let err = processor.toggle_emoji("nope", "👍", BEN).await.unwrap_err();
    assert!(matches!(err, EngagementError::NotFound(id) if id == "nope"));
}

#[tokio::test]
async fn test_blank_identifiers_are_rejected() {
    let (store, processor) = fixture();
    store.insert_item(ContentItem::new("photo-1", ANA, 1_000));

    assert!(matches!(
        processor.toggle_emoji("photo-1", "", BEN).await,
        Err(EngagementError::InvalidInput(_))
    ));
    assert!(matches!(
        processor.toggle_emoji("", "👍", BEN).await,
        Err(EngagementError::InvalidInput(_))
    ));
    assert!(matches!(
        processor.add_comment("photo-1", "", "hi", 0).await,
        Err(EngagementError::InvalidInput(_))
    ));
    assert!(matches!(
        processor.record_upload(ANA, "", 0).await,
        Err(EngagementError::InvalidInput(_))
    ));
}

// ----------------------------------------------------------------------------
// Comments
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_comment_appends_and_scores() {
    let (store, processor) = fixture();
    store.insert_item(ContentItem::new("photo-1", ANA, 1_000));

    let comment = processor.add_comment("photo-1", BEN, "great view", 2_000).await.unwrap();
    assert_eq!(comment.author, BEN);
    assert_eq!(comment.text, "great view");
    assert_eq!(comment.timestamp, 2_000);

    let ben = ledger(&store, BEN).await;
    assert_eq!(ben.comments_added, 1);
    assert_eq!(ben.base_score, 2);
    assert_eq!(ben.bonus_score, 0, "comments never roll bonuses");
}

#[tokio::test]
async fn test_duplicate_comments_allowed_in_order() {
    let (store, processor) = fixture();
    store.insert_item(ContentItem::new("photo-1", ANA, 1_000));

    processor.add_comment("photo-1", BEN, "nice", 1_000).await.unwrap();
    processor.add_comment("photo-1", BEN, "nice", 2_000).await.unwrap();

    let item = store.item("photo-1").await.unwrap().unwrap().value;
    assert_eq!(item.comments.len(), 2);
    assert!(item.comments[0].timestamp <= item.comments[1].timestamp);
    assert_eq!(ledger(&store, BEN).await.comments_added, 2);
}

// ----------------------------------------------------------------------------
// Uploads
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_first_upload_in_context_pays_bonus() {
    let (store, processor) = fixture();

    let outcome = processor.record_upload(ANA, LUNCH, 1_000).await.unwrap();
    assert!(outcome.first_in_context);
    assert_eq!(outcome.bonus.points, 5);

    let ana = ledger(&store, ANA).await;
    assert_eq!(ana.photo_uploads, 1);
    assert_eq!(ana.base_score, 5);
    assert_eq!(ana.bonus_score, 5);
}

#[tokio::test]
async fn test_second_upload_same_context_is_not_first() {
    let (store, processor) = fixture();

    processor.record_upload(ANA, LUNCH, 1_000).await.unwrap();
    let second = processor.record_upload(ANA, LUNCH, 2_000).await.unwrap();
    assert!(!second.first_in_context);
    assert_eq!(second.bonus.points, 0, "losing RNG pays nothing off the first");

    let ana = ledger(&store, ANA).await;
    assert_eq!(ana.photo_uploads, 2);
    assert_eq!(ana.base_score, 10);
    assert_eq!(ana.bonus_score, 5);
}

#[tokio::test]
async fn test_contexts_are_independent_scopes() {
    let (store, processor) = fixture();

    let lunch = processor.record_upload(ANA, LUNCH, 1_000).await.unwrap();
    let dinner = processor.record_upload(ANA, "2025-08-06-dinner", 2_000).await.unwrap();
    assert!(lunch.first_in_context);
    assert!(dinner.first_in_context);
    assert_eq!(ledger(&store, ANA).await.bonus_score, 10);
}

// ----------------------------------------------------------------------------
// The worked scenario: upload, react, un-react
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_upload_react_unreact_scenario() {
    let (store, processor) = fixture();

    // Ana uploads a lunch photo
    store.insert_item(ContentItem::new("photo-1", ANA, 1_000));
    let upload = processor.record_upload(ANA, LUNCH, 1_000).await.unwrap();
    assert!(upload.first_in_context);
    let ana = ledger(&store, ANA).await;
    assert_eq!((ana.photo_uploads, ana.base_score, ana.bonus_score), (1, 5, 5));

    // Ben reacts 👍, the first reaction on the item. Ben gains 1 + 1,
    // Ana gains 1 received + her own first-reaction bonus of 1.
    processor.toggle_emoji("photo-1", "👍", BEN).await.unwrap();
    let ben = ledger(&store, BEN).await;
    let ana = ledger(&store, ANA).await;
    assert_eq!((ben.base_score, ben.bonus_score, ben.total_score()), (1, 1, 2));
    assert_eq!((ana.base_score, ana.bonus_score), (6, 6));
    assert_eq!(ana.emojis_received, 1);

    // Ben un-reacts: both sides lose only the flat point
    processor.toggle_emoji("photo-1", "👍", BEN).await.unwrap();
    let ben = ledger(&store, BEN).await;
    let ana = ledger(&store, ANA).await;
    assert_eq!((ben.base_score, ben.bonus_score), (0, 1));
    assert_eq!((ana.base_score, ana.bonus_score), (5, 6));
}

// ----------------------------------------------------------------------------
// Reconciliation
// ----------------------------------------------------------------------------

async fn seed_trip_activity(store: &Arc<MemoryContentStore>) {
    let processor = InteractionProcessor::with_rng(store.clone(), losing_rng());

    store.insert_item(ContentItem::new("photo-1", ANA, 1_000));
    processor.record_upload(ANA, LUNCH, 1_000).await.unwrap();
    processor.toggle_emoji("photo-1", "👍", BEN).await.unwrap();
    processor.toggle_emoji("photo-1", "🔥", CAM).await.unwrap();
    processor.add_comment("photo-1", BEN, "great view", 2_000).await.unwrap();

    store.insert_item(ContentItem::new("photo-2", BEN, 3_000));
    processor.record_upload(BEN, "2025-08-06-dinner", 3_000).await.unwrap();
    processor.toggle_emoji("photo-2", "👍", ANA).await.unwrap();

    store.record_attendance(AttendanceRecord {
        user: ANA.into(),
        session: "day-1".into(),
        timestamp: 500,
    });
    store.record_attendance(AttendanceRecord {
        user: ANA.into(),
        session: "day-2".into(),
        timestamp: 900,
    });
    store.record_attendance(AttendanceRecord {
        user: CAM.into(),
        session: "day-1".into(),
        timestamp: 500,
    });
}

#[tokio::test]
async fn test_reconcile_rebuilds_from_raw_records() {
    let store = Arc::new(MemoryContentStore::new());
    seed_trip_activity(&store).await;

    let reconciler = LedgerReconciler::new(store.clone(), roster(&[ANA, BEN, CAM]));
    let summary = reconciler.reconcile().await.unwrap();
    assert_eq!(summary.users, 3);
    assert_eq!(summary.items_scanned, 2);
    assert_eq!(summary.attendance_records, 3);

    // Ana: 2 attendance, 1 upload, 1 emoji added, 2 received = 20+5+1+2
    let ana = ledger(&store, ANA).await;
    assert_eq!(ana.attendance, 2);
    assert_eq!(ana.photo_uploads, 1);
    assert_eq!(ana.emojis_added, 1);
    assert_eq!(ana.emojis_received, 2);
    assert_eq!(ana.base_score, 28);
    assert_eq!(ana.bonus_score, 0, "reconciliation discards bonus history");

    // Ben: 1 upload, 1 emoji added, 1 received, 1 comment = 5+1+1+2
    let ben = ledger(&store, BEN).await;
    assert_eq!(ben.base_score, 9);

    // Cam: 1 attendance, 1 emoji added = 10+1
    let cam = ledger(&store, CAM).await;
    assert_eq!(cam.base_score, 11);
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let store = Arc::new(MemoryContentStore::new());
    seed_trip_activity(&store).await;
    let reconciler = LedgerReconciler::new(store.clone(), roster(&[ANA, BEN, CAM]));

    let snapshot = |entries: &mut Vec<LedgerEntry>| {
        entries.sort_by_key(|entry| entry.rank);
        serde_json::to_string(entries).unwrap()
    };

    reconciler.reconcile().await.unwrap();
    let mut first = store.list_ledgers().await.unwrap();
    reconciler.reconcile().await.unwrap();
    let mut second = store.list_ledgers().await.unwrap();

    assert_eq!(snapshot(&mut first), snapshot(&mut second), "re-runs must be byte-identical");
}

#[tokio::test]
async fn test_reconcile_ranks_are_dense_and_ordered() {
    let store = Arc::new(MemoryContentStore::new());
    seed_trip_activity(&store).await;
    let reconciler = LedgerReconciler::new(store.clone(), roster(&[ANA, BEN, CAM]));
    reconciler.reconcile().await.unwrap();

    let mut entries = store.list_ledgers().await.unwrap();
    entries.sort_by_key(|entry| entry.rank);

    for (index, entry) in entries.iter().enumerate() {
        assert_eq!(entry.rank, Some(index as u32 + 1), "ranks must be dense 1..N");
    }
    for pair in entries.windows(2) {
        assert!(
            pair[0].total_score() >= pair[1].total_score(),
            "totals must be non-increasing by rank"
        );
    }
}

#[tokio::test]
async fn test_reconcile_skips_unknown_authors() {
    let store = Arc::new(MemoryContentStore::new());
    let mut item = ContentItem::new("photo-1", ANA, 1_000);
    item.push_comment(Comment {
        author: "departed-user".into(),
        text: "was here".into(),
        timestamp: 1_500,
    });
    item.add_reaction("👍", "departed-user");
    store.insert_item(item);

    let reconciler = LedgerReconciler::new(store.clone(), roster(&[ANA]));
    let summary = reconciler.reconcile().await.unwrap();
    assert_eq!(summary.users, 1);

    assert!(store.ledger("departed-user").await.unwrap().is_none());
    // The unknown reactor still counts toward Ana's received tally
    let ana = ledger(&store, ANA).await;
    assert_eq!(ana.emojis_received, 1);
    assert_eq!(ana.photo_uploads, 1);
}

#[tokio::test]
async fn test_reconcile_replaces_stale_ledger_wholesale() {
    let store = Arc::new(MemoryContentStore::new());
    seed_trip_activity(&store).await;

    // A stale entry for someone no longer on the roster
    let mut batch = WriteBatch::new();
    batch.put_ledger(LedgerEntry::new("departed-user"));
    store.commit(batch).await.unwrap();

    let reconciler = LedgerReconciler::new(store.clone(), roster(&[ANA, BEN, CAM]));
    reconciler.reconcile().await.unwrap();

    assert!(store.ledger("departed-user").await.unwrap().is_none());
    assert_eq!(store.list_ledgers().await.unwrap().len(), 3);
}

// ----------------------------------------------------------------------------
// Error taxonomy
// ----------------------------------------------------------------------------

#[test]
fn test_store_conflict_maps_to_retryable() {
    let err = EngagementError::from(StoreError::Conflict("item/photo-1".into()));
    assert!(err.is_retryable());

    let err = EngagementError::from(StoreError::Backend("down".into()));
    assert!(!err.is_retryable());
    assert!(matches!(err, EngagementError::Store(_)));
}
