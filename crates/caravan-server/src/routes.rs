//! Route handlers. Thin by design: parse, call the engagement core, render.
//!
//! The processor surfaces `Retryable` instead of retrying internally, so the
//! retry budget lives here, at the caller.

use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use caravan_engagement::{
    Comment, ContentItem, ContentStore, EngagementError, LedgerEntry, Participant,
    ReconcileSummary, ToggleOutcome,
};

use crate::error::ApiError;
use crate::state::SharedState;

/// Re-attempts for an operation that lost a transactional race, before the
/// conflict is handed back to the client as 409.
const RETRY_BUDGET: u32 = 3;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/items/{id}", get(get_item))
        .route("/items/{id}/reactions/{emoji}/toggle", post(toggle_reaction))
        .route("/items/{id}/comments", post(add_comment))
        .route("/uploads", post(upload_photo))
        .route("/ledger", get(list_ledger))
        .route("/roster", get(list_roster))
        .route("/admin/reconcile", post(reconcile))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub user: String,
}

async fn toggle_reaction(
    State(state): State<SharedState>,
    Path((id, emoji)): Path<(String, String)>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<ToggleOutcome>, ApiError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match state.processor.toggle_emoji(&id, &emoji, &body.user).await {
            Ok(outcome) => return Ok(Json(outcome)),
            Err(EngagementError::Retryable) if attempt < RETRY_BUDGET => {
                debug!(attempt, item = %id, "Toggle lost a write race, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub author: String,
    pub text: String,
}

async fn add_comment(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<CommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    let now = Utc::now().timestamp_millis();
    let mut attempt = 0;
    loop {
        attempt += 1;
        match state.processor.add_comment(&id, &body.author, &body.text, now).await {
            Ok(comment) => return Ok(Json(comment)),
            Err(EngagementError::Retryable) if attempt < RETRY_BUDGET => {
                debug!(attempt, item = %id, "Comment lost a write race, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub owner: String,
    pub context: String,
}

/// Create the content item and score the upload. The file bytes themselves
/// go through the storage collaborator, not this service.
async fn upload_photo(
    State(state): State<SharedState>,
    Json(body): Json<UploadRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.owner.is_empty() || body.context.is_empty() {
        return Err(EngagementError::InvalidInput("owner and context are required").into());
    }

    let now = Utc::now().timestamp_millis();
    let item_id = state.next_content_id();
    state
        .store
        .insert_item(ContentItem::new(item_id.clone(), body.owner.clone(), now));

    let mut attempt = 0;
    let outcome = loop {
        attempt += 1;
        match state.processor.record_upload(&body.owner, &body.context, now).await {
            Ok(outcome) => break outcome,
            Err(EngagementError::Retryable) if attempt < RETRY_BUDGET => {
                debug!(attempt, owner = %body.owner, "Upload scoring lost a write race, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    };

    Ok(Json(json!({
        "item_id": item_id,
        "first_in_context": outcome.first_in_context,
        "bonus": outcome.bonus,
    })))
}

async fn get_item(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ContentItem>, ApiError> {
    let item = state
        .store
        .item(&id)
        .await?
        .ok_or(EngagementError::NotFound(id))?;
    Ok(Json(item.value))
}

/// Ranking view: ledger entries by descending total score.
async fn list_ledger(
    State(state): State<SharedState>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    let mut entries = state.store.list_ledgers().await?;
    entries.sort_by(|a, b| b.total_score().cmp(&a.total_score()));
    Ok(Json(entries))
}

async fn list_roster(State(state): State<SharedState>) -> Json<Vec<Participant>> {
    Json(state.roster.participants().to_vec())
}

async fn reconcile(
    State(state): State<SharedState>,
) -> Result<Json<ReconcileSummary>, ApiError> {
    let summary = state.reconciler.reconcile().await?;
    Ok(Json(summary))
}
