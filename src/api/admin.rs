use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::api::{middleware::auth::require_admin, AppState};
use crate::error::AppError;
use crate::models::{AccessCard, ApprovalStatus, CardUpdate, User};
use crate::services::approval::decide;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub proof_document_ref: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PendingUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            proof_document_ref: user.proof_document_ref,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    #[serde(alias = "approuve")]
    pub approve: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub message: String,
    pub user_id: Uuid,
    pub status: ApprovalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_uid: Option<String>,
    pub accommodation_ids: Vec<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionCardRequest {
    pub uid: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// `expiresAt` absent leaves the expiry alone; `null` clears it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCardRequest {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<DateTime<Utc>>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub id: i64,
    pub uid: String,
    pub user_id: Option<Uuid>,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_scanned_at: Option<DateTime<Utc>>,
}

impl From<AccessCard> for CardView {
    fn from(card: AccessCard) -> Self {
        Self {
            id: card.id,
            uid: card.card_uid,
            user_id: card.user_id,
            active: card.active,
            expires_at: card.expires_at,
            last_scanned_at: card.last_scanned_at,
        }
    }
}

async fn pending_users(State(state): State<AppState>) -> Result<Json<Vec<PendingUser>>, AppError> {
    let users = state.store.list_pending_users().await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

async fn validate_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>, AppError> {
    let outcome = decide(state.store.as_ref(), user_id, request.approve).await?;

    Ok(Json(DecisionResponse {
        message: outcome.message,
        user_id: outcome.user_id,
        status: outcome.status,
        card_uid: outcome.card_uid,
        accommodation_ids: outcome.accommodation_ids,
    }))
}

async fn provision_card(
    State(state): State<AppState>,
    Json(request): Json<ProvisionCardRequest>,
) -> Result<(StatusCode, Json<CardView>), AppError> {
    let uid = request.uid.trim();
    if uid.is_empty() {
        return Err(AppError::Validation("Card uid is required".to_string()));
    }

    let card = state.store.provision_card(uid, request.expires_at).await?;
    tracing::info!(card_uid = %card.card_uid, "Access card provisioned");

    Ok((StatusCode::CREATED, Json(card.into())))
}

async fn update_card(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(request): Json<UpdateCardRequest>,
) -> Result<Json<CardView>, AppError> {
    let update = CardUpdate {
        active: request.active,
        expires_at: request.expires_at,
    };

    let card = state
        .store
        .update_card(&uid, update)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Card {} not found", uid)))?;

    tracing::info!(card_uid = %card.card_uid, active = card.active, "Access card updated");

    Ok(Json(card.into()))
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/pending-users", get(pending_users))
        .route("/validate/:user_id", post(validate_user))
        .route("/cards", post(provision_card))
        .route("/cards/:uid", patch(update_card))
        .route_layer(middleware::from_fn_with_state(state, require_admin))
}

/// The decision route under its original path, guarded like the others
pub fn legacy_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/validation/valider/:user_id", post(validate_user))
        .route_layer(middleware::from_fn_with_state(state, require_admin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let absent: UpdateCardRequest = serde_json::from_str(r#"{"active": false}"#).unwrap();
        assert_eq!(absent.active, Some(false));
        assert_eq!(absent.expires_at, None);

        let cleared: UpdateCardRequest = serde_json::from_str(r#"{"expiresAt": null}"#).unwrap();
        assert_eq!(cleared.expires_at, Some(None));

        let set: UpdateCardRequest =
            serde_json::from_str(r#"{"expiresAt": "2030-01-01T00:00:00Z"}"#).unwrap();
        assert!(matches!(set.expires_at, Some(Some(_))));
    }

    #[test]
    fn test_decision_accepts_original_field_name() {
        let request: DecisionRequest = serde_json::from_str(r#"{"approuve": true}"#).unwrap();
        assert!(request.approve);
    }
}
