use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::AppError;
use crate::models::{Accommodation, ApprovalStatus, User};
use crate::services::access_verification::verify_account_number;

/// Public projection of a user; never carries the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub account_number: String,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            address: user.address,
            account_number: user.account_number,
            status: user.approval_status,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccommodationView {
    pub id: i32,
    pub service_name: String,
    pub service_description: Option<String>,
    pub province: Option<String>,
}

impl From<Accommodation> for AccommodationView {
    fn from(accommodation: Accommodation) -> Self {
        Self {
            id: accommodation.id,
            service_name: accommodation.service_name,
            service_description: accommodation.service_description,
            province: accommodation.province,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedHolderView {
    pub first_name: String,
    pub last_name: String,
    pub account_number: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub user: VerifiedHolderView,
    pub services: Vec<AccommodationView>,
}

async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserProfile>, AppError> {
    let user = state
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

    Ok(Json(user.into()))
}

async fn get_user_services(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<AccommodationView>>, AppError> {
    if state.store.find_user_by_id(user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }

    let accommodations = state.store.accommodations_for_user(user_id).await?;

    Ok(Json(accommodations.into_iter().map(Into::into).collect()))
}

async fn verify(
    State(state): State<AppState>,
    Path(account_number): Path<String>,
) -> Result<Json<VerifyResponse>, AppError> {
    let holder = verify_account_number(state.store.as_ref(), &account_number).await?;

    Ok(Json(VerifyResponse {
        user: VerifiedHolderView {
            first_name: holder.user.first_name,
            last_name: holder.user.last_name,
            account_number: holder.user.account_number,
        },
        services: holder.accommodations.into_iter().map(Into::into).collect(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user/:user_id", get(get_user))
        .route("/user/:user_id/services", get(get_user_services))
        .route("/verify/:account_number", get(verify))
}
