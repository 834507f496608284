use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AppState;
use crate::error::AppError;
use crate::models::ApprovalStatus;
use crate::services::authentication::authenticate;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub account_number: String,
    pub status: ApprovalStatus,
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = authenticate(
        state.store.as_ref(),
        state.hasher.as_ref(),
        &request.email,
        &request.password,
    )
    .await?;

    Ok(Json(LoginResponse {
        user_id: user.user_id,
        account_number: user.account_number,
        status: user.status,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}
