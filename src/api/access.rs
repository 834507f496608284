use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::AppState;
use crate::services::access_verification::{
    verify_scan, Access, DenialReason, ScanDecision,
};

/// Readers send the uid as a string or a bare number.
#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub uid: Value,
}

impl ScanRequest {
    /// Scalars are stringified; anything else counts as no uid.
    pub fn uid_text(&self) -> String {
        match &self.uid {
            Value::String(uid) => uid.clone(),
            Value::Number(uid) => uid.to_string(),
            Value::Bool(uid) => uid.to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub access: Access,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
}

impl From<ScanDecision> for ScanResponse {
    fn from(decision: ScanDecision) -> Self {
        Self {
            access: decision.access,
            name: decision.name,
            reason: decision.reason,
        }
    }
}

/// Always answers with an access decision, even on failure.
async fn scan(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> (StatusCode, Json<ScanResponse>) {
    match verify_scan(state.store.clone(), &request.uid_text()).await {
        Ok(decision) => {
            let status = if decision.reason == Some(DenialReason::NoUid) {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::OK
            };
            (status, Json(decision.into()))
        }
        Err(e) => {
            tracing::error!(error = %e, "Scan lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ScanDecision::denied(DenialReason::DbError, String::new()).into()),
            )
        }
    }
}

/// Reader-facing endpoints at the root, as the card readers call them
pub fn scan_router() -> Router<AppState> {
    Router::new()
        .route("/scan", post(scan))
        .route("/check", post(scan))
}

pub fn api_router() -> Router<AppState> {
    Router::new().route("/scan", post(scan))
}
