use axum::{
    extract::{multipart::Field, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::AppError;
use crate::services::{
    documents::ProofDocument,
    registration::{register_user, RegistrationRequest},
};

/// Room for the text fields and multipart framing on top of the document
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: Uuid,
    pub account_number: String,
    pub disability_types: Vec<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

fn malformed(e: impl std::fmt::Display) -> AppError {
    AppError::Validation(format!("Malformed multipart body: {}", e))
}

async fn text(field: Field<'_>) -> Result<String, AppError> {
    field.text().await.map_err(malformed)
}

/// Reads the registration form, accepting both field vocabularies.
async fn read_form(mut multipart: Multipart) -> Result<RegistrationRequest, AppError> {
    let mut request = RegistrationRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "firstName" | "prenom" => request.first_name = text(field).await?,
            "lastName" | "nom" => request.last_name = text(field).await?,
            "email" => request.email = text(field).await?,
            "address" | "adresse" => request.address = Some(text(field).await?),
            "password" => request.password = text(field).await?,
            "disabilityTypes" | "disabilityTypes[]" | "handicapTypes" | "handicapTypes[]" => {
                request.disability_types.push(text(field).await?)
            }
            "proofDocument" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(malformed)?;

                request.document = Some(ProofDocument {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            other => tracing::debug!(field = %other, "Ignoring unknown form field"),
        }
    }

    Ok(request)
}

async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let request = read_form(multipart).await?;

    let registration = register_user(
        state.store.as_ref(),
        state.documents.as_ref(),
        state.hasher.as_ref(),
        request,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration received; awaiting approval".to_string(),
            user_id: registration.user_id,
            account_number: registration.account_number,
            disability_types: registration.disability_types,
            warnings: registration.warnings,
        }),
    ))
}

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/inscription", post(register))
        .layer(DefaultBodyLimit::max(max_upload_bytes + FORM_OVERHEAD_BYTES))
}
