use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::NewUser;
use crate::repository::{RepositoryError, UserRepository};
use crate::services::{
    account_number::generate_account_number,
    disability_types::parse_disability_types,
    documents::{DocumentError, DocumentStore, ProofDocument},
    password::{check_strength, PasswordError, PasswordHasher},
};

const ACCOUNT_NUMBER_ATTEMPTS: usize = 3;

/// Registration input as submitted, before any validation
#[derive(Debug, Clone, Default)]
pub struct RegistrationRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address: Option<String>,
    pub password: String,
    /// Raw disability-type values, one per submitted form field
    pub disability_types: Vec<String>,
    pub document: Option<ProofDocument>,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub user_id: Uuid,
    pub account_number: String,
    pub disability_types: Vec<i32>,
    /// Disability-type values that were ignored
    pub warnings: Vec<String>,
}

/// Emails are compared trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn required(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Creates a pending applicant.
///
/// This function:
/// 1. Validates the identity fields, password and proof document
/// 2. Rejects an email that is already registered
/// 3. Stores the document and hashes the password
/// 4. Inserts the user with its disability declarations, regenerating the
///    account number on collision
#[tracing::instrument(skip_all, fields(email = %request.email))]
pub async fn register_user<S, D, H>(
    store: &S,
    documents: &D,
    hasher: &H,
    request: RegistrationRequest,
) -> Result<Registration, AppError>
where
    S: UserRepository + ?Sized,
    D: DocumentStore + ?Sized,
    H: PasswordHasher + ?Sized,
{
    required(&request.first_name, "First name")?;
    required(&request.last_name, "Last name")?;
    required(&request.email, "Email")?;
    required(&request.password, "Password")?;

    let email = normalize_email(&request.email);
    if !email.contains('@') {
        return Err(AppError::Validation("Email is malformed".to_string()));
    }

    if request.disability_types.iter().all(|v| v.trim().is_empty()) {
        return Err(AppError::Validation(
            "At least one disability type is required".to_string(),
        ));
    }

    let document = request
        .document
        .as_ref()
        .ok_or(AppError::from(DocumentError::Missing))?;
    document.validate(documents.max_bytes())?;

    check_strength(&request.password).map_err(|e| AppError::Validation(e.to_string()))?;

    let parsed = parse_disability_types(&request.disability_types);
    for warning in &parsed.warnings {
        tracing::warn!(warning = %warning, "Ignoring disability type value");
    }
    if parsed.ids.is_empty() {
        tracing::warn!("No valid disability type recovered; registering without declarations");
    }

    if store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = hasher.hash(&request.password).await.map_err(|e| match e {
        PasswordError::TooShort => AppError::Validation(e.to_string()),
        PasswordError::Hashing(msg) => AppError::Internal(anyhow::anyhow!(msg)),
    })?;

    let proof_document_ref = documents.save(document).await?;

    let address = request
        .address
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);

    let mut attempt = 0;
    let user = loop {
        attempt += 1;

        let new_user = NewUser {
            email: email.clone(),
            password_hash: password_hash.clone(),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            address: address.clone(),
            account_number: generate_account_number(Utc::now()),
            proof_document_ref: proof_document_ref.clone(),
        };

        match store.create_user(new_user, &parsed.ids).await {
            Ok(user) => break user,
            Err(RepositoryError::DuplicateAccountNumber) if attempt < ACCOUNT_NUMBER_ATTEMPTS => {
                tracing::warn!(attempt, "Account number collision, regenerating");
            }
            Err(e) => {
                documents.discard(&proof_document_ref).await;
                return Err(e.into());
            }
        }
    };

    tracing::info!(
        user_id = %user.id,
        account_number = %user.account_number,
        disability_types = ?parsed.ids,
        "Applicant registered"
    );

    Ok(Registration {
        user_id: user.id,
        account_number: user.account_number,
        disability_types: parsed.ids,
        warnings: parsed.warnings.iter().map(ToString::to_string).collect(),
    })
}
