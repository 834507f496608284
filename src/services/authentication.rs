use uuid::Uuid;

use crate::error::AppError;
use crate::models::ApprovalStatus;
use crate::repository::UserRepository;
use crate::services::{password::PasswordHasher, registration::normalize_email};

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub account_number: String,
    pub status: ApprovalStatus,
}

/// Checks credentials, then the approval gate.
///
/// An unknown email and a wrong password fail identically. Only approved
/// users get through; the status of the others is carried by the error.
#[tracing::instrument(skip(store, hasher, password))]
pub async fn authenticate<S, H>(
    store: &S,
    hasher: &H,
    email: &str,
    password: &str,
) -> Result<AuthenticatedUser, AppError>
where
    S: UserRepository + ?Sized,
    H: PasswordHasher + ?Sized,
{
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let user = store
        .find_user_by_email(&normalize_email(email))
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !hasher.verify(password, &user.password_hash).await {
        tracing::debug!(user_id = %user.id, "Password mismatch");
        return Err(AppError::InvalidCredentials);
    }

    if let Some(err) = AppError::for_unapproved(user.approval_status) {
        tracing::info!(
            user_id = %user.id,
            status = %user.approval_status,
            "Login refused by approval gate"
        );
        return Err(err);
    }

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(AuthenticatedUser {
        user_id: user.id,
        account_number: user.account_number,
        status: user.approval_status,
    })
}
