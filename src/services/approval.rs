//! Administrator decision on a pending application.
//!
//! Rejection only records the status. Approval records the status first and
//! then runs accommodation and card assignment as best-effort follow-ups: a
//! failure in either is logged and surfaced in the outcome message, never
//! rolled back into the decision.

use uuid::Uuid;

use crate::error::AppError;
use crate::models::ApprovalStatus;
use crate::repository::{DecisionRecord, Store};
use crate::services::{
    accommodation_assignment::assign_accommodations,
    card_assignment::{assign_card, CardAssignment},
};

#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub user_id: Uuid,
    pub status: ApprovalStatus,
    pub card_uid: Option<String>,
    pub accommodation_ids: Vec<i32>,
    pub message: String,
}

#[tracing::instrument(skip(store))]
pub async fn decide<S>(store: &S, user_id: Uuid, approve: bool) -> Result<ApprovalOutcome, AppError>
where
    S: Store + ?Sized,
{
    let target = if approve {
        ApprovalStatus::Approved
    } else {
        ApprovalStatus::Rejected
    };

    match store.record_decision(user_id, target).await? {
        DecisionRecord::Recorded => {}
        DecisionRecord::UnknownUser => {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }
        DecisionRecord::AlreadyDecided(current) => {
            tracing::warn!(current = %current, requested = %target, "Decision already recorded");
            return Err(AppError::Conflict(format!("User is already {}", current)));
        }
    }

    if !approve {
        tracing::info!("User rejected");
        return Ok(ApprovalOutcome {
            user_id,
            status: target,
            card_uid: None,
            accommodation_ids: Vec::new(),
            message: "User rejected".to_string(),
        });
    }

    let accommodation_ids = match assign_accommodations(store, user_id).await {
        Ok(assignment) => assignment.accommodation_ids,
        Err(e) => {
            tracing::error!(error = %e, "Accommodation assignment failed; approval kept");
            Vec::new()
        }
    };

    let (card_uid, message) = match assign_card(store, user_id).await {
        Ok(CardAssignment::Claimed(card)) | Ok(CardAssignment::AlreadyBound(card)) => {
            let message = format!("User approved; access card {} assigned", card.card_uid);
            (Some(card.card_uid), message)
        }
        Ok(CardAssignment::NoCardAvailable) => {
            (None, "User approved, but no card available".to_string())
        }
        Err(e) => {
            tracing::error!(error = %e, "Card assignment failed; approval kept");
            (None, "User approved, but card assignment failed".to_string())
        }
    };

    tracing::info!(card_uid = ?card_uid, "User approved");

    Ok(ApprovalOutcome {
        user_id,
        status: target,
        card_uid,
        accommodation_ids,
        message,
    })
}
