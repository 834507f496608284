//! Scan-time access decisions and the account-number lookup used by staff.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::{card::normalize_uid, Accommodation, ApprovalStatus, CardScanRecord, User};
use crate::repository::{AccommodationRepository, CardRepository, RepositoryError, UserRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Access {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    NoUid,
    UnknownUid,
    InactiveCard,
    Expired,
    NotValidated,
    DbError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanDecision {
    pub access: Access,
    /// Holder display name; empty when there is no holder to name
    pub name: String,
    pub reason: Option<DenialReason>,
}

impl ScanDecision {
    fn granted(name: String) -> Self {
        Self {
            access: Access::Granted,
            name,
            reason: None,
        }
    }

    pub fn denied(reason: DenialReason, name: String) -> Self {
        Self {
            access: Access::Denied,
            name,
            reason: Some(reason),
        }
    }

    pub fn is_granted(&self) -> bool {
        self.access == Access::Granted
    }
}

/// Applies the fixed precedence: unknown, inactive, expired, not approved.
pub fn evaluate(record: Option<&CardScanRecord>, now: DateTime<Utc>) -> ScanDecision {
    let Some(record) = record else {
        return ScanDecision::denied(DenialReason::UnknownUid, String::new());
    };

    let name = record
        .holder
        .as_ref()
        .map(|holder| holder.display_name())
        .unwrap_or_default();

    if !record.card.active {
        return ScanDecision::denied(DenialReason::InactiveCard, name);
    }
    if record.card.is_expired_at(now) {
        return ScanDecision::denied(DenialReason::Expired, name);
    }

    match &record.holder {
        Some(holder) if holder.approval_status == ApprovalStatus::Approved => {
            ScanDecision::granted(name)
        }
        // An unbound card has nobody to validate.
        _ => ScanDecision::denied(DenialReason::NotValidated, name),
    }
}

/// Decides a scan and, on GRANTED, stamps the card's last scan time in a
/// detached task.
///
/// A blank uid is answered with `no_uid` without touching the store.
#[tracing::instrument(skip(store))]
pub async fn verify_scan<S>(store: Arc<S>, raw_uid: &str) -> Result<ScanDecision, RepositoryError>
where
    S: CardRepository + ?Sized + 'static,
{
    let uid = normalize_uid(raw_uid);
    if uid.is_empty() {
        return Ok(ScanDecision::denied(DenialReason::NoUid, String::new()));
    }

    let record = store.find_card_for_scan(&uid).await?;
    let now = Utc::now();
    let decision = evaluate(record.as_ref(), now);

    match (&decision.reason, &record) {
        (None, Some(record)) => {
            tracing::info!(card_id = record.card.id, "Access granted");

            let card_id = record.card.id;
            tokio::spawn(async move {
                if let Err(e) = store.record_scan(card_id, now).await {
                    tracing::warn!(card_id, error = %e, "Failed to record scan time");
                }
            });
        }
        (Some(reason), _) => tracing::info!(reason = ?reason, "Access denied"),
        (None, None) => {}
    }

    Ok(decision)
}

/// Holder details exposed to staff checking an account number
#[derive(Debug, Clone)]
pub struct VerifiedHolder {
    pub user: User,
    pub accommodations: Vec<Accommodation>,
}

/// Looks up an approved holder by account number.
///
/// Unknown numbers are 404; pending and rejected holders get the same 403
/// as at login.
#[tracing::instrument(skip(store))]
pub async fn verify_account_number<S>(
    store: &S,
    account_number: &str,
) -> Result<VerifiedHolder, AppError>
where
    S: UserRepository + AccommodationRepository + ?Sized,
{
    let account_number = account_number.trim();
    if account_number.is_empty() {
        return Err(AppError::Validation("Account number is required".to_string()));
    }

    let user = store
        .find_user_by_account_number(account_number)
        .await?
        .ok_or_else(|| AppError::NotFound("Account number not found".to_string()))?;

    if let Some(err) = AppError::for_unapproved(user.approval_status) {
        return Err(err);
    }

    let accommodations = store.accommodations_for_user(user.id).await?;

    Ok(VerifiedHolder {
        user,
        accommodations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccessCard, CardHolder};
    use chrono::Duration;
    use uuid::Uuid;

    fn record(
        active: bool,
        expires_in: Option<i64>,
        status: Option<ApprovalStatus>,
    ) -> CardScanRecord {
        let now = Utc::now();
        let holder = status.map(|approval_status| CardHolder {
            user_id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            approval_status,
        });

        CardScanRecord {
            card: AccessCard {
                id: 1,
                card_uid: "04A1B2".to_string(),
                user_id: holder.as_ref().map(|h| h.user_id),
                active,
                expires_at: expires_in.map(|secs| now + Duration::seconds(secs)),
                last_scanned_at: None,
            },
            holder,
        }
    }

    #[test]
    fn test_unknown_card() {
        let decision = evaluate(None, Utc::now());
        assert_eq!(decision, ScanDecision::denied(DenialReason::UnknownUid, String::new()));
    }

    #[test]
    fn test_granted_for_approved_holder() {
        let card = record(true, Some(3600), Some(ApprovalStatus::Approved));
        let decision = evaluate(Some(&card), Utc::now());

        assert!(decision.is_granted());
        assert_eq!(decision.name, "Ada Lovelace");
        assert_eq!(decision.reason, None);
    }

    #[test]
    fn test_inactive_wins_over_expiry() {
        let card = record(false, Some(-60), Some(ApprovalStatus::Approved));
        let decision = evaluate(Some(&card), Utc::now());
        assert_eq!(decision.reason, Some(DenialReason::InactiveCard));
    }

    #[test]
    fn test_expired_wins_over_status() {
        let card = record(true, Some(-60), Some(ApprovalStatus::Pending));
        let decision = evaluate(Some(&card), Utc::now());
        assert_eq!(decision.reason, Some(DenialReason::Expired));
        assert_eq!(decision.name, "Ada Lovelace");
    }

    #[test]
    fn test_unapproved_or_missing_holder() {
        let card = record(true, None, Some(ApprovalStatus::Rejected));
        let rejected = evaluate(Some(&card), Utc::now());
        assert_eq!(rejected.reason, Some(DenialReason::NotValidated));

        let unbound = evaluate(Some(&record(true, None, None)), Utc::now());
        assert_eq!(unbound.reason, Some(DenialReason::NotValidated));
        assert_eq!(unbound.name, "");
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&Access::Granted).unwrap(), r#""GRANTED""#);
        assert_eq!(
            serde_json::to_string(&DenialReason::InactiveCard).unwrap(),
            r#""inactive_card""#
        );
        assert_eq!(serde_json::to_string(&DenialReason::NoUid).unwrap(), r#""no_uid""#);
    }
}
