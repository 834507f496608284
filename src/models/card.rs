use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::user::{display_name, ApprovalStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AccessCard {
    pub id: i64,
    pub card_uid: String,
    pub user_id: Option<Uuid>, // null until claimed by an approved user
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_scanned_at: Option<DateTime<Utc>>,
}

impl AccessCard {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Changes an administrator can apply to a provisioned card.
///
/// `expires_at: Some(None)` clears the expiry.
#[derive(Debug, Clone, Default)]
pub struct CardUpdate {
    pub active: Option<bool>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// Holder fields joined onto a card for scan decisions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardHolder {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub approval_status: ApprovalStatus,
}

impl CardHolder {
    pub fn display_name(&self) -> String {
        display_name(&self.first_name, &self.last_name)
    }
}

/// A card together with its holder, read in one query at scan time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardScanRecord {
    pub card: AccessCard,
    pub holder: Option<CardHolder>,
}

/// Card uids are matched case-insensitively; this is the comparison form.
pub fn normalize_uid(raw: &str) -> String {
    raw.trim().to_uppercase()
}
