//! Storage interface injected into every service.
//!
//! Each entity gets a typed repository trait; `Store` bundles them for the
//! HTTP layer. Multi-step sequences that must not race (deciding an
//! application, claiming a card) are exposed as single atomic operations so
//! callers never have to check-then-act.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Accommodation, AccessCard, ApprovalStatus, CardScanRecord, CardUpdate, NewUser, User,
};

pub mod memory;

pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Not found")]
    NotFound,

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Account number already issued")]
    DuplicateAccountNumber,

    #[error("Card uid already provisioned")]
    DuplicateCard,

    #[error("User already holds a card")]
    DuplicateCardHolder,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound,
            other => RepositoryError::Storage(other.to_string()),
        }
    }
}

/// Outcome of a conditional approval-status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionRecord {
    /// The user was pending, or already held the requested status.
    Recorded,
    /// The user already holds the opposite terminal status.
    AlreadyDecided(ApprovalStatus),
    UnknownUser,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_user_by_account_number(
        &self,
        account_number: &str,
    ) -> Result<Option<User>, RepositoryError>;

    /// Inserts the user (status `pending`) and its disability declarations
    /// together; either both land or neither does.
    async fn create_user(
        &self,
        user: NewUser,
        disability_types: &[i32],
    ) -> Result<User, RepositoryError>;

    /// Pending applicants, newest first
    async fn list_pending_users(&self) -> Result<Vec<User>, RepositoryError>;

    /// Moves a user to `status` only if it is pending or already `status`.
    async fn record_decision(
        &self,
        user_id: Uuid,
        status: ApprovalStatus,
    ) -> Result<DecisionRecord, RepositoryError>;
}

#[async_trait]
pub trait AccommodationRepository: Send + Sync {
    async fn declared_disability_types(&self, user_id: Uuid) -> Result<Vec<i32>, RepositoryError>;

    async fn accommodations_for_disability(
        &self,
        disability_type_id: i32,
    ) -> Result<Vec<i32>, RepositoryError>;

    /// Upserts `(user_id, accommodation_id)` pairs; returns how many were new.
    async fn link_accommodations(
        &self,
        user_id: Uuid,
        accommodation_ids: &[i32],
    ) -> Result<u64, RepositoryError>;

    /// Distinct accommodations linked to the user, ordered by service name
    async fn accommodations_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Accommodation>, RepositoryError>;
}

#[async_trait]
pub trait CardRepository: Send + Sync {
    async fn find_card_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<AccessCard>, RepositoryError>;

    /// Atomically binds the lowest-id unbound card that is active and not
    /// expired to `user_id`.
    ///
    /// Returns `None` when no usable card is left and `DuplicateCardHolder`
    /// when the user obtained a card concurrently.
    async fn claim_free_card(
        &self,
        user_id: Uuid,
    ) -> Result<Option<AccessCard>, RepositoryError>;

    /// Card and holder for a normalized uid, in a single read
    async fn find_card_for_scan(
        &self,
        uid: &str,
    ) -> Result<Option<CardScanRecord>, RepositoryError>;

    async fn record_scan(&self, card_id: i64, at: DateTime<Utc>) -> Result<(), RepositoryError>;

    async fn provision_card(
        &self,
        uid: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<AccessCard, RepositoryError>;

    async fn update_card(
        &self,
        uid: &str,
        update: CardUpdate,
    ) -> Result<Option<AccessCard>, RepositoryError>;
}

/// Every repository the service needs, behind one handle
#[async_trait]
pub trait Store: UserRepository + AccommodationRepository + CardRepository {
    async fn ping(&self) -> Result<(), RepositoryError>;
}
