//! PostgreSQL implementation of the repository traits

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::{
    card::normalize_uid, Accommodation, AccessCard, ApprovalStatus, CardHolder, CardScanRecord,
    CardUpdate, NewUser, User,
};
use crate::repository::{
    AccommodationRepository, CardRepository, DecisionRecord, RepositoryError, Store,
    UserRepository,
};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, address, \
     account_number, approval_status, proof_document_ref, created_at, decided_at";

const CARD_COLUMNS: &str = "id, card_uid, user_id, active, expires_at, last_scanned_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_user(&self, column: &str, value: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {column} = $1"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    address: Option<String>,
    account_number: String,
    approval_status: String,
    proof_document_ref: String,
    created_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let approval_status = row
            .approval_status
            .parse::<ApprovalStatus>()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            address: row.address,
            account_number: row.account_number,
            approval_status,
            proof_document_ref: row.proof_document_ref,
            created_at: row.created_at,
            decided_at: row.decided_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ScanRow {
    id: i64,
    card_uid: String,
    user_id: Option<Uuid>,
    active: bool,
    expires_at: Option<DateTime<Utc>>,
    last_scanned_at: Option<DateTime<Utc>>,
    first_name: Option<String>,
    last_name: Option<String>,
    approval_status: Option<String>,
}

impl TryFrom<ScanRow> for CardScanRecord {
    type Error = RepositoryError;

    fn try_from(row: ScanRow) -> Result<Self, Self::Error> {
        let holder = match (row.user_id, row.approval_status) {
            (Some(user_id), Some(status)) => Some(CardHolder {
                user_id,
                first_name: row.first_name.unwrap_or_default(),
                last_name: row.last_name.unwrap_or_default(),
                approval_status: status
                    .parse::<ApprovalStatus>()
                    .map_err(|e| RepositoryError::Storage(e.to_string()))?,
            }),
            _ => None,
        };

        Ok(CardScanRecord {
            card: AccessCard {
                id: row.id,
                card_uid: row.card_uid,
                user_id: row.user_id,
                active: row.active,
                expires_at: row.expires_at,
                last_scanned_at: row.last_scanned_at,
            },
            holder,
        })
    }
}

/// Maps unique-constraint violations to their domain meaning
fn map_unique_violation(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some("users_email_key") => RepositoryError::DuplicateEmail,
                Some("users_account_number_key") => RepositoryError::DuplicateAccountNumber,
                Some("access_cards_uid_key") => RepositoryError::DuplicateCard,
                Some("access_cards_holder_key") => RepositoryError::DuplicateCardHolder,
                _ => RepositoryError::Storage(err.to_string()),
            };
        }
    }
    RepositoryError::from(err)
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.fetch_user("email", email).await
    }

    async fn find_user_by_account_number(
        &self,
        account_number: &str,
    ) -> Result<Option<User>, RepositoryError> {
        self.fetch_user("account_number", account_number).await
    }

    async fn create_user(
        &self,
        user: NewUser,
        disability_types: &[i32],
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (
                id, email, password_hash, first_name, last_name, address,
                account_number, approval_status, proof_document_ref
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.address)
        .bind(&user.account_number)
        .bind(&user.proof_document_ref)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        if !disability_types.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO user_disabilities (user_id, disability_type_id)
                SELECT $1, UNNEST($2::int4[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(row.id)
            .bind(disability_types)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        User::try_from(row)
    }

    async fn list_pending_users(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE approval_status = 'pending'
            ORDER BY created_at DESC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn record_decision(
        &self,
        user_id: Uuid,
        status: ApprovalStatus,
    ) -> Result<DecisionRecord, RepositoryError> {
        let updated = sqlx::query(
            r#"
            UPDATE users
            SET approval_status = $2, decided_at = COALESCE(decided_at, NOW())
            WHERE id = $1 AND approval_status IN ('pending', $2)
            "#,
        )
        .bind(user_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() > 0 {
            return Ok(DecisionRecord::Recorded);
        }

        let current = sqlx::query_scalar::<_, String>(
            "SELECT approval_status FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match current {
            None => Ok(DecisionRecord::UnknownUser),
            Some(current) => {
                let current = current
                    .parse::<ApprovalStatus>()
                    .map_err(|e| RepositoryError::Storage(e.to_string()))?;
                Ok(DecisionRecord::AlreadyDecided(current))
            }
        }
    }
}

#[async_trait]
impl AccommodationRepository for PgStore {
    async fn declared_disability_types(&self, user_id: Uuid) -> Result<Vec<i32>, RepositoryError> {
        let types = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT disability_type_id FROM user_disabilities
            WHERE user_id = $1
            ORDER BY disability_type_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(types)
    }

    async fn accommodations_for_disability(
        &self,
        disability_type_id: i32,
    ) -> Result<Vec<i32>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT accommodation_id FROM handicap_services
            WHERE disability_type_id = $1
            ORDER BY accommodation_id
            "#,
        )
        .bind(disability_type_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn link_accommodations(
        &self,
        user_id: Uuid,
        accommodation_ids: &[i32],
    ) -> Result<u64, RepositoryError> {
        if accommodation_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO user_accommodations (user_id, accommodation_id)
            SELECT $1, UNNEST($2::int4[])
            ON CONFLICT (user_id, accommodation_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(accommodation_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn accommodations_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Accommodation>, RepositoryError> {
        let accommodations = sqlx::query_as::<_, Accommodation>(
            r#"
            SELECT DISTINCT a.id, a.service_name, a.service_description, a.province
            FROM user_accommodations ua
            JOIN accommodations a ON a.id = ua.accommodation_id
            WHERE ua.user_id = $1
            ORDER BY a.service_name, a.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(accommodations)
    }
}

#[async_trait]
impl CardRepository for PgStore {
    async fn find_card_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<AccessCard>, RepositoryError> {
        let card = sqlx::query_as::<_, AccessCard>(&format!(
            "SELECT {CARD_COLUMNS} FROM access_cards WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    async fn claim_free_card(&self, user_id: Uuid) -> Result<Option<AccessCard>, RepositoryError> {
        // The sub-select skips rows another claim holds; the outer predicate
        // re-checks that the row is still free once locked.
        let card = sqlx::query_as::<_, AccessCard>(&format!(
            r#"
            UPDATE access_cards
            SET user_id = $1
            WHERE id = (
                SELECT id FROM access_cards
                WHERE user_id IS NULL
                  AND active
                  AND (expires_at IS NULL OR expires_at > NOW())
                ORDER BY id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            AND user_id IS NULL
            RETURNING {CARD_COLUMNS}
            "#
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(card)
    }

    async fn find_card_for_scan(
        &self,
        uid: &str,
    ) -> Result<Option<CardScanRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, ScanRow>(
            r#"
            SELECT
                c.id, c.card_uid, c.user_id, c.active, c.expires_at, c.last_scanned_at,
                u.first_name, u.last_name, u.approval_status
            FROM access_cards c
            LEFT JOIN users u ON u.id = c.user_id
            WHERE UPPER(c.card_uid) = $1
            LIMIT 1
            "#,
        )
        .bind(normalize_uid(uid))
        .fetch_optional(&self.pool)
        .await?;

        row.map(CardScanRecord::try_from).transpose()
    }

    async fn record_scan(&self, card_id: i64, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE access_cards SET last_scanned_at = $2 WHERE id = $1")
            .bind(card_id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn provision_card(
        &self,
        uid: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<AccessCard, RepositoryError> {
        let card = sqlx::query_as::<_, AccessCard>(&format!(
            r#"
            INSERT INTO access_cards (card_uid, active, expires_at)
            VALUES ($1, TRUE, $2)
            RETURNING {CARD_COLUMNS}
            "#
        ))
        .bind(uid.trim())
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(card)
    }

    async fn update_card(
        &self,
        uid: &str,
        update: CardUpdate,
    ) -> Result<Option<AccessCard>, RepositoryError> {
        let card = sqlx::query_as::<_, AccessCard>(&format!(
            r#"
            UPDATE access_cards
            SET active = COALESCE($2, active),
                expires_at = CASE WHEN $3 THEN $4 ELSE expires_at END
            WHERE UPPER(card_uid) = $1
            RETURNING {CARD_COLUMNS}
            "#
        ))
        .bind(normalize_uid(uid))
        .bind(update.active)
        .bind(update.expires_at.is_some())
        .bind(update.expires_at.flatten())
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
