//! In-memory store with the same semantics as the Postgres one

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AccommodationRepository, CardRepository, DecisionRecord, RepositoryError, Store,
    UserRepository,
};
use crate::models::{
    card::normalize_uid, Accommodation, AccessCard, ApprovalStatus, CardHolder, CardScanRecord,
    CardUpdate, DisabilityDeclaration, HandicapServiceMapping, NewUser, User,
};

#[derive(Debug, Default)]
struct MemoryState {
    users: Vec<User>,
    declarations: Vec<DisabilityDeclaration>,
    catalog: BTreeMap<i32, Accommodation>,
    service_map: Vec<HandicapServiceMapping>,
    user_accommodations: BTreeSet<(Uuid, i32)>,
    cards: Vec<AccessCard>,
    next_card_id: i64,
}

/// Every operation takes the single lock once, so multi-step operations are
/// atomic with respect to each other.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with reference data
    pub fn with_catalog(
        accommodations: Vec<Accommodation>,
        mappings: Vec<HandicapServiceMapping>,
    ) -> Self {
        let state = MemoryState {
            catalog: accommodations.into_iter().map(|a| (a.id, a)).collect(),
            service_map: mappings,
            ..MemoryState::default()
        };

        Self {
            state: RwLock::new(state),
        }
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_account_number(
        &self,
        account_number: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.account_number == account_number)
            .cloned())
    }

    async fn create_user(
        &self,
        user: NewUser,
        disability_types: &[i32],
    ) -> Result<User, RepositoryError> {
        let mut state = self.state.write().await;

        if state.users.iter().any(|u| u.email == user.email) {
            return Err(RepositoryError::DuplicateEmail);
        }
        if state
            .users
            .iter()
            .any(|u| u.account_number == user.account_number)
        {
            return Err(RepositoryError::DuplicateAccountNumber);
        }

        let user = user.into_user(Uuid::new_v4(), Utc::now());

        for &disability_type_id in disability_types {
            let declaration = DisabilityDeclaration {
                user_id: user.id,
                disability_type_id,
            };
            if !state.declarations.contains(&declaration) {
                state.declarations.push(declaration);
            }
        }
        state.users.push(user.clone());

        Ok(user)
    }

    async fn list_pending_users(&self) -> Result<Vec<User>, RepositoryError> {
        let state = self.state.read().await;

        let mut pending: Vec<User> = state
            .users
            .iter()
            .filter(|u| u.approval_status == ApprovalStatus::Pending)
            .cloned()
            .collect();
        // Stable sort keeps later insertions first among equal timestamps.
        pending.reverse();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(pending)
    }

    async fn record_decision(
        &self,
        user_id: Uuid,
        status: ApprovalStatus,
    ) -> Result<DecisionRecord, RepositoryError> {
        let mut state = self.state.write().await;

        let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) else {
            return Ok(DecisionRecord::UnknownUser);
        };

        if user.approval_status != ApprovalStatus::Pending && user.approval_status != status {
            return Ok(DecisionRecord::AlreadyDecided(user.approval_status));
        }

        user.approval_status = status;
        user.decided_at.get_or_insert_with(Utc::now);

        Ok(DecisionRecord::Recorded)
    }
}

#[async_trait]
impl AccommodationRepository for MemoryStore {
    async fn declared_disability_types(&self, user_id: Uuid) -> Result<Vec<i32>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .declarations
            .iter()
            .filter(|d| d.user_id == user_id)
            .map(|d| d.disability_type_id)
            .collect())
    }

    async fn accommodations_for_disability(
        &self,
        disability_type_id: i32,
    ) -> Result<Vec<i32>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .service_map
            .iter()
            .filter(|m| m.disability_type_id == disability_type_id)
            .map(|m| m.accommodation_id)
            .collect())
    }

    async fn link_accommodations(
        &self,
        user_id: Uuid,
        accommodation_ids: &[i32],
    ) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;

        if let Some(unknown) = accommodation_ids
            .iter()
            .find(|id| !state.catalog.contains_key(id))
        {
            return Err(RepositoryError::Storage(format!(
                "accommodation {} is not in the catalog",
                unknown
            )));
        }

        let inserted = accommodation_ids
            .iter()
            .filter(|&&id| state.user_accommodations.insert((user_id, id)))
            .count();

        Ok(inserted as u64)
    }

    async fn accommodations_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Accommodation>, RepositoryError> {
        let state = self.state.read().await;

        let mut accommodations: Vec<Accommodation> = state
            .user_accommodations
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .filter_map(|(_, id)| state.catalog.get(id).cloned())
            .collect();
        accommodations.sort_by(|a, b| a.service_name.cmp(&b.service_name));

        Ok(accommodations)
    }
}

#[async_trait]
impl CardRepository for MemoryStore {
    async fn find_card_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<AccessCard>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .cards
            .iter()
            .find(|c| c.user_id == Some(user_id))
            .cloned())
    }

    async fn claim_free_card(&self, user_id: Uuid) -> Result<Option<AccessCard>, RepositoryError> {
        let mut state = self.state.write().await;

        if state.cards.iter().any(|c| c.user_id == Some(user_id)) {
            return Err(RepositoryError::DuplicateCardHolder);
        }

        // Cards are kept in id order, so the first usable one has the lowest id.
        let now = Utc::now();
        let claimed = state
            .cards
            .iter_mut()
            .find(|c| c.user_id.is_none() && c.active && !c.is_expired_at(now))
            .map(|card| {
                card.user_id = Some(user_id);
                card.clone()
            });

        Ok(claimed)
    }

    async fn find_card_for_scan(
        &self,
        uid: &str,
    ) -> Result<Option<CardScanRecord>, RepositoryError> {
        let state = self.state.read().await;
        let uid = normalize_uid(uid);

        let Some(card) = state.cards.iter().find(|c| normalize_uid(&c.card_uid) == uid) else {
            return Ok(None);
        };

        let holder = card
            .user_id
            .and_then(|id| state.users.iter().find(|u| u.id == id))
            .map(|u| CardHolder {
                user_id: u.id,
                first_name: u.first_name.clone(),
                last_name: u.last_name.clone(),
                approval_status: u.approval_status,
            });

        Ok(Some(CardScanRecord {
            card: card.clone(),
            holder,
        }))
    }

    async fn record_scan(&self, card_id: i64, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;

        let card = state
            .cards
            .iter_mut()
            .find(|c| c.id == card_id)
            .ok_or(RepositoryError::NotFound)?;
        card.last_scanned_at = Some(at);

        Ok(())
    }

    async fn provision_card(
        &self,
        uid: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<AccessCard, RepositoryError> {
        let mut state = self.state.write().await;
        let normalized = normalize_uid(uid);

        if state
            .cards
            .iter()
            .any(|c| normalize_uid(&c.card_uid) == normalized)
        {
            return Err(RepositoryError::DuplicateCard);
        }

        state.next_card_id += 1;
        let card = AccessCard {
            id: state.next_card_id,
            card_uid: uid.trim().to_string(),
            user_id: None,
            active: true,
            expires_at,
            last_scanned_at: None,
        };
        state.cards.push(card.clone());

        Ok(card)
    }

    async fn update_card(
        &self,
        uid: &str,
        update: CardUpdate,
    ) -> Result<Option<AccessCard>, RepositoryError> {
        let mut state = self.state.write().await;
        let normalized = normalize_uid(uid);

        let Some(card) = state
            .cards
            .iter_mut()
            .find(|c| normalize_uid(&c.card_uid) == normalized)
        else {
            return Ok(None);
        };

        if let Some(active) = update.active {
            card.active = active;
        }
        if let Some(expires_at) = update.expires_at {
            card.expires_at = expires_at;
        }

        Ok(Some(card.clone()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
