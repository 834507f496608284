//! Shared fixtures: an in-memory store with a small catalog, a store that
//! fails chosen calls, a cheap password hasher, and a document store that
//! keeps nothing on disk.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::Secret;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use carte_handicap::api::AppState;
use carte_handicap::config::{Config, DEFAULT_MAX_UPLOAD_BYTES};
use carte_handicap::models::{
    Accommodation, AccessCard, ApprovalStatus, CardScanRecord, CardUpdate, HandicapServiceMapping,
    NewUser, User,
};
use carte_handicap::repository::{
    AccommodationRepository, CardRepository, DecisionRecord, MemoryStore, RepositoryError, Store,
    UserRepository,
};
use uuid::Uuid;
use carte_handicap::services::{
    documents::{DocumentError, DocumentStore, ProofDocument},
    password::{PasswordError, PasswordHasher},
    registration::{register_user, Registration, RegistrationRequest},
};

pub const PASSWORD: &str = "s3cure-passw0rd";

fn accommodation(id: i32, name: &str) -> Accommodation {
    Accommodation {
        id,
        service_name: name.to_string(),
        service_description: Some(format!("{} for card holders", name)),
        province: Some("QC".to_string()),
    }
}

fn mapping(disability_type_id: i32, accommodation_id: i32) -> HandicapServiceMapping {
    HandicapServiceMapping {
        disability_type_id,
        accommodation_id,
    }
}

/// Catalog: type 1 -> {10}, type 2 -> {11, 30}, type 3 -> {20, 21}
pub fn catalog_store() -> MemoryStore {
    MemoryStore::with_catalog(
        vec![
            accommodation(10, "Accessible parking"),
            accommodation(11, "Companion admission"),
            accommodation(20, "Sign language interpretation"),
            accommodation(21, "Assistive listening devices"),
            accommodation(30, "Large-print documents"),
        ],
        vec![
            mapping(1, 10),
            mapping(2, 11),
            mapping(2, 30),
            mapping(3, 20),
            mapping(3, 21),
        ],
    )
}

fn outage() -> RepositoryError {
    RepositoryError::Storage("connection reset".to_string())
}

/// Delegates to a `MemoryStore` but fails the calls it is told to.
pub struct FailingStore {
    pub inner: MemoryStore,
    /// `accommodations_for_disability` fails for this type only
    pub failing_disability_type: Option<i32>,
    pub fail_card_claims: bool,
}

impl FailingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failing_disability_type: None,
            fail_card_claims: false,
        }
    }
}

#[async_trait]
impl UserRepository for FailingStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        self.inner.find_user_by_id(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.inner.find_user_by_email(email).await
    }

    async fn find_user_by_account_number(
        &self,
        account_number: &str,
    ) -> Result<Option<User>, RepositoryError> {
        self.inner.find_user_by_account_number(account_number).await
    }

    async fn create_user(
        &self,
        user: NewUser,
        disability_types: &[i32],
    ) -> Result<User, RepositoryError> {
        self.inner.create_user(user, disability_types).await
    }

    async fn list_pending_users(&self) -> Result<Vec<User>, RepositoryError> {
        self.inner.list_pending_users().await
    }

    async fn record_decision(
        &self,
        user_id: Uuid,
        status: ApprovalStatus,
    ) -> Result<DecisionRecord, RepositoryError> {
        self.inner.record_decision(user_id, status).await
    }
}

#[async_trait]
impl AccommodationRepository for FailingStore {
    async fn declared_disability_types(&self, user_id: Uuid) -> Result<Vec<i32>, RepositoryError> {
        self.inner.declared_disability_types(user_id).await
    }

    async fn accommodations_for_disability(
        &self,
        disability_type_id: i32,
    ) -> Result<Vec<i32>, RepositoryError> {
        if self.failing_disability_type == Some(disability_type_id) {
            return Err(outage());
        }
        self.inner.accommodations_for_disability(disability_type_id).await
    }

    async fn link_accommodations(
        &self,
        user_id: Uuid,
        accommodation_ids: &[i32],
    ) -> Result<u64, RepositoryError> {
        self.inner.link_accommodations(user_id, accommodation_ids).await
    }

    async fn accommodations_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Accommodation>, RepositoryError> {
        self.inner.accommodations_for_user(user_id).await
    }
}

#[async_trait]
impl CardRepository for FailingStore {
    async fn find_card_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<AccessCard>, RepositoryError> {
        self.inner.find_card_for_user(user_id).await
    }

    async fn claim_free_card(
        &self,
        user_id: Uuid,
    ) -> Result<Option<AccessCard>, RepositoryError> {
        if self.fail_card_claims {
            return Err(outage());
        }
        self.inner.claim_free_card(user_id).await
    }

    async fn find_card_for_scan(
        &self,
        uid: &str,
    ) -> Result<Option<CardScanRecord>, RepositoryError> {
        self.inner.find_card_for_scan(uid).await
    }

    async fn record_scan(&self, card_id: i64, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.inner.record_scan(card_id, at).await
    }

    async fn provision_card(
        &self,
        uid: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<AccessCard, RepositoryError> {
        self.inner.provision_card(uid, expires_at).await
    }

    async fn update_card(
        &self,
        uid: &str,
        update: CardUpdate,
    ) -> Result<Option<AccessCard>, RepositoryError> {
        self.inner.update_card(uid, update).await
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.inner.ping().await
    }
}

/// Stores `plain:<password>`; Argon2 is covered by its own unit tests.
#[derive(Debug, Default)]
pub struct PlainHasher;

#[async_trait]
impl PasswordHasher for PlainHasher {
    async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        Ok(format!("plain:{}", password))
    }

    async fn verify(&self, password: &str, hash: &str) -> bool {
        hash.strip_prefix("plain:") == Some(password)
    }
}

/// Records references instead of writing files
#[derive(Debug, Default)]
pub struct MemoryDocuments {
    pub saved: Mutex<Vec<String>>,
    pub discarded: Mutex<Vec<String>>,
}

#[async_trait]
impl DocumentStore for MemoryDocuments {
    fn max_bytes(&self) -> usize {
        DEFAULT_MAX_UPLOAD_BYTES
    }

    async fn save(&self, document: &ProofDocument) -> Result<String, DocumentError> {
        document.validate(self.max_bytes())?;
        let mut saved = self.saved.lock().unwrap();
        let reference = format!("{}-{}", saved.len() + 1, document.file_name);
        saved.push(reference.clone());
        Ok(reference)
    }

    async fn discard(&self, reference: &str) {
        self.discarded.lock().unwrap().push(reference.to_string());
    }
}

pub fn proof_pdf() -> ProofDocument {
    ProofDocument {
        file_name: "proof.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        bytes: b"%PDF-1.4 medical certificate".to_vec(),
    }
}

pub fn registration_request(email: &str, disability_types: &[&str]) -> RegistrationRequest {
    RegistrationRequest {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: email.to_string(),
        address: Some("12 rue Sainte-Catherine, Montreal".to_string()),
        password: PASSWORD.to_string(),
        disability_types: disability_types.iter().map(|s| s.to_string()).collect(),
        document: Some(proof_pdf()),
    }
}

pub async fn register(store: &MemoryStore, email: &str, disability_types: &[&str]) -> Registration {
    register_user(
        store,
        &MemoryDocuments::default(),
        &PlainHasher,
        registration_request(email, disability_types),
    )
    .await
    .expect("registration succeeds")
}

pub fn test_config(admin_token: Option<&str>) -> Config {
    Config {
        database_url: Secret::new("postgres://unused".to_string()),
        database_max_connections: 1,
        host: "127.0.0.1".to_string(),
        port: 0,
        upload_dir: PathBuf::from("unused"),
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        admin_token: admin_token.map(|t| Secret::new(t.to_string())),
    }
}

pub fn app_state(store: Arc<MemoryStore>, admin_token: Option<&str>) -> AppState {
    AppState {
        store,
        documents: Arc::new(MemoryDocuments::default()),
        hasher: Arc::new(PlainHasher),
        config: Arc::new(test_config(admin_token)),
    }
}
