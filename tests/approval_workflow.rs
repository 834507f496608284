//! Registration, approval, card assignment and scan decisions driven through
//! the service layer against the in-memory store.

mod common;

use chrono::{Duration, Utc};
use rstest::{fixture, rstest};
use std::collections::HashSet;
use std::sync::Arc;

use carte_handicap::error::AppError;
use carte_handicap::models::{ApprovalStatus, CardUpdate};
use carte_handicap::repository::{
    AccommodationRepository, CardRepository, MemoryStore, UserRepository,
};
use carte_handicap::services::{
    access_verification::{verify_scan, DenialReason},
    accommodation_assignment::assign_accommodations,
    approval::decide,
    authentication::authenticate,
    registration::register_user,
};

use common::{
    catalog_store, register, registration_request, FailingStore, MemoryDocuments, PlainHasher,
    PASSWORD,
};

#[fixture]
fn store() -> MemoryStore {
    catalog_store()
}

async fn provision(store: &MemoryStore, uids: &[&str]) {
    for uid in uids {
        store.provision_card(uid, None).await.unwrap();
    }
}

#[rstest]
#[tokio::test]
async fn account_numbers_are_unique(store: MemoryStore) {
    let mut seen = HashSet::new();

    for i in 0..20 {
        let registration = register(&store, &format!("user{}@example.org", i), &["1"]).await;
        assert!(registration.account_number.starts_with("ACC"));
        assert!(seen.insert(registration.account_number));
    }
}

#[rstest]
#[tokio::test]
async fn duplicate_email_is_a_conflict(store: MemoryStore) {
    register(&store, "ada@example.org", &["1"]).await;

    let mut second = registration_request("  ADA@example.org ", &["[2, 3]"]);
    second.first_name = "Someone".to_string();

    let result = register_user(&store, &MemoryDocuments::default(), &PlainHasher, second).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[rstest]
#[tokio::test]
async fn registration_survives_unparseable_disability_types(store: MemoryStore) {
    let registration = register(&store, "ada@example.org", &["vision", "n/a"]).await;

    assert!(registration.disability_types.is_empty());
    assert_eq!(registration.warnings.len(), 2);
    assert!(store
        .declared_disability_types(registration.user_id)
        .await
        .unwrap()
        .is_empty());
}

#[rstest]
#[tokio::test]
async fn registration_requires_a_document(store: MemoryStore) {
    let mut request = registration_request("ada@example.org", &["1"]);
    request.document = None;

    let result = register_user(&store, &MemoryDocuments::default(), &PlainHasher, request).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(store.find_user_by_email("ada@example.org").await.unwrap().is_none());
}

#[rstest]
#[tokio::test]
async fn login_is_gated_on_approval(store: MemoryStore) {
    register(&store, "pending@example.org", &["1"]).await;
    let rejected = register(&store, "rejected@example.org", &["1"]).await;
    let approved = register(&store, "approved@example.org", &["1"]).await;

    decide(&store, rejected.user_id, false).await.unwrap();
    decide(&store, approved.user_id, true).await.unwrap();

    let result = authenticate(&store, &PlainHasher, "pending@example.org", PASSWORD).await;
    assert!(matches!(result, Err(AppError::PendingApproval)));

    let result = authenticate(&store, &PlainHasher, "rejected@example.org", PASSWORD).await;
    assert!(matches!(result, Err(AppError::Rejected)));

    let user = authenticate(&store, &PlainHasher, "approved@example.org", PASSWORD)
        .await
        .unwrap();
    assert_eq!(user.user_id, approved.user_id);
    assert_eq!(user.account_number, approved.account_number);
    assert_eq!(user.status, ApprovalStatus::Approved);

    // Credential failures look the same whether or not the email exists
    let wrong_password =
        authenticate(&store, &PlainHasher, "pending@example.org", "nope-nope").await;
    let unknown_email = authenticate(&store, &PlainHasher, "ghost@example.org", PASSWORD).await;
    assert!(matches!(wrong_password, Err(AppError::InvalidCredentials)));
    assert!(matches!(unknown_email, Err(AppError::InvalidCredentials)));
}

#[rstest]
#[tokio::test]
async fn approving_twice_keeps_a_single_card(store: MemoryStore) {
    provision(&store, &["CARD-1", "CARD-2"]).await;
    let applicant = register(&store, "ada@example.org", &["1"]).await;

    let first = decide(&store, applicant.user_id, true).await.unwrap();
    let second = decide(&store, applicant.user_id, true).await.unwrap();

    assert_eq!(first.card_uid.as_deref(), Some("CARD-1"));
    assert_eq!(second.card_uid, first.card_uid);
    assert_eq!(first.message, "User approved; access card CARD-1 assigned");

    // CARD-2 is still free
    let other = register(&store, "grace@example.org", &["2"]).await;
    let outcome = decide(&store, other.user_id, true).await.unwrap();
    assert_eq!(outcome.card_uid.as_deref(), Some("CARD-2"));
}

#[rstest]
#[tokio::test]
async fn approval_without_free_cards_still_approves(store: MemoryStore) {
    let applicant = register(&store, "ada@example.org", &["1"]).await;

    let outcome = decide(&store, applicant.user_id, true).await.unwrap();

    assert_eq!(outcome.status, ApprovalStatus::Approved);
    assert_eq!(outcome.card_uid, None);
    assert_eq!(outcome.message, "User approved, but no card available");

    let user = store.find_user_by_id(applicant.user_id).await.unwrap().unwrap();
    assert_eq!(user.approval_status, ApprovalStatus::Approved);
    assert!(user.decided_at.is_some());
}

#[rstest]
#[tokio::test]
async fn decisions_are_terminal(store: MemoryStore) {
    let applicant = register(&store, "ada@example.org", &["1"]).await;

    let rejected = decide(&store, applicant.user_id, false).await.unwrap();
    assert_eq!(rejected.message, "User rejected");

    // Same decision again is accepted, the opposite one is not
    assert!(decide(&store, applicant.user_id, false).await.is_ok());
    let reversal = decide(&store, applicant.user_id, true).await;
    assert!(matches!(reversal, Err(AppError::Conflict(_))));

    let unknown = decide(&store, uuid::Uuid::new_v4(), true).await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_never_share_a_card(store: MemoryStore) {
    let store = Arc::new(store);
    provision(&store, &["ONLY-CARD"]).await;

    let a = register(&store, "a@example.org", &["1"]).await.user_id;
    let b = register(&store, "b@example.org", &["1"]).await.user_id;

    let (first, second) = tokio::join!(
        tokio::spawn({
            let store = store.clone();
            async move { decide(store.as_ref(), a, true).await }
        }),
        tokio::spawn({
            let store = store.clone();
            async move { decide(store.as_ref(), b, true).await }
        }),
    );
    let first = first.unwrap().unwrap();
    let second = second.unwrap().unwrap();

    let bound: Vec<_> = [&first, &second]
        .iter()
        .filter_map(|outcome| outcome.card_uid.clone())
        .collect();
    assert_eq!(bound, vec!["ONLY-CARD".to_string()]);

    let holders = [
        store.find_card_for_user(a).await.unwrap(),
        store.find_card_for_user(b).await.unwrap(),
    ];
    assert_eq!(holders.iter().filter(|card| card.is_some()).count(), 1);
    assert_eq!(first.status, ApprovalStatus::Approved);
    assert_eq!(second.status, ApprovalStatus::Approved);
}

#[rstest]
#[tokio::test]
async fn scan_precedence_follows_card_state(store: MemoryStore) {
    let store = Arc::new(store);
    provision(&store, &["04a1b2c3"]).await;
    let applicant = register(&store, "ada@example.org", &["1"]).await;
    decide(store.as_ref(), applicant.user_id, true).await.unwrap();

    let granted = verify_scan(store.clone(), " 04A1B2C3 ").await.unwrap();
    assert!(granted.is_granted());
    assert_eq!(granted.name, "Ada Lovelace");

    store
        .update_card("04A1B2C3", CardUpdate { active: Some(false), ..CardUpdate::default() })
        .await
        .unwrap();
    let inactive = verify_scan(store.clone(), "04a1b2c3").await.unwrap();
    assert_eq!(inactive.reason, Some(DenialReason::InactiveCard));

    store
        .update_card(
            "04a1b2c3",
            CardUpdate {
                active: Some(true),
                expires_at: Some(Some(Utc::now() - Duration::days(1))),
            },
        )
        .await
        .unwrap();
    let expired = verify_scan(store.clone(), "04a1b2c3").await.unwrap();
    assert_eq!(expired.reason, Some(DenialReason::Expired));

    let unknown = verify_scan(store.clone(), "FFFF").await.unwrap();
    assert_eq!(unknown.reason, Some(DenialReason::UnknownUid));

    let blank = verify_scan(store.clone(), "   ").await.unwrap();
    assert_eq!(blank.reason, Some(DenialReason::NoUid));
}

#[rstest]
#[tokio::test]
async fn scan_of_unapproved_holder_is_denied(store: MemoryStore) {
    let store = Arc::new(store);
    provision(&store, &["CARD-1"]).await;
    let applicant = register(&store, "ada@example.org", &["1"]).await;

    // Bound directly without an approval
    store.claim_free_card(applicant.user_id).await.unwrap();

    let decision = verify_scan(store.clone(), "card-1").await.unwrap();
    assert_eq!(decision.reason, Some(DenialReason::NotValidated));
    assert_eq!(decision.name, "Ada Lovelace");
}

#[rstest]
#[tokio::test]
async fn granted_scan_records_its_time(store: MemoryStore) {
    let store = Arc::new(store);
    provision(&store, &["CARD-1"]).await;
    let applicant = register(&store, "ada@example.org", &["1"]).await;
    decide(store.as_ref(), applicant.user_id, true).await.unwrap();

    assert!(verify_scan(store.clone(), "CARD-1").await.unwrap().is_granted());

    let mut recorded = None;
    for _ in 0..50 {
        recorded = store
            .find_card_for_user(applicant.user_id)
            .await
            .unwrap()
            .and_then(|card| card.last_scanned_at);
        if recorded.is_some() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(recorded.is_some());
}

#[rstest]
#[tokio::test]
async fn approval_links_union_of_mapped_accommodations(store: MemoryStore) {
    let applicant = register(&store, "ada@example.org", &["[1, 3]"]).await;

    let outcome = decide(&store, applicant.user_id, true).await.unwrap();
    assert_eq!(outcome.accommodation_ids, vec![10, 20, 21]);

    // A repeated approval does not duplicate links
    decide(&store, applicant.user_id, true).await.unwrap();

    let linked: Vec<i32> = store
        .accommodations_for_user(applicant.user_id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    let mut sorted = linked.clone();
    sorted.sort();
    assert_eq!(sorted, vec![10, 20, 21]);
}

#[rstest]
#[tokio::test]
async fn approval_skips_deactivated_and_expired_cards(store: MemoryStore) {
    let store = Arc::new(store);
    provision(&store, &["DEAD-CARD"]).await;
    store
        .provision_card("OLD-CARD", Some(Utc::now() - Duration::days(1)))
        .await
        .unwrap();
    provision(&store, &["GOOD-CARD"]).await;
    store
        .update_card("DEAD-CARD", CardUpdate { active: Some(false), ..CardUpdate::default() })
        .await
        .unwrap();

    let applicant = register(&store, "ada@example.org", &["1"]).await;
    let outcome = decide(store.as_ref(), applicant.user_id, true).await.unwrap();

    assert_eq!(outcome.card_uid.as_deref(), Some("GOOD-CARD"));
    assert_eq!(outcome.message, "User approved; access card GOOD-CARD assigned");
    assert!(verify_scan(store.clone(), "GOOD-CARD").await.unwrap().is_granted());

    // The unusable cards stay in the pool, unbound
    let other = register(&store, "grace@example.org", &["1"]).await;
    let outcome = decide(store.as_ref(), other.user_id, true).await.unwrap();
    assert_eq!(outcome.card_uid, None);
    assert_eq!(outcome.message, "User approved, but no card available");
}

#[tokio::test]
async fn failed_lookup_skips_only_that_disability_type() {
    let mut store = FailingStore::new(catalog_store());
    store.failing_disability_type = Some(2);
    let applicant = register(&store.inner, "ada@example.org", &["[1, 2, 3]"]).await;

    let assignment = assign_accommodations(&store, applicant.user_id).await.unwrap();
    assert_eq!(assignment.failed_disability_types, vec![2]);
    assert_eq!(assignment.accommodation_ids, vec![10, 20, 21]);

    let outcome = decide(&store, applicant.user_id, true).await.unwrap();
    assert_eq!(outcome.status, ApprovalStatus::Approved);
    assert_eq!(outcome.accommodation_ids, vec![10, 20, 21]);

    let linked: Vec<i32> = store
        .accommodations_for_user(applicant.user_id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert!(!linked.contains(&11));
    assert!(!linked.contains(&30));
    assert_eq!(linked.len(), 3);
}

#[tokio::test]
async fn card_claim_failure_keeps_the_approval() {
    let mut store = FailingStore::new(catalog_store());
    store.fail_card_claims = true;
    provision(&store.inner, &["CARD-1"]).await;
    let applicant = register(&store.inner, "ada@example.org", &["1"]).await;

    let outcome = decide(&store, applicant.user_id, true).await.unwrap();

    assert_eq!(outcome.status, ApprovalStatus::Approved);
    assert_eq!(outcome.card_uid, None);
    assert_eq!(outcome.message, "User approved, but card assignment failed");
    assert_eq!(outcome.accommodation_ids, vec![10]);

    let user = store.find_user_by_id(applicant.user_id).await.unwrap().unwrap();
    assert_eq!(user.approval_status, ApprovalStatus::Approved);
    assert!(store.find_card_for_user(applicant.user_id).await.unwrap().is_none());

    // Approved users can log in even without a card
    let login = authenticate(&store, &PlainHasher, "ada@example.org", PASSWORD).await;
    assert!(login.is_ok());
}
