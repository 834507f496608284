use uuid::Uuid;

use crate::models::AccessCard;
use crate::repository::{CardRepository, RepositoryError};

/// Result of binding a card to an approved user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardAssignment {
    /// The user already held this card; nothing changed.
    AlreadyBound(AccessCard),
    Claimed(AccessCard),
    /// Every active, unexpired card is taken.
    NoCardAvailable,
}

impl CardAssignment {
    pub fn card(&self) -> Option<&AccessCard> {
        match self {
            CardAssignment::AlreadyBound(card) | CardAssignment::Claimed(card) => Some(card),
            CardAssignment::NoCardAvailable => None,
        }
    }
}

/// Gives the user exactly one usable card from the free pool.
///
/// The claim itself is a single atomic store operation, so two concurrent
/// approvals never receive the same card and a user never ends up with two.
#[tracing::instrument(skip(store))]
pub async fn assign_card<S>(store: &S, user_id: Uuid) -> Result<CardAssignment, RepositoryError>
where
    S: CardRepository + ?Sized,
{
    if let Some(card) = store.find_card_for_user(user_id).await? {
        tracing::debug!(card_uid = %card.card_uid, "User already holds a card");
        return Ok(CardAssignment::AlreadyBound(card));
    }

    match store.claim_free_card(user_id).await {
        Ok(Some(card)) => {
            tracing::info!(card_uid = %card.card_uid, "Access card assigned");
            Ok(CardAssignment::Claimed(card))
        }
        Ok(None) => {
            tracing::warn!("No free access card available");
            Ok(CardAssignment::NoCardAvailable)
        }
        // Lost a race against another approval of the same user
        Err(RepositoryError::DuplicateCardHolder) => store
            .find_card_for_user(user_id)
            .await?
            .map(CardAssignment::AlreadyBound)
            .ok_or(RepositoryError::DuplicateCardHolder),
        Err(e) => Err(e),
    }
}
