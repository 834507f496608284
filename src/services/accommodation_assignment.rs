use std::collections::BTreeSet;
use uuid::Uuid;

use crate::repository::{AccommodationRepository, RepositoryError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccommodationAssignment {
    /// Union of the accommodations mapped from every declared type, ascending
    pub accommodation_ids: Vec<i32>,
    pub newly_linked: u64,
    /// Declared types whose mapping lookup failed and were skipped
    pub failed_disability_types: Vec<i32>,
}

/// Links the user to every accommodation mapped from their declared
/// disability types.
///
/// Re-running is harmless: links are upserts. A failed lookup for one type
/// does not prevent the others from being linked.
#[tracing::instrument(skip(store))]
pub async fn assign_accommodations<S>(
    store: &S,
    user_id: Uuid,
) -> Result<AccommodationAssignment, RepositoryError>
where
    S: AccommodationRepository + ?Sized,
{
    let declared = store.declared_disability_types(user_id).await?;

    let mut accommodations = BTreeSet::new();
    let mut failed_disability_types = Vec::new();

    for disability_type_id in declared {
        match store.accommodations_for_disability(disability_type_id).await {
            Ok(ids) => accommodations.extend(ids),
            Err(e) => {
                tracing::warn!(
                    disability_type_id,
                    error = %e,
                    "Skipping disability type after lookup failure"
                );
                failed_disability_types.push(disability_type_id);
            }
        }
    }

    let accommodation_ids: Vec<i32> = accommodations.into_iter().collect();
    if accommodation_ids.is_empty() {
        tracing::info!("No accommodations mapped for user");
        return Ok(AccommodationAssignment {
            failed_disability_types,
            ..AccommodationAssignment::default()
        });
    }

    let newly_linked = store.link_accommodations(user_id, &accommodation_ids).await?;

    tracing::info!(
        accommodations = ?accommodation_ids,
        newly_linked,
        "Accommodations assigned"
    );

    Ok(AccommodationAssignment {
        accommodation_ids,
        newly_linked,
        failed_disability_types,
    })
}
