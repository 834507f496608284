use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Catalog entry describing a service offered to card holders in a province
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Accommodation {
    pub id: i32,
    pub service_name: String,
    pub service_description: Option<String>,
    pub province: Option<String>,
}

/// Reference mapping from a disability category to one accommodation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct HandicapServiceMapping {
    pub disability_type_id: i32,
    pub accommodation_id: i32,
}

/// Disability category declared by an applicant at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DisabilityDeclaration {
    pub user_id: Uuid,
    pub disability_type_id: i32,
}
