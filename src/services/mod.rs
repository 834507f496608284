// Services module - Business logic

pub mod access_verification;
pub mod accommodation_assignment;
pub mod account_number;
pub mod approval;
pub mod authentication;
pub mod card_assignment;
pub mod disability_types;
pub mod documents;
pub mod password;
pub mod registration;
