// Models module - storage-independent entity representations

pub mod accommodation;
pub mod card;
pub mod user;

pub use accommodation::{Accommodation, DisabilityDeclaration, HandicapServiceMapping};
pub use card::{AccessCard, CardHolder, CardScanRecord, CardUpdate};
pub use user::{ApprovalStatus, NewUser, User};
