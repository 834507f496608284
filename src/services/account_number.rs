use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const ACCOUNT_NUMBER_PREFIX: &str = "ACC";

/// Human-readable account number: `ACC`, the last 9 digits of the Unix time
/// in milliseconds, then 3 random digits.
///
/// Not guaranteed unique on its own; the store rejects collisions and the
/// caller regenerates.
pub fn generate_account_number(now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().rem_euclid(1_000_000_000);
    let random = Uuid::new_v4().as_u128() % 1_000;
    format!("{ACCOUNT_NUMBER_PREFIX}{millis:09}{random:03}")
}
