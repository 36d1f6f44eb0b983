//! Human-facing order numbers.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generates an order number of the form `ORD-YYMMDD-XXXXXXXX`.
///
/// The suffix is the first eight hex digits of a v4 UUID, upper-cased.
/// Uniqueness is enforced by the store, not here.
pub fn generate(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "ORD-{}-{}",
        now.format("%y%m%d"),
        suffix[..8].to_ascii_uppercase()
    )
}
