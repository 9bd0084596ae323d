//! Trip bookkeeping shared by the public form routes and the owner routes:
//! form-link tokens, capacity counters and the public projection of a trip.

use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::store::Record;

pub const FORM_TOKEN_HASH_COLUMN: &str = "form_token_hash";
pub const REGISTERED_COUNT_COLUMN: &str = "registered_count";
pub const CAPACITY_COLUMN: &str = "capacity";
pub const ACTIVE_COLUMN: &str = "active";
pub const TRIP_ID_COLUMN: &str = "trip_id";

/// Fresh token for a public form link. Only its hash is stored.
pub fn generate_form_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub fn hash_form_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

pub fn is_active(trip: &Record) -> bool {
    trip.get(ACTIVE_COLUMN).and_then(Value::as_bool).unwrap_or(false)
}

pub fn registered_count(trip: &Record) -> i64 {
    trip.get(REGISTERED_COUNT_COLUMN).and_then(Value::as_i64).unwrap_or(0)
}

/// `None` means unlimited
pub fn capacity(trip: &Record) -> Option<i64> {
    trip.get(CAPACITY_COLUMN).and_then(Value::as_i64)
}

pub fn spots_left(trip: &Record) -> Option<i64> {
    capacity(trip).map(|cap| (cap - registered_count(trip)).max(0))
}

pub fn is_full(trip: &Record) -> bool {
    spots_left(trip) == Some(0)
}

/// Trip as shown to the public: no owner, no form token hash
pub fn public_view(trip: &Record, owner_column: &str) -> Record {
    let mut view = trip.clone();
    view.remove(FORM_TOKEN_HASH_COLUMN);
    view.remove(owner_column);
    view.insert("spots_left".to_string(), spots_left(trip).map(Value::from).unwrap_or(Value::Null));
    view
}
