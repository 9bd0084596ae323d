//! Ownership guard for owner-scoped records.
//!
//! Every handler that reads or mutates a single record goes through
//! [`require_owner`] instead of comparing owner columns itself.

use thiserror::Error;

use crate::store::{value_text, Record, RecordStore, StoreError, StoreScope};

pub mod resource;

pub use resource::Resource;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("record not found")]
    NotFound,

    #[error("record owned by another subject")]
    Forbidden,

    #[error(transparent)]
    Upstream(#[from] StoreError),
}

/// Fetch `id` from the resource's table and return it only if its owner column
/// equals `subject`.
///
/// The lookup runs under the service scope. Under the caller's scope,
/// row-level security would hide foreign rows and turn 403 into 404; the
/// mutation that follows still runs under the caller's scope.
pub async fn require_owner(
    store: &dyn RecordStore,
    resource: Resource,
    id: &str,
    subject: &str,
) -> Result<Record, GuardError> {
    let record = store
        .fetch(&StoreScope::Service, resource.table, id)
        .await?
        .ok_or(GuardError::NotFound)?;

    let owner = record
        .get(resource.owner_column)
        .filter(|v| !v.is_null())
        .map(value_text);

    if owner.as_deref() == Some(subject) {
        Ok(record)
    } else {
        tracing::warn!(
            "Ownership check failed on {} {} for subject {}",
            resource.table,
            id,
            subject
        );
        Err(GuardError::Forbidden)
    }
}
