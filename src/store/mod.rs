//! Deduplication stores
//!
//! A store remembers which notification ids have already been delivered.
//! Stores are best-effort: an unavailable backend never fails the pipeline,
//! it only stops remembering.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::notification::Notification;

/// Key prefix scoping persisted dedup records
pub const DEDUP_NAMESPACE: &str = "trumpet";

/// Persisted key for a notification id: `trumpet:<id>`
pub fn dedup_key(id: &str) -> String {
    format!("{DEDUP_NAMESPACE}:{id}")
}

pub trait DeduplicationStore: Send + Sync {
    /// Whether `id` has been marked seen
    fn has(&self, id: &str) -> bool;

    /// Record `id` as seen; failures are swallowed by the implementation
    fn mark_seen(&self, id: &str, record: &Notification);
}

impl<S: DeduplicationStore + ?Sized> DeduplicationStore for std::sync::Arc<S> {
    fn has(&self, id: &str) -> bool {
        (**self).has(id)
    }

    fn mark_seen(&self, id: &str, record: &Notification) {
        (**self).mark_seen(id, record)
    }
}
