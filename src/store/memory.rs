use std::collections::HashMap;
use std::sync::RwLock;

use super::{dedup_key, DeduplicationStore};
use crate::notification::Notification;

/// In-process store, forgotten when the process exits
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Notification>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DeduplicationStore for MemoryStore {
    fn has(&self, id: &str) -> bool {
        self.records
            .read()
            .map(|records| records.contains_key(&dedup_key(id)))
            .unwrap_or(false)
    }

    fn mark_seen(&self, id: &str, record: &Notification) {
        if let Ok(mut records) = self.records.write() {
            records.insert(dedup_key(id), record.clone());
        }
    }
}
