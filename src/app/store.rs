use std::collections::HashSet;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::notification::{NotificationRecord, NotificationSnapshot};

/// Client-side view of one user's notifications.
///
/// Records are kept ordered by `created_at` descending. `unread_count` always
/// equals the number of records with `is_read == false`; every mutation below
/// maintains that before returning.
#[derive(Debug, Default)]
pub struct NotificationStore {
    records: Vec<NotificationRecord>,
    unread_count: usize,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.records.clear();
        self.unread_count = 0;
    }

    /// Replace the whole view with a bulk-loaded list. Later duplicates of an
    /// id are dropped and the counter is recomputed from the kept records.
    pub fn replace_all(&mut self, records: Vec<NotificationRecord>) {
        let mut seen = HashSet::with_capacity(records.len());
        let mut kept: Vec<NotificationRecord> = Vec::with_capacity(records.len());
        for record in records {
            if !seen.insert(record.id) {
                tracing::debug!(notification_id = %record.id, "dropping duplicate record from bulk load");
                continue;
            }
            kept.push(record);
        }
        // Stable sort keeps input order for equal timestamps.
        kept.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        self.unread_count = kept.iter().filter(|record| !record.is_read).count();
        self.records = kept;
    }

    /// Insert a single record. Returns `false` when the id is already present.
    pub fn insert_one(&mut self, record: NotificationRecord) -> bool {
        if self.contains(record.id) {
            return false;
        }

        let position = self
            .records
            .iter()
            .position(|existing| existing.created_at <= record.created_at)
            .unwrap_or(self.records.len());

        if !record.is_read {
            self.unread_count += 1;
        }
        self.records.insert(position, record);
        true
    }

    /// Returns `true` only when an unread record transitioned to read.
    pub fn mark_read(&mut self, id: Uuid, at: OffsetDateTime) -> bool {
        let Some(record) = self.records.iter_mut().find(|record| record.id == id) else {
            return false;
        };
        if record.is_read {
            return false;
        }

        record.is_read = true;
        record.read_at = Some(at);
        self.unread_count = self.unread_count.saturating_sub(1);
        true
    }

    /// Returns how many records transitioned to read.
    pub fn mark_all_read(&mut self, at: OffsetDateTime) -> usize {
        let mut changed = 0;
        for record in self.records.iter_mut().filter(|record| !record.is_read) {
            record.is_read = true;
            record.read_at = Some(at);
            changed += 1;
        }
        self.unread_count = 0;
        changed
    }

    pub fn remove(&mut self, id: Uuid) -> Option<NotificationRecord> {
        let index = self.records.iter().position(|record| record.id == id)?;
        let removed = self.records.remove(index);
        if !removed.is_read {
            self.unread_count = self.unread_count.saturating_sub(1);
        }
        Some(removed)
    }

    pub fn remove_all(&mut self) -> usize {
        let removed = self.records.len();
        self.reset();
        removed
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.records.iter().any(|record| record.id == id)
    }

    pub fn get(&self, id: Uuid) -> Option<&NotificationRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn records(&self) -> &[NotificationRecord] {
        &self.records
    }

    pub fn unread_count(&self) -> usize {
        self.unread_count
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        NotificationSnapshot {
            records: self.records.clone(),
            unread_count: self.unread_count,
        }
    }
}
