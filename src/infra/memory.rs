use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, Notify};
use tracing::warn;
use uuid::Uuid;

use crate::domain::notification::NotificationRecord;
use crate::infra::gateway::{GatewayError, PushSubscription, RemoteGateway};

const PUSH_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchList,
    FetchUnreadCount,
    MarkRead,
    MarkAllRead,
    Delete,
    DeleteAll,
    Subscribe,
}

/// Process-local notification store with a live insert feed.
///
/// Used by the `memory` gateway mode and by tests, which can make individual
/// operations fail, hold a user's list fetches, or skew what a fetch reports.
#[derive(Clone)]
pub struct InMemoryGateway {
    inner: Arc<Inner>,
}

struct Inner {
    rows: Mutex<Vec<NotificationRecord>>,
    inserts: broadcast::Sender<NotificationRecord>,
    state: Mutex<Controls>,
}

#[derive(Default)]
struct Controls {
    failing: HashSet<Operation>,
    list_gates: HashMap<Uuid, Arc<Notify>>,
    unread_overrides: HashMap<Uuid, usize>,
    misfiled: HashMap<Uuid, Vec<NotificationRecord>>,
    calls: HashMap<Operation, usize>,
}

/// Holds a user's list fetches, already answered, until released.
pub struct FetchGate {
    notify: Arc<Notify>,
}

impl FetchGate {
    /// Let one waiting (or the next) fetch through.
    pub fn release(&self) {
        self.notify.notify_one();
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        let (inserts, _) = broadcast::channel(PUSH_BUFFER);
        Self {
            inner: Arc::new(Inner {
                rows: Mutex::new(Vec::new()),
                inserts,
                state: Mutex::new(Controls::default()),
            }),
        }
    }

    fn rows(&self) -> MutexGuard<'_, Vec<NotificationRecord>> {
        self.inner.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn controls(&self) -> MutexGuard<'_, Controls> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store rows without announcing them.
    pub fn seed(&self, records: impl IntoIterator<Item = NotificationRecord>) {
        let mut rows = self.rows();
        rows.extend(records);
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    /// Store a row and announce it to subscribers, like a backend insert.
    pub fn insert(&self, record: NotificationRecord) {
        self.seed([record.clone()]);
        // No live subscribers is not an error.
        let _ = self.inner.inserts.send(record);
    }

    pub fn get(&self, id: Uuid) -> Option<NotificationRecord> {
        self.rows().iter().find(|row| row.id == id).cloned()
    }

    pub fn rows_for(&self, user_id: Uuid) -> Vec<NotificationRecord> {
        self.rows()
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Overwrite a stored row in place, e.g. to simulate a remote reset.
    pub fn update(&self, record: NotificationRecord) {
        let mut rows = self.rows();
        if let Some(row) = rows.iter_mut().find(|row| row.id == record.id) {
            *row = record;
        }
    }

    pub fn fail(&self, operation: Operation) {
        self.controls().failing.insert(operation);
    }

    pub fn recover(&self, operation: Operation) {
        self.controls().failing.remove(&operation);
    }

    pub fn gate_list(&self, user_id: Uuid) -> FetchGate {
        let notify = Arc::new(Notify::new());
        self.controls().list_gates.insert(user_id, notify.clone());
        FetchGate { notify }
    }

    /// Stop holding new list fetches for `user_id`. Fetches already held keep
    /// waiting on their gate.
    pub fn ungate_list(&self, user_id: Uuid) {
        self.controls().list_gates.remove(&user_id);
    }

    /// Return `record` in `user_id`'s list regardless of its owner, as a
    /// misbehaving backend would.
    pub fn misfile(&self, user_id: Uuid, record: NotificationRecord) {
        self.controls().misfiled.entry(user_id).or_default().push(record);
    }

    pub fn report_unread(&self, user_id: Uuid, count: usize) {
        self.controls().unread_overrides.insert(user_id, count);
    }

    pub fn calls(&self, operation: Operation) -> usize {
        self.controls().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Live forwarding feeds, one per open subscription.
    pub fn subscriber_count(&self) -> usize {
        self.inner.inserts.receiver_count()
    }

    fn enter(&self, operation: Operation) -> Result<(), GatewayError> {
        let mut controls = self.controls();
        *controls.calls.entry(operation).or_default() += 1;
        if controls.failing.contains(&operation) {
            return Err(GatewayError::Backend(anyhow!("injected {:?} failure", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteGateway for InMemoryGateway {
    async fn fetch_list(&self, user_id: Uuid) -> Result<Vec<NotificationRecord>, GatewayError> {
        // Snapshot at issue time; a gate only delays delivery.
        let mut rows = self.rows_for(user_id);
        let gate = {
            let controls = self.controls();
            if let Some(misfiled) = controls.misfiled.get(&user_id) {
                rows.extend(misfiled.iter().cloned());
            }
            controls.list_gates.get(&user_id).cloned()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.enter(Operation::FetchList)?;
        Ok(rows)
    }

    async fn fetch_unread_count(&self, user_id: Uuid) -> Result<usize, GatewayError> {
        self.enter(Operation::FetchUnreadCount)?;
        if let Some(count) = self.controls().unread_overrides.get(&user_id).copied() {
            return Ok(count);
        }
        Ok(self
            .rows()
            .iter()
            .filter(|row| row.user_id == user_id && !row.is_read)
            .count())
    }

    async fn mark_read(&self, id: Uuid) -> Result<(), GatewayError> {
        self.enter(Operation::MarkRead)?;
        let mut rows = self.rows();
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(GatewayError::NotFound)?;
        if !row.is_read {
            row.is_read = true;
            row.read_at = Some(OffsetDateTime::now_utc());
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<(), GatewayError> {
        self.enter(Operation::MarkAllRead)?;
        let now = OffsetDateTime::now_utc();
        for row in self
            .rows()
            .iter_mut()
            .filter(|row| row.user_id == user_id && !row.is_read)
        {
            row.is_read = true;
            row.read_at = Some(now);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), GatewayError> {
        self.enter(Operation::Delete)?;
        let mut rows = self.rows();
        let index = rows
            .iter()
            .position(|row| row.id == id)
            .ok_or(GatewayError::NotFound)?;
        rows.remove(index);
        Ok(())
    }

    async fn delete_all(&self, user_id: Uuid) -> Result<(), GatewayError> {
        self.enter(Operation::DeleteAll)?;
        self.rows().retain(|row| row.user_id != user_id);
        Ok(())
    }

    async fn subscribe(&self, user_id: Uuid) -> Result<PushSubscription, GatewayError> {
        self.enter(Operation::Subscribe)?;
        let mut inserts = self.inner.inserts.subscribe();
        let (tx, rx) = mpsc::channel(PUSH_BUFFER);

        let feeder = tokio::spawn(async move {
            loop {
                match inserts.recv().await {
                    Ok(record) if record.user_id == user_id => {
                        if tx.send(record).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(user_id = %user_id, skipped, "push feed lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Ok(PushSubscription::new(user_id, rx, Some(feeder.abort_handle())))
    }
}
