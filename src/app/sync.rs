use std::future::Future;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::error::{LoadOutcome, MutationOutcome, SyncError};
use crate::app::store::NotificationStore;
use crate::domain::notification::{NotificationRecord, NotificationSnapshot};
use crate::infra::gateway::{GatewayError, PushSubscription, RemoteGateway};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub remote_timeout: Duration,
    /// Extra attempts after a failed remote mutation.
    pub mutation_retry_attempts: u32,
    pub mutation_retry_backoff: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(5),
            mutation_retry_attempts: 1,
            mutation_retry_backoff: Duration::from_millis(250),
        }
    }
}

/// Keeps a [`NotificationStore`] in step with a [`RemoteGateway`] for one
/// authenticated user at a time.
///
/// All store mutations happen under a short, never-awaited lock, so the store
/// sees a single sequential timeline. Asynchronous results are matched
/// against the load generation (and the session epoch for push events)
/// before they are applied; anything that loses that race is dropped.
#[derive(Clone)]
pub struct SyncEngine {
    gateway: Arc<dyn RemoteGateway>,
    config: SyncConfig,
    session: Arc<Mutex<Session>>,
}

#[derive(Default)]
struct Session {
    user_id: Option<Uuid>,
    /// Bumped on every identity transition.
    epoch: u64,
    /// Load generation token; bumped on every load and identity transition.
    generation: u64,
    in_flight: Option<u64>,
    /// Store changes made while a load was in flight, replayed over its snapshot.
    pending: Vec<PendingChange>,
    store: NotificationStore,
    listener: Option<PushListener>,
}

/// Background task draining a [`PushSubscription`]; aborted on drop, which
/// also drops the subscription.
struct PushListener {
    task: JoinHandle<()>,
}

impl PushListener {
    fn is_live(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PushListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// One store mutation, kept in call order so it can be replayed.
enum PendingChange {
    Pushed(NotificationRecord),
    MarkedRead(Uuid, OffsetDateTime),
    MarkedAllRead(OffsetDateTime),
    Removed(Uuid),
    RemovedAll,
}

impl PendingChange {
    fn apply(self, store: &mut NotificationStore) {
        match self {
            PendingChange::Pushed(record) => {
                store.insert_one(record);
            }
            PendingChange::MarkedRead(id, at) => {
                store.mark_read(id, at);
            }
            PendingChange::MarkedAllRead(at) => {
                store.mark_all_read(at);
            }
            PendingChange::Removed(id) => {
                store.remove(id);
            }
            PendingChange::RemovedAll => {
                store.remove_all();
            }
        }
    }
}

impl Session {
    fn note(&mut self, change: PendingChange) {
        if self.in_flight.is_some() {
            self.pending.push(change);
        }
    }

    fn accept_push(&mut self, record: NotificationRecord) -> Result<bool, SyncError> {
        let session_user = self.user_id.ok_or(SyncError::NoSession)?;
        if record.user_id != session_user {
            let mismatch = SyncError::IdentityMismatch {
                notification_id: record.id,
                record_user: record.user_id,
                session_user,
            };
            warn!(error = %mismatch, "discarding pushed notification");
            return Err(mismatch);
        }

        if self.in_flight.is_some() {
            self.pending.push(PendingChange::Pushed(record.clone()));
        }
        Ok(self.store.insert_one(record))
    }

    fn clear_user(&mut self, user_id: Option<Uuid>) {
        self.listener = None;
        self.store.reset();
        self.pending.clear();
        self.in_flight = None;
        self.user_id = user_id;
        self.epoch += 1;
        self.generation += 1;
    }
}

impl SyncEngine {
    pub fn new(gateway: Arc<dyn RemoteGateway>, config: SyncConfig) -> Self {
        Self {
            gateway,
            config,
            session: Arc::new(Mutex::new(Session::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_user(&self) -> Option<Uuid> {
        self.lock().user_id
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        self.lock().store.snapshot()
    }

    pub fn record(&self, id: Uuid) -> Option<NotificationRecord> {
        self.lock().store.get(id).cloned()
    }

    pub fn unread_count(&self) -> usize {
        self.lock().store.unread_count()
    }

    pub fn is_subscribed(&self) -> bool {
        self.lock().listener.as_ref().is_some_and(PushListener::is_live)
    }

    /// Session lifecycle hook for the authentication subsystem.
    ///
    /// On a change of identity the previous push subscription is torn down and
    /// the store is emptied before anything for the new user is requested.
    /// Signing out (`None`) stops there. Re-announcing the current user is a
    /// reload.
    pub async fn switch_identity(&self, user_id: Option<Uuid>) -> Result<LoadOutcome, SyncError> {
        let epoch = {
            let mut session = self.lock();
            if session.user_id == user_id {
                // Re-subscribe if the feed failed or closed earlier in this session.
                let live = session.listener.as_ref().is_some_and(PushListener::is_live);
                (!live).then_some(session.epoch)
            } else {
                match (session.user_id, user_id) {
                    (Some(previous), Some(next)) => {
                        info!(previous = %previous, user_id = %next, "switching notification session")
                    }
                    (None, Some(next)) => info!(user_id = %next, "starting notification session"),
                    (Some(previous), None) => info!(previous = %previous, "ending notification session"),
                    (None, None) => {}
                }
                session.clear_user(user_id);
                Some(session.epoch)
            }
        };

        let Some(user_id) = user_id else {
            return Ok(LoadOutcome::SignedOut);
        };
        if let Some(epoch) = epoch {
            self.subscribe(user_id, epoch).await;
        }
        self.load().await
    }

    async fn subscribe(&self, user_id: Uuid, epoch: u64) {
        let subscription = match self.remote(self.gateway.subscribe(user_id)).await {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(error = %err, user_id = %user_id, "push subscription failed, relying on reloads");
                return;
            }
        };

        let mut session = self.lock();
        if session.epoch != epoch {
            debug!(user_id = %user_id, "session changed while subscribing, dropping subscription");
            return;
        }
        let task = tokio::spawn(listen(Arc::downgrade(&self.session), epoch, subscription));
        session.listener = Some(PushListener { task });
    }

    /// Fetch the list and the unread count in parallel and replace the store
    /// with the list. The list is authoritative; a disagreeing count is only
    /// logged. A failed load leaves the store untouched.
    pub async fn load(&self) -> Result<LoadOutcome, SyncError> {
        let (user_id, generation) = {
            let mut session = self.lock();
            let Some(user_id) = session.user_id else {
                session.store.reset();
                return Ok(LoadOutcome::SignedOut);
            };
            session.generation += 1;
            session.in_flight = Some(session.generation);
            (user_id, session.generation)
        };

        let (list, reported_unread) = tokio::join!(
            self.remote(self.gateway.fetch_list(user_id)),
            self.remote(self.gateway.fetch_unread_count(user_id)),
        );

        let mut session = self.lock();
        if session.generation != generation {
            debug!(user_id = %user_id, generation, "discarding superseded load");
            return Ok(LoadOutcome::Superseded);
        }
        session.in_flight = None;
        let pending = mem::take(&mut session.pending);

        let records = match list {
            Ok(records) => records,
            Err(source) => {
                let failure = SyncError::LoadFailure { user_id, source };
                warn!(error = %failure, "keeping previous notifications");
                return Err(failure);
            }
        };

        let (own, foreign): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|record| record.user_id == user_id);
        for record in &foreign {
            let mismatch = SyncError::IdentityMismatch {
                notification_id: record.id,
                record_user: record.user_id,
                session_user: user_id,
            };
            warn!(error = %mismatch, "discarding fetched notification");
        }

        session.store.replace_all(own);
        let listed_unread = session.store.unread_count();
        if !pending.is_empty() {
            debug!(user_id = %user_id, changes = pending.len(), "replaying changes made during load");
        }
        for change in pending {
            change.apply(&mut session.store);
        }

        let unread = session.store.unread_count();
        match reported_unread {
            Ok(reported) if reported != listed_unread => {
                warn!(user_id = %user_id, reported, computed = listed_unread, "remote unread count disagrees with list");
            }
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, user_id = %user_id, "unread count fetch failed, using list");
            }
        }

        Ok(LoadOutcome::Applied {
            records: session.store.len(),
            unread,
        })
    }

    /// Apply a push-delivered record. Returns `Ok(false)` for a duplicate delivery.
    pub fn on_push_insert(&self, record: NotificationRecord) -> Result<bool, SyncError> {
        self.lock().accept_push(record)
    }

    pub async fn mark_read(&self, id: Uuid) -> MutationOutcome {
        let epoch = {
            let mut session = self.lock();
            if session.user_id.is_none() {
                return MutationOutcome::NoSession;
            }
            let at = OffsetDateTime::now_utc();
            session.store.mark_read(id, at);
            session.note(PendingChange::MarkedRead(id, at));
            session.epoch
        };

        self.reconcile("mark_read", epoch, || self.gateway.mark_read(id))
            .await
    }

    pub async fn mark_all_read(&self) -> MutationOutcome {
        let (user_id, epoch) = {
            let mut session = self.lock();
            let Some(user_id) = session.user_id else {
                return MutationOutcome::NoSession;
            };
            let at = OffsetDateTime::now_utc();
            session.store.mark_all_read(at);
            session.note(PendingChange::MarkedAllRead(at));
            (user_id, session.epoch)
        };

        self.reconcile("mark_all_read", epoch, || self.gateway.mark_all_read(user_id))
            .await
    }

    pub async fn remove(&self, id: Uuid) -> MutationOutcome {
        let epoch = {
            let mut session = self.lock();
            if session.user_id.is_none() {
                return MutationOutcome::NoSession;
            }
            session.store.remove(id);
            session.note(PendingChange::Removed(id));
            session.epoch
        };

        self.reconcile("delete", epoch, || self.gateway.delete(id))
            .await
    }

    pub async fn remove_all(&self) -> MutationOutcome {
        let (user_id, epoch) = {
            let mut session = self.lock();
            let Some(user_id) = session.user_id else {
                return MutationOutcome::NoSession;
            };
            session.store.remove_all();
            session.note(PendingChange::RemovedAll);
            (user_id, session.epoch)
        };

        self.reconcile("delete_all", epoch, || self.gateway.delete_all(user_id))
            .await
    }

    /// Tear down the live subscription; the store keeps its contents.
    pub fn shutdown(&self) {
        if self.lock().listener.take().is_some() {
            info!("push subscription closed");
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock().epoch == epoch
    }

    async fn remote<T>(
        &self,
        call: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, GatewayError> {
        match tokio::time::timeout(self.config.remote_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        }
    }

    /// Issue the remote half of an optimistic mutation. The local change is
    /// never rolled back; failures are retried a bounded number of times while
    /// the session stays current, then left for the next load.
    async fn reconcile<F, Fut>(&self, operation: &'static str, epoch: u64, call: F) -> MutationOutcome
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<(), GatewayError>>,
    {
        let mut attempt = 0;
        loop {
            let source = match self.remote(call()).await {
                Ok(()) => return MutationOutcome::Confirmed,
                Err(GatewayError::NotFound) => {
                    debug!(operation, "remote row already gone");
                    return MutationOutcome::NotFound;
                }
                Err(err) => err,
            };

            let retry = attempt < self.config.mutation_retry_attempts && self.is_current(epoch);
            if !retry {
                let failure = SyncError::MutationFailure { operation, source };
                warn!(error = %failure, attempts = attempt + 1, "keeping local change until next load");
                return MutationOutcome::Deferred;
            }

            attempt += 1;
            debug!(operation, attempt, error = %source, "retrying remote mutation");
            tokio::time::sleep(self.config.mutation_retry_backoff).await;
            if !self.is_current(epoch) {
                debug!(operation, "session changed, abandoning remote mutation");
                return MutationOutcome::Deferred;
            }
        }
    }
}

async fn listen(session: Weak<Mutex<Session>>, epoch: u64, mut subscription: PushSubscription) {
    let user_id = subscription.user_id();
    debug!(user_id = %user_id, "push listener started");

    while let Some(record) = subscription.recv().await {
        let Some(shared) = session.upgrade() else {
            break;
        };
        let mut session = shared.lock().unwrap_or_else(PoisonError::into_inner);
        if session.epoch != epoch {
            break;
        }
        let notification_id = record.id;
        match session.accept_push(record) {
            Ok(true) => debug!(notification_id = %notification_id, "applied pushed notification"),
            Ok(false) => debug!(notification_id = %notification_id, "ignored duplicate push delivery"),
            Err(_) => {}
        }
    }

    debug!(user_id = %user_id, "push listener stopped");
}
