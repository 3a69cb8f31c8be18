use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::domain::notification::NotificationRecord;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("notification not found")]
    NotFound,
    #[error("remote call timed out")]
    Timeout,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        GatewayError::Backend(err.into())
    }
}

/// The authoritative notification store and its push channel.
#[async_trait]
pub trait RemoteGateway: Send + Sync + 'static {
    /// Rows for `user_id`, newest first.
    async fn fetch_list(&self, user_id: Uuid) -> Result<Vec<NotificationRecord>, GatewayError>;

    async fn fetch_unread_count(&self, user_id: Uuid) -> Result<usize, GatewayError>;

    async fn mark_read(&self, id: Uuid) -> Result<(), GatewayError>;

    async fn mark_all_read(&self, user_id: Uuid) -> Result<(), GatewayError>;

    async fn delete(&self, id: Uuid) -> Result<(), GatewayError>;

    async fn delete_all(&self, user_id: Uuid) -> Result<(), GatewayError>;

    /// Start delivering newly inserted rows for `user_id`.
    async fn subscribe(&self, user_id: Uuid) -> Result<PushSubscription, GatewayError>;
}

/// A live insert feed. Dropping the handle unsubscribes.
#[derive(Debug)]
pub struct PushSubscription {
    user_id: Uuid,
    receiver: mpsc::Receiver<NotificationRecord>,
    feeder: Option<AbortHandle>,
}

impl PushSubscription {
    /// `feeder` is the gateway task pumping `receiver`, aborted on unsubscribe.
    pub fn new(
        user_id: Uuid,
        receiver: mpsc::Receiver<NotificationRecord>,
        feeder: Option<AbortHandle>,
    ) -> Self {
        Self {
            user_id,
            receiver,
            feeder,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub async fn recv(&mut self) -> Option<NotificationRecord> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.receiver.close();
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }
}

impl Drop for PushSubscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}
