use anyhow::anyhow;
use async_trait::async_trait;
use serde::Deserialize;
use sqlx::postgres::{PgListener, PgRow};
use sqlx::Row;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::notification::{NotificationKind, NotificationRecord};
use crate::infra::db::Db;
use crate::infra::gateway::{GatewayError, PushSubscription, RemoteGateway};

const PUSH_BUFFER: usize = 64;

/// Channel the `notifications_notify_insert` trigger announces inserts on.
/// Must match `migrations/0001_notifications.sql`.
pub const NOTIFY_CHANNEL: &str = "notification_inserted";

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, kind, title, message, payload, is_read, read_at, created_at FROM notifications";

/// Insert announcement sent by the trigger. The row itself is fetched by id.
#[derive(Debug, Deserialize)]
struct InsertAnnouncement {
    id: Uuid,
    user_id: Uuid,
}

/// Gateway over the `notifications` table.
#[derive(Clone)]
pub struct PgGateway {
    db: Db,
    list_limit: i64,
}

impl PgGateway {
    pub fn new(db: Db, list_limit: i64) -> Self {
        Self { db, list_limit }
    }
}

async fn fetch_by_id(db: &Db, id: Uuid) -> Result<Option<NotificationRecord>, GatewayError> {
    let row = sqlx::query(&format!("{} WHERE id = $1", SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(db.pool())
        .await?;
    Ok(row.map(record_from_row))
}

fn record_from_row(row: PgRow) -> NotificationRecord {
    let kind: String = row.get("kind");
    NotificationRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: NotificationKind::from_name(&kind),
        title: row.get("title"),
        message: row.get("message"),
        payload: row.get("payload"),
        created_at: row.get("created_at"),
        is_read: row.get("is_read"),
        read_at: row.get("read_at"),
    }
}

#[async_trait]
impl RemoteGateway for PgGateway {
    async fn fetch_list(&self, user_id: Uuid) -> Result<Vec<NotificationRecord>, GatewayError> {
        let rows = sqlx::query(&format!(
            "{} WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .bind(self.list_limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(record_from_row).collect())
    }

    async fn fetch_unread_count(&self, user_id: Uuid) -> Result<usize, GatewayError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        usize::try_from(count).map_err(|err| GatewayError::Backend(anyhow!("invalid unread count: {}", err)))
    }

    async fn mark_read(&self, id: Uuid) -> Result<(), GatewayError> {
        let result = sqlx::query(
            "UPDATE notifications \
             SET is_read = true, read_at = COALESCE(read_at, now()) \
             WHERE id = $1",
        )
        .bind(id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::NotFound);
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<(), GatewayError> {
        sqlx::query(
            "UPDATE notifications \
             SET is_read = true, read_at = now() \
             WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), GatewayError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::NotFound);
        }
        Ok(())
    }

    async fn delete_all(&self, user_id: Uuid) -> Result<(), GatewayError> {
        sqlx::query("DELETE FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    async fn subscribe(&self, user_id: Uuid) -> Result<PushSubscription, GatewayError> {
        let mut listener = PgListener::connect_with(self.db.pool()).await?;
        listener.listen(NOTIFY_CHANNEL).await?;
        let (tx, rx) = mpsc::channel(PUSH_BUFFER);
        let db = self.db.clone();

        let feeder = tokio::spawn(async move {
            loop {
                let notification = match listener.recv().await {
                    Ok(notification) => notification,
                    Err(err) => {
                        warn!(error = ?err, user_id = %user_id, "notification listener failed");
                        break;
                    }
                };

                let announced: InsertAnnouncement = match serde_json::from_str(notification.payload()) {
                    Ok(announced) => announced,
                    Err(err) => {
                        warn!(error = ?err, "failed to parse notification insert payload");
                        continue;
                    }
                };
                // The channel carries every user's inserts.
                if announced.user_id != user_id {
                    continue;
                }

                let record = match fetch_by_id(&db, announced.id).await {
                    Ok(Some(record)) => record,
                    Ok(None) => {
                        debug!(notification_id = %announced.id, "announced notification already gone");
                        continue;
                    }
                    Err(err) => {
                        warn!(error = %err, notification_id = %announced.id, "failed to fetch announced notification");
                        continue;
                    }
                };

                debug!(notification_id = %record.id, user_id = %user_id, "received notification insert");
                if tx.send(record).await.is_err() {
                    break;
                }
            }
        });

        Ok(PushSubscription::new(user_id, rx, Some(feeder.abort_handle())))
    }
}
