use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Deep-link attachment such as `{"order_id": "..."}`; opaque to the store.
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
}

/// Closed set of notification categories. Unknown values coming from the
/// remote store decode as [`NotificationKind::System`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderPlaced,
    OrderStatus,
    TrackingUpdate,
    CancellationApproved,
    CancellationRejected,
    ReplacementApproved,
    ReplacementRejected,
    WorkshopRequested,
    WorkshopApproved,
    WorkshopRejected,
    AccountSecurity,
    #[serde(other)]
    System,
}

impl NotificationKind {
    /// Decode a stored kind name through the serde mapping, so unknown names
    /// fall back to [`NotificationKind::System`].
    pub fn from_name(name: &str) -> Self {
        serde_json::from_value(Value::String(name.to_string())).unwrap_or(NotificationKind::System)
    }

    fn is_order_related(&self) -> bool {
        matches!(
            self,
            NotificationKind::OrderPlaced
                | NotificationKind::OrderStatus
                | NotificationKind::CancellationApproved
                | NotificationKind::CancellationRejected
                | NotificationKind::ReplacementApproved
                | NotificationKind::ReplacementRejected
        )
    }

    fn is_workshop_related(&self) -> bool {
        matches!(
            self,
            NotificationKind::WorkshopRequested
                | NotificationKind::WorkshopApproved
                | NotificationKind::WorkshopRejected
        )
    }
}

impl NotificationRecord {
    /// Storefront route the panel navigates to when the record is opened.
    pub fn link(&self) -> Option<String> {
        if self.kind == NotificationKind::AccountSecurity {
            return Some("/account/security".to_string());
        }

        let payload = self.payload.as_ref()?;
        if self.kind == NotificationKind::TrackingUpdate {
            let order_id = payload_str(payload, "order_id")?;
            return Some(format!("/orders/{}/tracking", order_id));
        }
        if self.kind.is_order_related() {
            let order_id = payload_str(payload, "order_id")?;
            return Some(format!("/orders/{}", order_id));
        }
        if self.kind.is_workshop_related() {
            let workshop_id = payload_str(payload, "workshop_id")?;
            return Some(format!("/workshops/{}", workshop_id));
        }
        None
    }
}

fn payload_str<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Read-only view handed to consumers of the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotificationSnapshot {
    pub records: Vec<NotificationRecord>,
    pub unread_count: usize,
}
