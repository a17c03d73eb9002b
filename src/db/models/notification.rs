use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Delivery priority. Lower stored value wins the dequeue order.
///
/// The integer mapping is part of the on-disk contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationPriority {
    #[serde(rename = "HIGH_PRIORITY")]
    High,
    #[serde(rename = "DEFAULT_PRIORITY")]
    Default,
    #[serde(rename = "LOW_PRIORITY")]
    Low,
}

impl NotificationPriority {
    pub fn as_i64(self) -> i64 {
        match self {
            NotificationPriority::High => 10,
            NotificationPriority::Default => 50,
            NotificationPriority::Low => 100,
        }
    }

    #[allow(dead_code)]
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            10 => Some(NotificationPriority::High),
            50 => Some(NotificationPriority::Default),
            100 => Some(NotificationPriority::Low),
            _ => None,
        }
    }
}

/// The parent record for one submission. Never mutated after creation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,

    /// Opaque idempotency token, unique within `context`. Generated when the
    /// caller does not supply one.
    pub token: String,

    /// Free-form caller tag identifying the calling context.
    pub context: String,

    /// Stored integer priority (10/50/100).
    pub priority: i64,

    pub subject: String,
    pub plain_text: Option<String>,
    pub html_text: Option<String>,

    pub created_at: NaiveDateTime,
}

/// Field set for inserting a notification row.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub token: String,
    pub context: String,
    pub priority: i64,
    pub subject: String,
    pub plain_text: Option<String>,
    pub html_text: Option<String>,
}
