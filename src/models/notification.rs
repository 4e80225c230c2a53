use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    #[serde(default)]
    pub policy_id: Option<Uuid>,
    #[serde(default)]
    pub policy_type: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Result of marking every notification read
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarkedRead {
    pub marked_read: u64,
}
