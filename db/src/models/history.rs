use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::subscription::SubscriptionStatus;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct SubscriptionHistory {
    pub uuid: Uuid,
    pub subscription_uuid: Uuid,
    pub action: String,
    pub old_plan: Option<String>,
    pub new_plan: Option<String>,
    pub old_status: Option<SubscriptionStatus>,
    pub new_status: SubscriptionStatus,
    pub amount: i64,
    pub action_date: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub notes: Option<String>,
}
