use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    history::SubscriptionHistory,
    subscription::{Subscription, SubscriptionStatus},
};

pub struct HistoryCreateRequest {
    pub action: String,
    pub old_plan: Option<String>,
    pub new_plan: Option<String>,
    pub old_status: Option<SubscriptionStatus>,
    pub new_status: SubscriptionStatus,
    pub amount: i64,
    pub user_id: Option<Uuid>,
    pub notes: Option<String>,
}

impl HistoryCreateRequest {
    /// Describes the change from `before` to `after`.
    pub fn between(
        action: &str,
        before: &Subscription,
        after: &Subscription,
        user_id: Option<Uuid>,
        notes: Option<String>,
    ) -> Self {
        HistoryCreateRequest {
            action: action.to_string(),
            old_plan: before.plan_id.clone(),
            new_plan: after.plan_id.clone(),
            old_status: Some(before.status),
            new_status: after.status,
            amount: after.amount,
            user_id,
            notes,
        }
    }

    pub(crate) fn into_history(self, subscription_uuid: Uuid, now: DateTime<Utc>) -> SubscriptionHistory {
        SubscriptionHistory {
            uuid: Uuid::new_v4(),
            subscription_uuid,
            action: self.action,
            old_plan: self.old_plan,
            new_plan: self.new_plan,
            old_status: self.old_status,
            new_status: self.new_status,
            amount: self.amount,
            action_date: now,
            user_id: self.user_id,
            notes: self.notes,
        }
    }
}

pub struct SubscriptionFilter {
    pub status: Option<SubscriptionStatus>,
    /// Case-insensitive match against name and email.
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionStats {
    pub total_subscriptions: i64,
    pub active_subscriptions: i64,
    pub pending_subscriptions: i64,
    pub expired_subscriptions: i64,
    pub cancelled_subscriptions: i64,
    pub by_status: BTreeMap<SubscriptionStatus, i64>,
    /// Sum of `amount` over active and expired subscriptions, in cents.
    pub total_revenue: i64,
    /// Sum of `amount` over active subscriptions created this month, in cents.
    pub monthly_revenue: i64,
}

impl SubscriptionStats {
    pub fn from_counts(
        counts: BTreeMap<SubscriptionStatus, i64>,
        total_revenue: i64,
        monthly_revenue: i64,
    ) -> Self {
        let mut by_status: BTreeMap<SubscriptionStatus, i64> =
            SubscriptionStatus::ALL.iter().map(|s| (*s, 0)).collect();
        by_status.extend(counts);

        let count = |status: SubscriptionStatus| by_status.get(&status).copied().unwrap_or(0);
        let total_subscriptions = by_status.values().sum();
        let active_subscriptions = count(SubscriptionStatus::Active);
        let pending_subscriptions = count(SubscriptionStatus::Pending);
        let expired_subscriptions = count(SubscriptionStatus::Expired);
        let cancelled_subscriptions = count(SubscriptionStatus::Cancelled);

        SubscriptionStats {
            total_subscriptions,
            active_subscriptions,
            pending_subscriptions,
            expired_subscriptions,
            cancelled_subscriptions,
            by_status,
            total_revenue,
            monthly_revenue,
        }
    }
}
