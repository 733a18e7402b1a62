//! Storage capability injected into the subscription services.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::Res;
use uuid::Uuid;

use crate::{
    dtos::subscription::{HistoryCreateRequest, SubscriptionFilter, SubscriptionStats},
    models::{history::SubscriptionHistory, subscription::Subscription},
};

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Persist a new subscription together with its first history entry.
    async fn insert(
        &self,
        subscription: Subscription,
        entry: HistoryCreateRequest,
    ) -> Res<Subscription>;

    async fn find(&self, uuid: Uuid) -> Res<Option<Subscription>>;

    /// Write `subscription` and append `entry` atomically.
    ///
    /// The row is only updated while its stored version still equals
    /// `subscription.version`; otherwise nothing is written and
    /// `AppError::Conflict` is returned. The returned row carries the bumped version.
    async fn save(&self, subscription: &Subscription, entry: HistoryCreateRequest)
    -> Res<Subscription>;

    /// History of one subscription, newest first.
    async fn history(&self, uuid: Uuid) -> Res<Vec<SubscriptionHistory>>;

    /// One page of subscriptions, newest first, plus the total matching the filter.
    async fn list(&self, filter: &SubscriptionFilter) -> Res<(Vec<Subscription>, i64)>;

    async fn stats(&self, month_start: DateTime<Utc>) -> Res<SubscriptionStats>;

    /// Active subscriptions whose `end_date` is at or before `now`.
    async fn due_for_expiry(&self, now: DateTime<Utc>) -> Res<Vec<Subscription>>;
}
