//! In-memory [`SubscriptionStore`], used when no `DATABASE_URL` is configured and in tests.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use dashmap::{DashMap, mapref::entry::Entry};
use uuid::Uuid;

use crate::{
    dtos::subscription::{HistoryCreateRequest, SubscriptionFilter, SubscriptionStats},
    models::{
        history::SubscriptionHistory,
        subscription::{Subscription, SubscriptionStatus},
    },
    store::SubscriptionStore,
};

#[derive(Default, Clone)]
pub struct MemorySubscriptionStore {
    subscriptions: Arc<DashMap<Uuid, Subscription>>,
    history: Arc<DashMap<Uuid, Vec<SubscriptionHistory>>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_filter(subscription: &Subscription, filter: &SubscriptionFilter) -> bool {
    if let Some(status) = filter.status {
        if subscription.status != status {
            return false;
        }
    }

    match filter.search.as_deref().filter(|s| !s.is_empty()) {
        Some(search) => {
            let needle = search.to_lowercase();
            subscription.name.to_lowercase().contains(&needle)
                || subscription
                    .email
                    .as_deref()
                    .is_some_and(|email| email.to_lowercase().contains(&needle))
        }
        None => true,
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn insert(
        &self,
        subscription: Subscription,
        entry: HistoryCreateRequest,
    ) -> Res<Subscription> {
        let uuid = subscription.uuid;
        match self.subscriptions.entry(uuid) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "Subscription {} already exists",
                uuid
            ))),
            Entry::Vacant(slot) => {
                let history = entry.into_history(uuid, Utc::now());
                self.history.entry(uuid).or_default().push(history);
                slot.insert(subscription.clone());
                Ok(subscription)
            }
        }
    }

    async fn find(&self, uuid: Uuid) -> Res<Option<Subscription>> {
        Ok(self.subscriptions.get(&uuid).map(|r| r.value().clone()))
    }

    async fn save(
        &self,
        subscription: &Subscription,
        entry: HistoryCreateRequest,
    ) -> Res<Subscription> {
        // the shard lock is held until the history entry is appended
        let mut stored = self
            .subscriptions
            .get_mut(&subscription.uuid)
            .ok_or_else(|| {
                AppError::NotFound(format!("Subscription {}", subscription.uuid))
            })?;

        if stored.version != subscription.version {
            return Err(AppError::Conflict(format!(
                "Subscription {} was modified concurrently",
                subscription.uuid
            )));
        }

        let now = Utc::now();
        let mut updated = subscription.clone();
        updated.version += 1;
        updated.updated_at = now;
        *stored = updated.clone();

        self.history
            .entry(updated.uuid)
            .or_default()
            .push(entry.into_history(updated.uuid, now));

        Ok(updated)
    }

    async fn history(&self, uuid: Uuid) -> Res<Vec<SubscriptionHistory>> {
        let mut entries = self
            .history
            .get(&uuid)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        // entries are appended in order, so reversing keeps equal timestamps newest first
        entries.reverse();
        entries.sort_by(|a, b| b.action_date.cmp(&a.action_date));
        Ok(entries)
    }

    async fn list(&self, filter: &SubscriptionFilter) -> Res<(Vec<Subscription>, i64)> {
        let mut found: Vec<Subscription> = self
            .subscriptions
            .iter()
            .filter(|r| matches_filter(r.value(), filter))
            .map(|r| r.value().clone())
            .collect();
        found.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.uuid.cmp(&b.uuid))
        });

        let total = found.len() as i64;
        let page = found
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn stats(&self, month_start: DateTime<Utc>) -> Res<SubscriptionStats> {
        let mut counts: BTreeMap<SubscriptionStatus, i64> = BTreeMap::new();
        let mut total_revenue = 0;
        let mut monthly_revenue = 0;

        for r in self.subscriptions.iter() {
            let sub = r.value();
            *counts.entry(sub.status).or_default() += 1;
            match sub.status {
                SubscriptionStatus::Active => {
                    total_revenue += sub.amount;
                    if sub.created_at >= month_start {
                        monthly_revenue += sub.amount;
                    }
                }
                SubscriptionStatus::Expired => total_revenue += sub.amount,
                _ => {}
            }
        }

        Ok(SubscriptionStats::from_counts(
            counts,
            total_revenue,
            monthly_revenue,
        ))
    }

    async fn due_for_expiry(&self, now: DateTime<Utc>) -> Res<Vec<Subscription>> {
        let mut due: Vec<Subscription> = self
            .subscriptions
            .iter()
            .filter(|r| {
                r.status == SubscriptionStatus::Active && r.end_date.is_some_and(|end| end <= now)
            })
            .map(|r| r.value().clone())
            .collect();
        due.sort_by_key(|s| s.end_date);
        Ok(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn subscription(name: &str, status: SubscriptionStatus) -> Subscription {
        let now = Utc::now();
        Subscription {
            uuid: Uuid::new_v4(),
            step: 1,
            status,
            version: 1,
            entreprise_type: None,
            name: name.to_string(),
            rccm: None,
            id_nat: None,
            num_impot: None,
            email: Some(format!("{}@example.com", name.to_lowercase())),
            telephone: "+243000000000".to_string(),
            address: None,
            manager: None,
            plan_id: None,
            plan_name: None,
            amount: 0,
            currency: "USD".to_string(),
            duration: 0,
            features: vec![],
            max_users: 0,
            max_pos: 0,
            max_storage_gb: 0,
            payment_method: None,
            payment_reference: None,
            payment_status: None,
            transaction_id: None,
            payment_date: None,
            mobile_operator: None,
            validated_by: None,
            validation_date: None,
            notes: None,
            rejected_reason: None,
            start_date: None,
            end_date: None,
            expiry_date: None,
            next_billing_date: None,
            auto_renew: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn entry(action: &str, status: SubscriptionStatus) -> HistoryCreateRequest {
        HistoryCreateRequest {
            action: action.to_string(),
            old_plan: None,
            new_plan: None,
            old_status: None,
            new_status: status,
            amount: 0,
            user_id: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn save_bumps_version_and_appends_history() {
        let store = MemorySubscriptionStore::new();
        let created = store
            .insert(
                subscription("Boutique", SubscriptionStatus::Pending),
                entry("created", SubscriptionStatus::Pending),
            )
            .await
            .unwrap();

        let mut next = created.clone();
        next.step = 2;
        let saved = store
            .save(&next, entry("plan_selected", SubscriptionStatus::Pending))
            .await
            .unwrap();

        assert_eq!(saved.version, created.version + 1);
        let history = store.history(created.uuid).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, "plan_selected");
    }

    #[tokio::test]
    async fn stale_version_is_rejected_without_writing_history() {
        let store = MemorySubscriptionStore::new();
        let created = store
            .insert(
                subscription("Boutique", SubscriptionStatus::Pending),
                entry("created", SubscriptionStatus::Pending),
            )
            .await
            .unwrap();

        store
            .save(&created, entry("plan_selected", SubscriptionStatus::Pending))
            .await
            .unwrap();
        let stale = store
            .save(&created, entry("plan_selected", SubscriptionStatus::Pending))
            .await;

        assert!(matches!(stale, Err(AppError::Conflict(_))));
        assert_eq!(store.history(created.uuid).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_pages_through_filtered_results() {
        let store = MemorySubscriptionStore::new();
        for i in 0..37 {
            let mut sub = subscription(&format!("Shop{}", i), SubscriptionStatus::Pending);
            sub.created_at = Utc::now() - Duration::minutes(i);
            store
                .insert(sub, entry("created", SubscriptionStatus::Pending))
                .await
                .unwrap();
        }
        store
            .insert(
                subscription("Other", SubscriptionStatus::Active),
                entry("created", SubscriptionStatus::Active),
            )
            .await
            .unwrap();

        let filter = SubscriptionFilter {
            status: Some(SubscriptionStatus::Pending),
            search: None,
            limit: 15,
            offset: 30,
        };
        let (page, total) = store.list(&filter).await.unwrap();
        assert_eq!(total, 37);
        assert_eq!(page.len(), 7);

        let filter = SubscriptionFilter {
            status: None,
            search: Some("OTHER".to_string()),
            limit: 15,
            offset: 0,
        };
        let (page, total) = store.list(&filter).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].name, "Other");
    }

    #[tokio::test]
    async fn stats_sum_revenue_by_status() {
        let store = MemorySubscriptionStore::new();
        let mut active = subscription("Active", SubscriptionStatus::Active);
        active.amount = 71_988;
        let mut expired = subscription("Expired", SubscriptionStatus::Expired);
        expired.amount = 2_999;
        let mut rejected = subscription("Rejected", SubscriptionStatus::Rejected);
        rejected.amount = 10_000;

        for sub in [active, expired, rejected] {
            let status = sub.status;
            store.insert(sub, entry("created", status)).await.unwrap();
        }

        let month_start = Utc::now() - Duration::days(1);
        let stats = store.stats(month_start).await.unwrap();
        assert_eq!(stats.total_subscriptions, 3);
        assert_eq!(stats.total_revenue, 74_987);
        assert_eq!(stats.monthly_revenue, 71_988);
        assert_eq!(stats.by_status[&SubscriptionStatus::Rejected], 1);
        assert_eq!(stats.by_status[&SubscriptionStatus::PaymentFailed], 0);
    }
}
