use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    dtos::subscription::{HistoryCreateRequest, SubscriptionFilter, SubscriptionStats},
    models::{
        history::SubscriptionHistory,
        subscription::{Subscription, SubscriptionStatus},
    },
    store::SubscriptionStore,
};

pub async fn get_subscription_by_uuid<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    uuid: Uuid,
) -> Res<Option<Subscription>> {
    sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE uuid = $1")
        .bind(uuid)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn insert_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: &Subscription,
) -> Res<Subscription> {
    sqlx::query_as::<_, Subscription>(
        r#"
        INSERT INTO subscriptions (
            uuid, step, status, version,
            entreprise_type, name, rccm, id_nat, num_impot, email, telephone, address, manager,
            plan_id, plan_name, amount, currency, duration, features, max_users, max_pos, max_storage_gb,
            auto_renew, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25)
        RETURNING *
        "#,
    )
    .bind(data.uuid)
    .bind(data.step)
    .bind(data.status)
    .bind(data.version)
    .bind(&data.entreprise_type)
    .bind(&data.name)
    .bind(&data.rccm)
    .bind(&data.id_nat)
    .bind(&data.num_impot)
    .bind(&data.email)
    .bind(&data.telephone)
    .bind(&data.address)
    .bind(&data.manager)
    .bind(&data.plan_id)
    .bind(&data.plan_name)
    .bind(data.amount)
    .bind(&data.currency)
    .bind(data.duration)
    .bind(&data.features)
    .bind(data.max_users)
    .bind(data.max_pos)
    .bind(data.max_storage_gb)
    .bind(data.auto_renew)
    .bind(data.created_at)
    .bind(data.updated_at)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

/// Overwrites every mutable column when the stored version matches `data.version`.
/// Returns `None` when the row is missing or was changed by someone else.
pub async fn update_subscription_versioned<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: &Subscription,
) -> Res<Option<Subscription>> {
    sqlx::query_as::<_, Subscription>(
        r#"
        UPDATE subscriptions SET
            step = $3, status = $4,
            entreprise_type = $5, name = $6, rccm = $7, id_nat = $8, num_impot = $9,
            email = $10, telephone = $11, address = $12, manager = $13,
            plan_id = $14, plan_name = $15, amount = $16, currency = $17, duration = $18,
            features = $19, max_users = $20, max_pos = $21, max_storage_gb = $22,
            payment_method = $23, payment_reference = $24, payment_status = $25,
            transaction_id = $26, payment_date = $27, mobile_operator = $28,
            validated_by = $29, validation_date = $30, notes = $31, rejected_reason = $32,
            start_date = $33, end_date = $34, expiry_date = $35, next_billing_date = $36,
            auto_renew = $37,
            version = version + 1,
            updated_at = NOW()
        WHERE uuid = $1 AND version = $2
        RETURNING *
        "#,
    )
    .bind(data.uuid)
    .bind(data.version)
    .bind(data.step)
    .bind(data.status)
    .bind(&data.entreprise_type)
    .bind(&data.name)
    .bind(&data.rccm)
    .bind(&data.id_nat)
    .bind(&data.num_impot)
    .bind(&data.email)
    .bind(&data.telephone)
    .bind(&data.address)
    .bind(&data.manager)
    .bind(&data.plan_id)
    .bind(&data.plan_name)
    .bind(data.amount)
    .bind(&data.currency)
    .bind(data.duration)
    .bind(&data.features)
    .bind(data.max_users)
    .bind(data.max_pos)
    .bind(data.max_storage_gb)
    .bind(&data.payment_method)
    .bind(&data.payment_reference)
    .bind(data.payment_status)
    .bind(&data.transaction_id)
    .bind(data.payment_date)
    .bind(&data.mobile_operator)
    .bind(data.validated_by)
    .bind(data.validation_date)
    .bind(&data.notes)
    .bind(&data.rejected_reason)
    .bind(data.start_date)
    .bind(data.end_date)
    .bind(data.expiry_date)
    .bind(data.next_billing_date)
    .bind(data.auto_renew)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn insert_history<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    entry: &SubscriptionHistory,
) -> Res<()> {
    sqlx::query(
        "INSERT INTO subscription_history (uuid, subscription_uuid, action, old_plan, new_plan, old_status, new_status, amount, action_date, user_id, notes)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(entry.uuid)
    .bind(entry.subscription_uuid)
    .bind(&entry.action)
    .bind(&entry.old_plan)
    .bind(&entry.new_plan)
    .bind(entry.old_status)
    .bind(entry.new_status)
    .bind(entry.amount)
    .bind(entry.action_date)
    .bind(entry.user_id)
    .bind(&entry.notes)
    .execute(executor)
    .await
    .map_err(AppError::from)?;

    Ok(())
}

pub async fn get_history_by_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    subscription_uuid: Uuid,
) -> Res<Vec<SubscriptionHistory>> {
    sqlx::query_as::<_, SubscriptionHistory>(
        "SELECT * FROM subscription_history WHERE subscription_uuid = $1 ORDER BY action_date DESC",
    )
    .bind(subscription_uuid)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

fn push_filter_conditions(qb: &mut QueryBuilder<'_, Postgres>, filter: &SubscriptionFilter) {
    let mut conditions_added = false;

    // Helper to add WHERE or AND
    let mut add_condition_separator = |qb: &mut QueryBuilder<Postgres>| {
        if !conditions_added {
            qb.push(" WHERE ");
            conditions_added = true;
        } else {
            qb.push(" AND ");
        }
    };

    if let Some(status) = filter.status {
        add_condition_separator(qb);
        qb.push("status = ").push_bind(status);
    }

    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        add_condition_separator(qb);
        qb.push("(name ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR email ILIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

/// Substring pattern for `ILIKE ... ESCAPE '\'` that matches `search` literally.
fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub async fn list_subscriptions<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    filter: &SubscriptionFilter,
) -> Res<Vec<Subscription>> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM subscriptions");
    push_filter_conditions(&mut qb, filter);
    qb.push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);

    qb.build_query_as::<Subscription>()
        .fetch_all(executor)
        .await
        .map_err(AppError::from)
}

pub async fn count_subscriptions<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    filter: &SubscriptionFilter,
) -> Res<i64> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM subscriptions");
    push_filter_conditions(&mut qb, filter);

    qb.build_query_scalar::<i64>()
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}

pub async fn count_by_status<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
) -> Res<BTreeMap<SubscriptionStatus, i64>> {
    let rows: Vec<(SubscriptionStatus, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM subscriptions GROUP BY status")
            .fetch_all(executor)
            .await?;

    Ok(rows.into_iter().collect())
}

pub async fn sum_amount<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    statuses: &[SubscriptionStatus],
    created_since: Option<DateTime<Utc>>,
) -> Res<i64> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM subscriptions WHERE status IN (",
    );
    let mut separated = qb.separated(", ");
    for status in statuses {
        separated.push_bind(*status);
    }
    separated.push_unseparated(")");

    if let Some(since) = created_since {
        qb.push(" AND created_at >= ").push_bind(since);
    }

    qb.build_query_scalar::<i64>()
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_due_for_expiry<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    now: DateTime<Utc>,
) -> Res<Vec<Subscription>> {
    sqlx::query_as::<_, Subscription>(
        "SELECT * FROM subscriptions WHERE status = $1 AND end_date <= $2 ORDER BY end_date",
    )
    .bind(SubscriptionStatus::Active)
    .bind(now)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Postgres-backed [`SubscriptionStore`].
#[derive(Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn insert(
        &self,
        subscription: Subscription,
        entry: HistoryCreateRequest,
    ) -> Res<Subscription> {
        let mut tx = self.pool.begin().await?;

        let created = insert_subscription(&mut *tx, &subscription).await?;
        let history = entry.into_history(created.uuid, Utc::now());
        insert_history(&mut *tx, &history).await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn find(&self, uuid: Uuid) -> Res<Option<Subscription>> {
        get_subscription_by_uuid(&self.pool, uuid).await
    }

    async fn save(
        &self,
        subscription: &Subscription,
        entry: HistoryCreateRequest,
    ) -> Res<Subscription> {
        let mut tx = self.pool.begin().await?;

        // dropping `tx` on an early return rolls the update back
        let updated = update_subscription_versioned(&mut *tx, subscription)
            .await?
            .ok_or_else(|| {
                AppError::Conflict(format!(
                    "Subscription {} was modified concurrently",
                    subscription.uuid
                ))
            })?;

        let history = entry.into_history(updated.uuid, Utc::now());
        insert_history(&mut *tx, &history).await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn history(&self, uuid: Uuid) -> Res<Vec<SubscriptionHistory>> {
        get_history_by_subscription(&self.pool, uuid).await
    }

    async fn list(&self, filter: &SubscriptionFilter) -> Res<(Vec<Subscription>, i64)> {
        let total = count_subscriptions(&self.pool, filter).await?;
        let page = list_subscriptions(&self.pool, filter).await?;
        Ok((page, total))
    }

    async fn stats(&self, month_start: DateTime<Utc>) -> Res<SubscriptionStats> {
        let counts = count_by_status(&self.pool).await?;
        let total_revenue = sum_amount(
            &self.pool,
            &[SubscriptionStatus::Active, SubscriptionStatus::Expired],
            None,
        )
        .await?;
        let monthly_revenue =
            sum_amount(&self.pool, &[SubscriptionStatus::Active], Some(month_start)).await?;

        Ok(SubscriptionStats::from_counts(
            counts,
            total_revenue,
            monthly_revenue,
        ))
    }

    async fn due_for_expiry(&self, now: DateTime<Utc>) -> Res<Vec<Subscription>> {
        get_due_for_expiry(&self.pool, now).await
    }
}
