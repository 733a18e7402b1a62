use api_subs::services::{
    effects,
    lifecycle::{self, Event},
    sub::{apply_event, get_subscription},
};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use common::error::{AppError, Res};
use db::{
    SubscriptionStore,
    dtos::subscription::{HistoryCreateRequest, SubscriptionFilter, SubscriptionStats},
    models::subscription::Subscription,
};
use uuid::Uuid;
use validator::Validate;

use crate::dtos::admin::{
    AdminReasonRequest, AdminUpdateRequest, ListQuery, Pagination, SubscriptionDetailResponse,
    SubscriptionListResponse,
};

pub const UPDATED_ACTION: &str = "updated";

pub async fn list_subscriptions(
    store: &dyn SubscriptionStore,
    query: ListQuery,
    default_limit: i64,
    max_limit: i64,
) -> Res<SubscriptionListResponse> {
    let (page, limit) = query.page_and_limit(default_limit, max_limit);
    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| AppError::BadRequest(format!("page {} is out of range", page)))?;
    let filter = SubscriptionFilter {
        status: query.status,
        search: query
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        limit,
        offset,
    };

    let (subscriptions, total) = store.list(&filter).await?;
    Ok(SubscriptionListResponse {
        subscriptions,
        pagination: Pagination::new(page, limit, total),
    })
}

pub async fn get_subscription_with_history(
    store: &dyn SubscriptionStore,
    uuid: Uuid,
) -> Res<SubscriptionDetailResponse> {
    let subscription = get_subscription(store, uuid).await?;
    let history = store.history(uuid).await?;
    Ok(SubscriptionDetailResponse {
        allowed_events: lifecycle::allowed_events(subscription.status),
        subscription,
        history,
    })
}

/// Activates a validated subscription, or reinstates a suspended one.
pub async fn approve(
    store: &dyn SubscriptionStore,
    uuid: Uuid,
    actor: Uuid,
    admin_notes: Option<String>,
) -> Res<Subscription> {
    let admin_notes = admin_notes.filter(|n| !n.trim().is_empty());
    apply_event(store, uuid, Event::Approve, Some(actor), admin_notes.clone(), |sub| {
        effects::approve(sub, actor, admin_notes);
        Ok(())
    })
    .await
}

pub async fn reject(
    store: &dyn SubscriptionStore,
    uuid: Uuid,
    actor: Uuid,
    req: AdminReasonRequest,
) -> Res<Subscription> {
    req.validate()?;
    let reason = req.reason.trim().to_string();
    apply_event(store, uuid, Event::Reject, Some(actor), Some(reason.clone()), |sub| {
        effects::reject(sub, actor, reason);
        Ok(())
    })
    .await
}

pub async fn suspend(
    store: &dyn SubscriptionStore,
    uuid: Uuid,
    actor: Uuid,
    req: AdminReasonRequest,
) -> Res<Subscription> {
    req.validate()?;
    let reason = req.reason.trim().to_string();
    apply_event(store, uuid, Event::Suspend, Some(actor), Some(reason.clone()), |sub| {
        effects::suspend(sub, reason);
        Ok(())
    })
    .await
}

/// Overwrites the supplied fields. A status change must follow an edge of the
/// transition table and carries the same field changes as the dedicated endpoint.
/// Rejecting or suspending this way takes the reason from `notes`.
pub async fn update(
    store: &dyn SubscriptionStore,
    uuid: Uuid,
    actor: Uuid,
    req: AdminUpdateRequest,
) -> Res<Subscription> {
    req.validate()?;
    let current = get_subscription(store, uuid).await?;
    let mut next = current.clone();

    if let Some(name) = req.name {
        next.name = name.trim().to_string();
    }
    if let Some(email) = req.email {
        next.email = Some(email);
    }
    if let Some(telephone) = req.telephone {
        next.telephone = telephone.trim().to_string();
    }
    let notes = req.notes.filter(|n| !n.trim().is_empty());
    if let Some(notes) = &notes {
        next.notes = Some(notes.clone());
    }
    if let Some(auto_renew) = req.auto_renew {
        next.auto_renew = auto_renew;
        next.next_billing_date = if auto_renew { next.end_date } else { None };
    }

    if let Some(status) = req.status.filter(|s| *s != current.status) {
        let event = lifecycle::event_between(current.status, status).ok_or_else(|| {
            log::warn!(
                "Subscription {} refused: no transition from {} to {}",
                uuid,
                current.status,
                status
            );
            AppError::Conflict(format!(
                "cannot change a subscription from {} to {}",
                current.status, status
            ))
        })?;
        next.status = status;
        apply_status_effects(&mut next, event, actor, notes.clone())?;
    }

    let entry = HistoryCreateRequest::between(UPDATED_ACTION, &current, &next, Some(actor), notes);
    let saved = store.save(&next, entry).await?;
    log::info!(
        "Subscription {} updated by {}: {} -> {}",
        uuid,
        actor,
        current.status,
        saved.status
    );
    Ok(saved)
}

fn apply_status_effects(
    sub: &mut Subscription,
    event: Event,
    actor: Uuid,
    notes: Option<String>,
) -> Res<()> {
    let reason_for = |verb: &str| {
        notes
            .clone()
            .ok_or_else(|| AppError::BadRequest(format!("notes are required to {} a subscription", verb)))
    };

    match event {
        Event::Approve => effects::approve(sub, actor, None),
        Event::Reject => effects::reject(sub, actor, reason_for("reject")?),
        Event::Suspend => effects::suspend(sub, reason_for("suspend")?),
        Event::Cancel => effects::cancel(sub, None),
        Event::Expire => effects::expire(sub),
        Event::ConfirmPayment => effects::start_period(sub)?,
        Event::FailPayment => effects::mark_payment_failed(sub),
        Event::SelectPlan | Event::SubmitPayment => {
            return Err(AppError::Conflict(format!(
                "{} needs its own endpoint",
                event.action()
            )));
        }
    }
    Ok(())
}

/// First instant of the month containing `now`, in UTC.
pub fn month_start(now: DateTime<Utc>) -> Res<DateTime<Utc>> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .ok_or_else(|| AppError::Internal("Cannot compute start of month".to_string()))
}

pub async fn stats(store: &dyn SubscriptionStore) -> Res<SubscriptionStats> {
    store.stats(month_start(Utc::now())?).await
}

/// Moves every active subscription past its end date to `expired`.
/// Rows changed concurrently are skipped and picked up by the next sweep.
pub async fn expire_due(store: &dyn SubscriptionStore, actor: Uuid) -> Res<usize> {
    let due = store.due_for_expiry(Utc::now()).await?;
    let mut expired = 0;

    for subscription in due {
        let result = apply_event(store, subscription.uuid, Event::Expire, Some(actor), None, |sub| {
            effects::expire(sub);
            Ok(())
        })
        .await;

        match result {
            Ok(_) => expired += 1,
            Err(AppError::Conflict(message)) => {
                log::warn!("Skipping expiry of {}: {}", subscription.uuid, message)
            }
            Err(err) => return Err(err),
        }
    }

    log::info!("Expiry sweep moved {} subscription(s) to expired", expired);
    Ok(expired)
}
