use chrono::Utc;
use common::error::{AppError, Res};
use db::{
    SubscriptionStore,
    dtos::subscription::HistoryCreateRequest,
    models::subscription::{PaymentStatus, Subscription, SubscriptionStatus},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::sub::{SelectPlanRequest, SubmitPaymentRequest, SubscriptionCreateRequest},
    models::plan::{DEFAULT_CURRENCY, PlanId},
    services::{
        effects,
        lifecycle::{self, Event},
    },
};

pub const CREATED_ACTION: &str = "created";

/// Loads a subscription or fails with `NotFound`.
pub async fn get_subscription(store: &dyn SubscriptionStore, uuid: Uuid) -> Res<Subscription> {
    store
        .find(uuid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Subscription {}", uuid)))
}

/// Applies `event` to the stored subscription and persists the result with one history entry.
///
/// `update` fills in the fields that go with the event; the status itself is set
/// from the transition table before `update` runs.
pub async fn apply_event<F>(
    store: &dyn SubscriptionStore,
    uuid: Uuid,
    event: Event,
    actor: Option<Uuid>,
    notes: Option<String>,
    update: F,
) -> Res<Subscription>
where
    F: FnOnce(&mut Subscription) -> Res<()>,
{
    let current = get_subscription(store, uuid).await?;
    let to = lifecycle::transition(current.status, event).inspect_err(|err| {
        log::warn!("Subscription {} refused: {}", uuid, err);
    })?;

    let mut next = current.clone();
    next.status = to;
    update(&mut next)?;

    let entry = HistoryCreateRequest::between(event.action(), &current, &next, actor, notes);
    let saved = store.save(&next, entry).await?;

    log::info!(
        "Subscription {} {}: {} -> {}",
        uuid,
        event.action(),
        current.status,
        saved.status
    );
    Ok(saved)
}

/// Registers a new subscription in `pending` status, step 1.
pub async fn create_subscription(
    store: &dyn SubscriptionStore,
    req: SubscriptionCreateRequest,
) -> Res<Subscription> {
    req.validate()?;

    let now = Utc::now();
    let subscription = Subscription {
        uuid: Uuid::new_v4(),
        step: 1,
        status: SubscriptionStatus::Pending,
        version: 1,
        entreprise_type: req.entreprise_type,
        name: req.name.trim().to_string(),
        rccm: req.rccm,
        id_nat: req.id_nat,
        num_impot: req.num_impot,
        email: req.email,
        telephone: req.telephone.trim().to_string(),
        address: req.address,
        manager: req.manager,
        plan_id: None,
        plan_name: None,
        amount: 0,
        currency: DEFAULT_CURRENCY.to_string(),
        duration: 0,
        features: Vec::new(),
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
        auto_renew: req.auto_renew,
        created_at: now,
        updated_at: now,
    };

    let entry = HistoryCreateRequest {
        action: CREATED_ACTION.to_string(),
        old_plan: None,
        new_plan: None,
        old_status: None,
        new_status: subscription.status,
        amount: 0,
        user_id: None,
        notes: None,
    };

    let created = store.insert(subscription, entry).await?;
    log::info!("Subscription {} created for {}", created.uuid, created.name);
    Ok(created)
}

/// Chooses a catalog plan and fixes the amount for the requested duration.
pub async fn select_plan(
    store: &dyn SubscriptionStore,
    uuid: Uuid,
    req: SelectPlanRequest,
) -> Res<Subscription> {
    req.validate()?;
    let plan = req.plan_id.parse::<PlanId>()?.plan();

    apply_event(store, uuid, Event::SelectPlan, None, None, |sub| {
        sub.plan_id = Some(plan.id.as_str().to_string());
        sub.plan_name = Some(
            req.plan_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| plan.name.clone()),
        );
        sub.amount = plan.amount_for(req.duration);
        sub.currency = plan.currency.clone();
        sub.duration = req.duration;
        sub.features = plan.features.clone();
        sub.max_users = plan.max_users;
        sub.max_pos = plan.max_pos;
        sub.max_storage_gb = plan.max_storage_gb;
        sub.step = 2;
        Ok(())
    })
    .await
}

/// Records payment details and waits for the gateway confirmation.
pub async fn submit_payment(
    store: &dyn SubscriptionStore,
    uuid: Uuid,
    req: SubmitPaymentRequest,
) -> Res<Subscription> {
    req.validate()?;

    apply_event(store, uuid, Event::SubmitPayment, None, None, |sub| {
        if sub.plan_id.is_none() {
            return Err(AppError::Conflict(
                "A plan must be selected before submitting a payment".to_string(),
            ));
        }
        sub.payment_method = Some(req.payment_method);
        sub.payment_reference = Some(req.payment_reference);
        sub.transaction_id = Some(req.transaction_id);
        sub.mobile_operator = req.mobile_operator;
        sub.payment_status = Some(PaymentStatus::Pending);
        sub.payment_date = Some(Utc::now());
        sub.step = 3;
        Ok(())
    })
    .await
}

/// Marks the payment as completed and starts the subscription period.
pub async fn confirm_payment(store: &dyn SubscriptionStore, uuid: Uuid) -> Res<Subscription> {
    apply_event(store, uuid, Event::ConfirmPayment, None, None, effects::start_period).await
}

/// Marks the submitted payment as declined.
pub async fn fail_payment(
    store: &dyn SubscriptionStore,
    uuid: Uuid,
    reason: Option<String>,
) -> Res<Subscription> {
    apply_event(store, uuid, Event::FailPayment, None, reason, |sub| {
        effects::mark_payment_failed(sub);
        Ok(())
    })
    .await
}

/// Cancels a subscription that has not reached a terminal status.
pub async fn cancel_subscription(
    store: &dyn SubscriptionStore,
    uuid: Uuid,
    actor: Option<Uuid>,
    reason: Option<String>,
) -> Res<Subscription> {
    let notes = reason.clone();
    apply_event(store, uuid, Event::Cancel, actor, notes, |sub| {
        effects::cancel(sub, reason);
        Ok(())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Months;
    use db::MemorySubscriptionStore;

    fn create_request(name: &str) -> SubscriptionCreateRequest {
        SubscriptionCreateRequest {
            entreprise_type: Some("boutique".to_string()),
            name: name.to_string(),
            rccm: None,
            id_nat: None,
            num_impot: None,
            email: None,
            telephone: "+243810000000".to_string(),
            address: None,
            manager: None,
            auto_renew: false,
        }
    }

    fn plan_request(plan_id: &str, duration: i32) -> SelectPlanRequest {
        SelectPlanRequest {
            plan_id: plan_id.to_string(),
            plan_name: None,
            duration,
        }
    }

    fn payment_request() -> SubmitPaymentRequest {
        SubmitPaymentRequest {
            payment_method: "mobile_money".to_string(),
            payment_reference: "REF-001".to_string(),
            transaction_id: "TX-001".to_string(),
            mobile_operator: Some("vodacom".to_string()),
        }
    }

    #[tokio::test]
    async fn create_starts_pending_at_step_one_with_fresh_uuid() {
        let store = MemorySubscriptionStore::new();
        let a = create_subscription(&store, create_request("Boutique X"))
            .await
            .unwrap();
        let b = create_subscription(&store, create_request("Boutique Y"))
            .await
            .unwrap();

        assert_eq!(a.status, SubscriptionStatus::Pending);
        assert_eq!(a.step, 1);
        assert!(!a.uuid.is_nil());
        assert_ne!(a.uuid, b.uuid);

        let history = store.history(a.uuid).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, CREATED_ACTION);
    }

    #[tokio::test]
    async fn create_rejects_missing_name_and_bad_email() {
        let store = MemorySubscriptionStore::new();

        let err = create_subscription(&store, create_request(""))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut req = create_request("Boutique X");
        req.email = Some("not-an-email".to_string());
        let err = create_subscription(&store, req).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn whitespace_only_name_or_telephone_is_refused() {
        let store = MemorySubscriptionStore::new();

        let err = create_subscription(&store, create_request("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut req = create_request("Boutique X");
        req.telephone = "    ".to_string();
        let err = create_subscription(&store, req).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let (_, total) = store
            .list(&db::dtos::subscription::SubscriptionFilter {
                status: None,
                search: None,
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn select_plan_fixes_amount_and_keeps_status() {
        let store = MemorySubscriptionStore::new();
        let sub = create_subscription(&store, create_request("Boutique X"))
            .await
            .unwrap();

        let sub = select_plan(&store, sub.uuid, plan_request("enterprise", 3))
            .await
            .unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Pending);
        assert_eq!(sub.step, 2);
        assert_eq!(sub.amount, 9_999 * 3);
        assert_eq!(sub.plan_name.as_deref(), Some("Enterprise"));
        assert_eq!(sub.max_pos, 10);
    }

    #[tokio::test]
    async fn unknown_plan_is_refused_without_touching_the_row() {
        let store = MemorySubscriptionStore::new();
        let sub = create_subscription(&store, create_request("Boutique X"))
            .await
            .unwrap();

        let err = select_plan(&store, sub.uuid, plan_request("gold", 12))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let stored = get_subscription(&store, sub.uuid).await.unwrap();
        assert_eq!(stored.version, sub.version);
        assert_eq!(stored.amount, 0);
    }

    #[tokio::test]
    async fn select_plan_on_unknown_uuid_is_not_found() {
        let store = MemorySubscriptionStore::new();
        let err = select_plan(&store, Uuid::new_v4(), plan_request("basic", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn payment_requires_a_selected_plan() {
        let store = MemorySubscriptionStore::new();
        let sub = create_subscription(&store, create_request("Boutique X"))
            .await
            .unwrap();

        let err = submit_payment(&store, sub.uuid, payment_request())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn confirm_payment_sets_period_from_duration() {
        let store = MemorySubscriptionStore::new();
        let sub = create_subscription(&store, create_request("Boutique X"))
            .await
            .unwrap();
        select_plan(&store, sub.uuid, plan_request("professional", 12))
            .await
            .unwrap();
        let paid = submit_payment(&store, sub.uuid, payment_request())
            .await
            .unwrap();
        assert_eq!(paid.status, SubscriptionStatus::PaymentPending);
        assert_eq!(paid.step, 3);
        assert_eq!(paid.payment_status, Some(PaymentStatus::Pending));

        let confirmed = confirm_payment(&store, sub.uuid).await.unwrap();
        assert_eq!(confirmed.status, SubscriptionStatus::ValidationPending);
        assert_eq!(confirmed.payment_status, Some(PaymentStatus::Completed));

        let start = confirmed.start_date.unwrap();
        assert_eq!(
            confirmed.end_date,
            start.checked_add_months(Months::new(12))
        );
        assert_eq!(confirmed.expiry_date, confirmed.end_date);
    }

    #[tokio::test]
    async fn confirm_payment_twice_is_a_conflict() {
        let store = MemorySubscriptionStore::new();
        let sub = create_subscription(&store, create_request("Boutique X"))
            .await
            .unwrap();
        select_plan(&store, sub.uuid, plan_request("basic", 1))
            .await
            .unwrap();
        submit_payment(&store, sub.uuid, payment_request())
            .await
            .unwrap();
        confirm_payment(&store, sub.uuid).await.unwrap();

        let err = confirm_payment(&store, sub.uuid).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn failed_payment_can_be_resubmitted() {
        let store = MemorySubscriptionStore::new();
        let sub = create_subscription(&store, create_request("Boutique X"))
            .await
            .unwrap();
        select_plan(&store, sub.uuid, plan_request("basic", 6))
            .await
            .unwrap();
        submit_payment(&store, sub.uuid, payment_request())
            .await
            .unwrap();

        let failed = fail_payment(&store, sub.uuid, Some("card declined".to_string()))
            .await
            .unwrap();
        assert_eq!(failed.status, SubscriptionStatus::PaymentFailed);
        assert_eq!(failed.payment_status, Some(PaymentStatus::Failed));

        let retried = submit_payment(&store, sub.uuid, payment_request())
            .await
            .unwrap();
        assert_eq!(retried.status, SubscriptionStatus::PaymentPending);

        let actions: Vec<String> = store
            .history(sub.uuid)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                "payment_submitted",
                "payment_failed",
                "payment_submitted",
                "plan_selected",
                "created"
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_subscription_is_terminal() {
        let store = MemorySubscriptionStore::new();
        let sub = create_subscription(&store, create_request("Boutique X"))
            .await
            .unwrap();

        let cancelled = cancel_subscription(&store, sub.uuid, None, Some("closing shop".into()))
            .await
            .unwrap();
        assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
        assert_eq!(cancelled.notes.as_deref(), Some("closing shop"));

        let err = select_plan(&store, sub.uuid, plan_request("basic", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
