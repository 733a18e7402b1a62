use actix_web::{Responder, get, post, put, web};
use common::{
    error::Res,
    http::{Success, optional_json},
};
use db::Store;
use uuid::Uuid;

use crate::{
    dtos::sub::{
        ReasonRequest, SelectPlanRequest, SubmitPaymentRequest, SubscriptionCreateRequest,
        SubscriptionPlansResponse,
    },
    models::plan::default_plans,
    services,
};

/// Lists the static plan catalog.
///
/// # Output
/// - Success: `data.plans` with the three tiers, prices in cents per month
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/subscriptions/plans');
/// const { data } = await response.json();
/// // data.plans[1] => { id: "professional", price: 5999, popular: true, ... }
/// ```
#[get("/plans")]
pub async fn get_plans() -> Res<impl Responder> {
    Success::ok(
        "Subscription plans",
        SubscriptionPlansResponse {
            plans: default_plans(),
        },
    )
}

/// Starts a signup. The subscription is created in `pending` status at step 1.
///
/// # Input
/// - `req`: company snapshot; `name` and `telephone` are required, `email` must be valid
///
/// # Output
/// - Success: 201 with the created subscription
/// - Error: 400 when validation fails
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/subscriptions', {
///   method: 'POST',
///   headers: { 'Content-Type': 'application/json' },
///   body: JSON.stringify({ name: 'Boutique X', telephone: '+243810000000' })
/// });
/// const { data } = await response.json();
/// localStorage.setItem('subscriptionId', data.uuid);
/// ```
#[post("")]
pub async fn post_subscription(
    store: web::Data<Store>,
    req: web::Json<SubscriptionCreateRequest>,
) -> Res<impl Responder> {
    let subscription = services::sub::create_subscription(&***store, req.into_inner()).await?;
    Success::created("Subscription created", subscription)
}

#[get("/{uuid}")]
pub async fn get_subscription(
    store: web::Data<Store>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let subscription = services::sub::get_subscription(&***store, path.into_inner()).await?;
    Success::ok("Subscription found", subscription)
}

/// Step 2: chooses a plan and a duration in months.
///
/// # Input
/// - `plan_id`: one of `basic`, `professional`, `enterprise`
/// - `duration`: months, 1 to 60
///
/// # Output
/// - Success: the subscription with `amount = price * duration`
/// - Error: 400 for an unknown plan, 404 for an unknown subscription,
///   409 when the subscription is past the payment stage
#[put("/{uuid}/plan")]
pub async fn put_plan(
    store: web::Data<Store>,
    path: web::Path<Uuid>,
    req: web::Json<SelectPlanRequest>,
) -> Res<impl Responder> {
    let subscription =
        services::sub::select_plan(&***store, path.into_inner(), req.into_inner()).await?;
    Success::ok("Plan selected", subscription)
}

/// Step 3: records the payment details. The subscription waits in
/// `payment_pending` until the gateway confirms or declines.
#[put("/{uuid}/payment")]
pub async fn put_payment(
    store: web::Data<Store>,
    path: web::Path<Uuid>,
    req: web::Json<SubmitPaymentRequest>,
) -> Res<impl Responder> {
    let subscription =
        services::sub::submit_payment(&***store, path.into_inner(), req.into_inner()).await?;
    Success::ok("Payment submitted", subscription)
}

#[put("/{uuid}/payment/confirm")]
pub async fn put_payment_confirm(
    store: web::Data<Store>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let subscription = services::sub::confirm_payment(&***store, path.into_inner()).await?;
    Success::ok("Payment confirmed, awaiting validation", subscription)
}

/// Body is optional: `{ "reason": "card declined" }`.
#[put("/{uuid}/payment/fail")]
pub async fn put_payment_fail(
    store: web::Data<Store>,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> Res<impl Responder> {
    let reason = optional_json::<ReasonRequest>(&body)?.reason;
    let subscription = services::sub::fail_payment(&***store, path.into_inner(), reason).await?;
    Success::ok("Payment failed", subscription)
}

#[put("/{uuid}/cancel")]
pub async fn put_cancel(
    store: web::Data<Store>,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> Res<impl Responder> {
    let reason = optional_json::<ReasonRequest>(&body)?.reason;
    let subscription =
        services::sub::cancel_subscription(&***store, path.into_inner(), None, reason).await?;
    Success::ok("Subscription cancelled", subscription)
}
