use std::sync::Arc;

use actix_web::{Responder, get, post, put, web};
use common::{
    env_config::Config,
    error::Res,
    http::{Success, optional_json},
    jwt::JwtClaims,
};
use db::Store;
use uuid::Uuid;

use crate::{
    dtos::admin::{
        AdminReasonRequest, AdminUpdateRequest, ApproveRequest, ExpireResponse, ListQuery,
    },
    services,
};

/// Paginated listing, newest first.
///
/// # Input
/// - `page`: 1-based page number (default 1)
/// - `limit`: page size (default `DEFAULT_PAGE_SIZE`, capped at `MAX_PAGE_SIZE`)
/// - `status`: optional status filter, e.g. `validation_pending`
/// - `search`: optional case-insensitive match on name or email
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/admin/subscriptions?status=validation_pending&page=2', {
///   headers: { 'Authorization': `Bearer ${adminToken}` }
/// });
/// const { data } = await response.json();
/// // data.pagination => { current_page: 2, per_page: 10, total: 37, total_pages: 4 }
/// ```
#[get("")]
pub async fn get_subscriptions(
    store: web::Data<Store>,
    config: web::Data<Arc<Config>>,
    query: web::Query<ListQuery>,
) -> Res<impl Responder> {
    let res = services::admin::list_subscriptions(
        &***store,
        query.into_inner(),
        config.default_page_size,
        config.max_page_size,
    )
    .await?;
    Success::ok("Subscriptions", res)
}

#[get("/stats")]
pub async fn get_stats(store: web::Data<Store>) -> Res<impl Responder> {
    let stats = services::admin::stats(&***store).await?;
    Success::ok("Subscription statistics", stats)
}

/// Expires every active subscription whose end date has passed.
#[post("/expire")]
pub async fn post_expire(
    store: web::Data<Store>,
    claims: web::ReqData<JwtClaims>,
) -> Res<impl Responder> {
    let expired = services::admin::expire_due(&***store, claims.user_id).await?;
    Success::ok("Expiry sweep complete", ExpireResponse { expired })
}

/// Subscription with its full history, newest entry first.
#[get("/{uuid}")]
pub async fn get_subscription(
    store: web::Data<Store>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let res = services::admin::get_subscription_with_history(&***store, path.into_inner()).await?;
    Success::ok("Subscription found", res)
}

/// Approves a subscription awaiting validation, or reinstates a suspended one.
///
/// # Input
/// - `admin_notes`: optional, stored on the subscription and in the history entry.
///   The body may be omitted entirely.
///
/// # Output
/// - Success: the subscription in `active` status
/// - Error: 400 for a malformed body, 409 when the subscription is in any other status (including `active`)
#[put("/{uuid}/approve")]
pub async fn put_approve(
    store: web::Data<Store>,
    claims: web::ReqData<JwtClaims>,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> Res<impl Responder> {
    let notes = optional_json::<ApproveRequest>(&body)?.admin_notes;
    let subscription =
        services::admin::approve(&***store, path.into_inner(), claims.user_id, notes).await?;
    Success::ok("Subscription approved", subscription)
}

#[put("/{uuid}/reject")]
pub async fn put_reject(
    store: web::Data<Store>,
    claims: web::ReqData<JwtClaims>,
    path: web::Path<Uuid>,
    req: web::Json<AdminReasonRequest>,
) -> Res<impl Responder> {
    let subscription =
        services::admin::reject(&***store, path.into_inner(), claims.user_id, req.into_inner())
            .await?;
    Success::ok("Subscription rejected", subscription)
}

#[put("/{uuid}/suspend")]
pub async fn put_suspend(
    store: web::Data<Store>,
    claims: web::ReqData<JwtClaims>,
    path: web::Path<Uuid>,
    req: web::Json<AdminReasonRequest>,
) -> Res<impl Responder> {
    let subscription =
        services::admin::suspend(&***store, path.into_inner(), claims.user_id, req.into_inner())
            .await?;
    Success::ok("Subscription suspended", subscription)
}

/// Partial update of contact fields, `notes`, `auto_renew` and `status`.
/// A status change that has no edge in the transition table is refused with 409.
#[put("/{uuid}")]
pub async fn put_subscription(
    store: web::Data<Store>,
    claims: web::ReqData<JwtClaims>,
    path: web::Path<Uuid>,
    req: web::Json<AdminUpdateRequest>,
) -> Res<impl Responder> {
    let subscription =
        services::admin::update(&***store, path.into_inner(), claims.user_id, req.into_inner())
            .await?;
    Success::ok("Subscription updated", subscription)
}
