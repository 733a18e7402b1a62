//! Field changes that go with each lifecycle event, shared by the dedicated
//! endpoints and the admin update.

use chrono::{Months, Utc};
use common::error::{AppError, Res};
use db::models::subscription::{PaymentStatus, Subscription};
use uuid::Uuid;

/// Payment confirmed: the period starts now and runs for `duration` months.
pub fn start_period(sub: &mut Subscription) -> Res<()> {
    let start = Utc::now();
    let months = u32::try_from(sub.duration)
        .map_err(|_| AppError::Internal(format!("Invalid duration {}", sub.duration)))?;
    let end = start
        .checked_add_months(Months::new(months))
        .ok_or_else(|| AppError::Internal("Subscription end date overflow".to_string()))?;

    sub.payment_status = Some(PaymentStatus::Completed);
    sub.start_date = Some(start);
    sub.end_date = Some(end);
    sub.expiry_date = Some(end);
    sub.next_billing_date = sub.auto_renew.then_some(end);
    Ok(())
}

pub fn mark_payment_failed(sub: &mut Subscription) {
    sub.payment_status = Some(PaymentStatus::Failed);
}

pub fn cancel(sub: &mut Subscription, reason: Option<String>) {
    if reason.is_some() {
        sub.notes = reason;
    }
    sub.auto_renew = false;
    sub.next_billing_date = None;
}

pub fn expire(sub: &mut Subscription) {
    sub.next_billing_date = None;
}

pub fn approve(sub: &mut Subscription, actor: Uuid, notes: Option<String>) {
    sub.validated_by = Some(actor);
    sub.validation_date = Some(Utc::now());
    if notes.is_some() {
        sub.notes = notes;
    }
}

pub fn reject(sub: &mut Subscription, actor: Uuid, reason: String) {
    sub.validated_by = Some(actor);
    sub.validation_date = Some(Utc::now());
    sub.rejected_reason = Some(reason);
}

pub fn suspend(sub: &mut Subscription, reason: String) {
    sub.notes = Some(reason);
}
