//! Subscription status state machine.
//!
//! Every status change goes through [`transition`]; a (status, event) pair missing
//! from the table below is refused.
//!
//! | Event          | From                                                        | To                 |
//! |----------------|-------------------------------------------------------------|--------------------|
//! | SelectPlan     | Pending                                                     | Pending            |
//! | SelectPlan     | PaymentFailed                                               | Pending            |
//! | SubmitPayment  | Pending, PaymentFailed                                      | PaymentPending     |
//! | ConfirmPayment | PaymentPending                                              | ValidationPending  |
//! | FailPayment    | PaymentPending                                              | PaymentFailed      |
//! | Approve        | ValidationPending, Suspended                                | Active             |
//! | Reject         | ValidationPending                                           | Rejected           |
//! | Suspend        | Pending, PaymentPending, PaymentFailed, ValidationPending, Active | Suspended    |
//! | Cancel         | any non-terminal status                                     | Cancelled          |
//! | Expire         | Active                                                      | Expired            |
//!
//! Rejected, Expired and Cancelled are terminal.

use std::fmt;

use common::error::AppError;
use db::models::subscription::SubscriptionStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    SelectPlan,
    SubmitPayment,
    ConfirmPayment,
    FailPayment,
    Approve,
    Reject,
    Suspend,
    Cancel,
    Expire,
}

impl Event {
    pub const ALL: [Event; 9] = [
        Event::SelectPlan,
        Event::SubmitPayment,
        Event::ConfirmPayment,
        Event::FailPayment,
        Event::Approve,
        Event::Reject,
        Event::Suspend,
        Event::Cancel,
        Event::Expire,
    ];

    /// Label written to the history `action` column.
    pub fn action(&self) -> &'static str {
        match self {
            Event::SelectPlan => "plan_selected",
            Event::SubmitPayment => "payment_submitted",
            Event::ConfirmPayment => "payment_confirmed",
            Event::FailPayment => "payment_failed",
            Event::Approve => "approved",
            Event::Reject => "rejected",
            Event::Suspend => "suspended",
            Event::Cancel => "cancelled",
            Event::Expire => "expired",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Event::SelectPlan => "select plan",
            Event::SubmitPayment => "submit payment",
            Event::ConfirmPayment => "confirm payment",
            Event::FailPayment => "fail payment",
            Event::Approve => "approve",
            Event::Reject => "reject",
            Event::Suspend => "suspend",
            Event::Cancel => "cancel",
            Event::Expire => "expire",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot {event} a subscription in status {from}")]
pub struct TransitionError {
    pub from: SubscriptionStatus,
    pub event: Event,
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::Conflict(err.to_string())
    }
}

pub fn is_terminal(status: SubscriptionStatus) -> bool {
    matches!(
        status,
        SubscriptionStatus::Rejected | SubscriptionStatus::Expired | SubscriptionStatus::Cancelled
    )
}

/// Status reached by applying `event` in status `from`.
pub fn transition(
    from: SubscriptionStatus,
    event: Event,
) -> Result<SubscriptionStatus, TransitionError> {
    use SubscriptionStatus::*;

    let to = match (event, from) {
        (Event::SelectPlan, Pending | PaymentFailed) => Some(Pending),
        (Event::SubmitPayment, Pending | PaymentFailed) => Some(PaymentPending),
        (Event::ConfirmPayment, PaymentPending) => Some(ValidationPending),
        (Event::FailPayment, PaymentPending) => Some(PaymentFailed),
        (Event::Approve, ValidationPending | Suspended) => Some(Active),
        (Event::Reject, ValidationPending) => Some(Rejected),
        (Event::Suspend, Pending | PaymentPending | PaymentFailed | ValidationPending | Active) => {
            Some(Suspended)
        }
        (Event::Cancel, status) if !is_terminal(status) => Some(Cancelled),
        (Event::Expire, Active) => Some(Expired),
        _ => None,
    };

    to.ok_or(TransitionError { from, event })
}

/// Events accepted in `status`, in table order. Returned with the admin detail view.
pub fn allowed_events(status: SubscriptionStatus) -> Vec<Event> {
    Event::ALL
        .into_iter()
        .filter(|event| transition(status, *event).is_ok())
        .collect()
}

/// Event that moves `from` to `to`, if the table has one.
pub fn event_between(from: SubscriptionStatus, to: SubscriptionStatus) -> Option<Event> {
    Event::ALL
        .into_iter()
        .find(|event| transition(from, *event) == Ok(to))
}
