use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    PaymentPending,
    ValidationPending,
    Active,
    Rejected,
    Suspended,
    Expired,
    Cancelled,
    PaymentFailed,
}

impl SubscriptionStatus {
    pub const ALL: [SubscriptionStatus; 9] = [
        SubscriptionStatus::Pending,
        SubscriptionStatus::PaymentPending,
        SubscriptionStatus::ValidationPending,
        SubscriptionStatus::Active,
        SubscriptionStatus::Rejected,
        SubscriptionStatus::Suspended,
        SubscriptionStatus::Expired,
        SubscriptionStatus::Cancelled,
        SubscriptionStatus::PaymentFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::PaymentPending => "payment_pending",
            SubscriptionStatus::ValidationPending => "validation_pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Rejected => "rejected",
            SubscriptionStatus::Suspended => "suspended",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::PaymentFailed => "payment_failed",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "payment_state", rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

/// A tenant's subscription contract, including the company snapshot taken at signup.
///
/// `amount` is stored in minor currency units (cents).
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub uuid: Uuid,
    pub step: i32,
    pub status: SubscriptionStatus,
    pub version: i32,

    pub entreprise_type: Option<String>,
    pub name: String,
    pub rccm: Option<String>,
    pub id_nat: Option<String>,
    pub num_impot: Option<String>,
    pub email: Option<String>,
    pub telephone: String,
    pub address: Option<String>,
    pub manager: Option<String>,

    pub plan_id: Option<String>,
    pub plan_name: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub duration: i32,
    pub features: Vec<String>,
    pub max_users: i32,
    pub max_pos: i32,
    pub max_storage_gb: i32,

    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub transaction_id: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub mobile_operator: Option<String>,

    pub validated_by: Option<Uuid>,
    pub validation_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub rejected_reason: Option<String>,

    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub next_billing_date: Option<DateTime<Utc>>,
    pub auto_renew: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
