use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::plan::SubscriptionPlan;

#[derive(Debug, Deserialize, Validate)]
pub struct SubscriptionCreateRequest {
    pub entreprise_type: Option<String>,
    #[validate(
        length(min = 1, max = 255, message = "name is required"),
        custom(function = "common::validation::not_blank", message = "name is required")
    )]
    pub name: String,
    pub rccm: Option<String>,
    pub id_nat: Option<String>,
    pub num_impot: Option<String>,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    #[validate(
        length(min = 3, max = 32, message = "telephone is required"),
        custom(function = "common::validation::not_blank", message = "telephone is required")
    )]
    pub telephone: String,
    pub address: Option<String>,
    pub manager: Option<String>,
    #[serde(default)]
    pub auto_renew: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SelectPlanRequest {
    #[validate(
        length(min = 1, message = "plan_id is required"),
        custom(function = "common::validation::not_blank", message = "plan_id is required")
    )]
    pub plan_id: String,
    pub plan_name: Option<String>,
    #[validate(range(min = 1, max = 60, message = "duration must be between 1 and 60 months"))]
    pub duration: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitPaymentRequest {
    #[validate(
        length(min = 1, message = "payment_method is required"),
        custom(function = "common::validation::not_blank", message = "payment_method is required")
    )]
    pub payment_method: String,
    #[validate(
        length(min = 1, message = "payment_reference is required"),
        custom(function = "common::validation::not_blank", message = "payment_reference is required")
    )]
    pub payment_reference: String,
    #[validate(
        length(min = 1, message = "transaction_id is required"),
        custom(function = "common::validation::not_blank", message = "transaction_id is required")
    )]
    pub transaction_id: String,
    pub mobile_operator: Option<String>,
}

/// Body of the fail-payment and cancel calls. The whole body may be omitted.
#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionPlansResponse {
    pub plans: Vec<SubscriptionPlan>,
}
