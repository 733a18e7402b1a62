use api_subs::services::lifecycle::Event;
use db::models::{
    history::SubscriptionHistory,
    subscription::{Subscription, SubscriptionStatus},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<SubscriptionStatus>,
    pub search: Option<String>,
}

impl ListQuery {
    /// Resolves `(page, limit)`: page starts at 1, limit is clamped to `1..=max_limit`.
    pub fn page_and_limit(&self, default_limit: i64, max_limit: i64) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(default_limit).clamp(1, max_limit);
        (page, limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(current_page: i64, per_page: i64, total: i64) -> Self {
        Pagination {
            current_page,
            per_page,
            total,
            total_pages: (total + per_page - 1) / per_page,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionListResponse {
    pub subscriptions: Vec<Subscription>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionDetailResponse {
    pub subscription: Subscription,
    pub history: Vec<SubscriptionHistory>,
    /// Lifecycle events the current status accepts.
    pub allowed_events: Vec<Event>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpireResponse {
    pub expired: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequest {
    pub admin_notes: Option<String>,
}

/// Reject and suspend both require a reason.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminReasonRequest {
    #[validate(
        length(min = 1, max = 1000, message = "reason is required"),
        custom(function = "common::validation::not_blank", message = "reason is required")
    )]
    pub reason: String,
}

/// Partial overwrite; absent fields are left untouched.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct AdminUpdateRequest {
    #[validate(
        length(min = 1, max = 255, message = "name cannot be empty"),
        custom(function = "common::validation::not_blank", message = "name cannot be empty")
    )]
    pub name: Option<String>,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    #[validate(
        length(min = 3, max = 32, message = "telephone is invalid"),
        custom(function = "common::validation::not_blank", message = "telephone is invalid")
    )]
    pub telephone: Option<String>,
    pub notes: Option<String>,
    pub auto_renew: Option<bool>,
    pub status: Option<SubscriptionStatus>,
}
