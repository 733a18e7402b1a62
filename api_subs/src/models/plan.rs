use std::str::FromStr;

use common::error::AppError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanId {
    Basic,
    Professional,
    Enterprise,
}

impl PlanId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanId::Basic => "basic",
            PlanId::Professional => "professional",
            PlanId::Enterprise => "enterprise",
        }
    }

    pub fn plan(&self) -> SubscriptionPlan {
        match self {
            PlanId::Basic => SubscriptionPlan {
                id: *self,
                name: "Basic".to_string(),
                price: 2_999,
                currency: DEFAULT_CURRENCY.to_string(),
                duration: 1,
                max_users: 2,
                max_pos: 1,
                max_storage_gb: 5,
                features: vec![
                    "Point of sale".to_string(),
                    "Product catalog".to_string(),
                    "Stock tracking".to_string(),
                    "Daily sales report".to_string(),
                ],
                popular: false,
            },
            PlanId::Professional => SubscriptionPlan {
                id: *self,
                name: "Professional".to_string(),
                price: 5_999,
                currency: DEFAULT_CURRENCY.to_string(),
                duration: 1,
                max_users: 10,
                max_pos: 3,
                max_storage_gb: 20,
                features: vec![
                    "Everything in Basic".to_string(),
                    "Multiple points of sale".to_string(),
                    "Supplier and delivery management".to_string(),
                    "Client accounts".to_string(),
                    "Dashboard analytics".to_string(),
                ],
                popular: true,
            },
            PlanId::Enterprise => SubscriptionPlan {
                id: *self,
                name: "Enterprise".to_string(),
                price: 9_999,
                currency: DEFAULT_CURRENCY.to_string(),
                duration: 1,
                max_users: 50,
                max_pos: 10,
                max_storage_gb: 100,
                features: vec![
                    "Everything in Professional".to_string(),
                    "Cash register reconciliation".to_string(),
                    "CSV import".to_string(),
                    "Priority support".to_string(),
                ],
                popular: false,
            },
        }
    }
}

impl FromStr for PlanId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(PlanId::Basic),
            "professional" => Ok(PlanId::Professional),
            "enterprise" => Ok(PlanId::Enterprise),
            other => Err(AppError::BadRequest(format!(
                "Unknown subscription plan: {}",
                other
            ))),
        }
    }
}

/// Catalog entry. `price` is per month, in cents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: PlanId,
    pub name: String,
    pub price: i64,
    pub currency: String,
    pub duration: i32,
    pub max_users: i32,
    pub max_pos: i32,
    pub max_storage_gb: i32,
    pub features: Vec<String>,
    pub popular: bool,
}

impl SubscriptionPlan {
    /// Price for `months` months, fixed at selection time.
    pub fn amount_for(&self, months: i32) -> i64 {
        self.price * i64::from(months)
    }
}

pub fn default_plans() -> Vec<SubscriptionPlan> {
    [PlanId::Basic, PlanId::Professional, PlanId::Enterprise]
        .iter()
        .map(PlanId::plan)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_is_monthly_price_times_duration() {
        for id in [PlanId::Basic, PlanId::Professional, PlanId::Enterprise] {
            let plan = id.plan();
            for months in [1, 3, 12, 24] {
                assert_eq!(plan.amount_for(months), plan.price * i64::from(months));
            }
        }
    }

    #[test]
    fn professional_for_a_year_costs_719_88() {
        assert_eq!(PlanId::Professional.plan().amount_for(12), 71_988);
    }

    #[test]
    fn unknown_plan_id_is_an_error() {
        assert!(matches!(
            "platinum".parse::<PlanId>(),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(" Professional ".parse::<PlanId>().unwrap(), PlanId::Professional);
    }

    #[test]
    fn catalog_lists_three_tiers_with_one_popular() {
        let plans = default_plans();
        assert_eq!(plans.len(), 3);
        assert_eq!(plans.iter().filter(|p| p.popular).count(), 1);
        assert_eq!(plans[0].id, PlanId::Basic);
    }
}
