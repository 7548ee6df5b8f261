//! Monthly category budgets and their derived status.
//!
//! A [`Budget`] caps spending for one category of one owner. Status values
//! ([`BudgetStatus`], [`BudgetOverview`]) are derived on demand from the
//! ledger and never stored.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, Month};

pub const DEFAULT_ALERT_THRESHOLD: u8 = 80;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub owner_id: String,
    pub category: String,
    pub monthly_limit: Money,
    /// Percentage (0..=100) of the limit at which a warning is raised.
    pub alert_threshold: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Danger,
}

impl AlertSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub budget: Budget,
    pub month: Month,
    pub spent: Money,
    /// `limit - spent`; negative once the budget is exceeded.
    pub remaining: Money,
    pub percentage_used: i64,
    pub is_over_budget: bool,
    pub is_alert: bool,
}

impl BudgetStatus {
    pub fn compute(budget: Budget, month: Month, spent: Money) -> Self {
        let limit = budget.monthly_limit;
        let percentage_used = spent.percent_of(limit);
        Self {
            month,
            spent,
            remaining: limit - spent,
            percentage_used,
            is_over_budget: spent > limit,
            is_alert: percentage_used >= i64::from(budget.alert_threshold),
            budget,
        }
    }

    pub fn severity(&self) -> Option<AlertSeverity> {
        if self.is_over_budget {
            Some(AlertSeverity::Danger)
        } else if self.is_alert {
            Some(AlertSeverity::Warning)
        } else {
            None
        }
    }

    pub fn alert(&self) -> Option<BudgetAlert> {
        let severity = self.severity()?;
        let message = match severity {
            AlertSeverity::Danger => format!(
                "Over budget! Spent {} of {}",
                self.spent, self.budget.monthly_limit
            ),
            AlertSeverity::Warning => {
                format!("Approaching limit: {}% used", self.percentage_used)
            }
        };
        Some(BudgetAlert {
            budget_id: self.budget.id,
            category: self.budget.category.clone(),
            monthly_limit: self.budget.monthly_limit,
            spent: self.spent,
            percentage_used: self.percentage_used,
            severity,
            message,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetAlert {
    pub budget_id: Uuid,
    pub category: String,
    pub monthly_limit: Money,
    pub spent: Money,
    pub percentage_used: i64,
    pub severity: AlertSeverity,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetOverview {
    pub month: Month,
    pub budgets: Vec<BudgetStatus>,
    /// Danger first, then by percentage used (highest first).
    pub alerts: Vec<BudgetAlert>,
    pub total_budgeted: Money,
    pub total_spent: Money,
    pub categories_over_budget: usize,
}

impl BudgetOverview {
    pub fn from_statuses(month: Month, budgets: Vec<BudgetStatus>) -> Self {
        let mut alerts: Vec<BudgetAlert> = budgets.iter().filter_map(BudgetStatus::alert).collect();
        alerts.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(b.percentage_used.cmp(&a.percentage_used))
                .then_with(|| a.category.cmp(&b.category))
        });

        Self {
            month,
            total_budgeted: budgets.iter().map(|s| s.budget.monthly_limit).sum(),
            total_spent: budgets.iter().map(|s| s.spent).sum(),
            categories_over_budget: budgets.iter().filter(|s| s.is_over_budget).count(),
            alerts,
            budgets,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: String,
    pub category: String,
    pub monthly_limit_minor: i64,
    pub alert_threshold: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Budget> for ActiveModel {
    fn from(budget: &Budget) -> Self {
        Self {
            id: ActiveValue::Set(budget.id),
            owner_id: ActiveValue::Set(budget.owner_id.clone()),
            category: ActiveValue::Set(budget.category.clone()),
            monthly_limit_minor: ActiveValue::Set(budget.monthly_limit.minor()),
            alert_threshold: ActiveValue::Set(i32::from(budget.alert_threshold)),
            created_at: ActiveValue::Set(budget.created_at),
            updated_at: ActiveValue::Set(budget.updated_at),
        }
    }
}

impl TryFrom<Model> for Budget {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let alert_threshold = u8::try_from(model.alert_threshold)
            .ok()
            .filter(|t| *t <= 100)
            .ok_or_else(|| {
                EngineError::Validation(format!(
                    "stored alert threshold out of range: {}",
                    model.alert_threshold
                ))
            })?;
        Ok(Self {
            id: model.id,
            owner_id: model.owner_id,
            category: model.category,
            monthly_limit: Money::new(model.monthly_limit_minor),
            alert_threshold,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
