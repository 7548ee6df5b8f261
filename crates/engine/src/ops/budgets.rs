use chrono::Utc;
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr};
use uuid::Uuid;

use crate::{
    AlertSeverity, Budget, BudgetAlert, BudgetInput, BudgetOverview, BudgetStatus, BudgetUpdate,
    DEFAULT_ALERT_THRESHOLD, EngineError, Money, Month, ResultEngine, budgets,
    util::{MAX_CATEGORY_LEN, normalize_required_text},
};

use super::{
    Engine,
    entries::{category_spending, normalize_owner},
    with_tx,
};

fn validate_limit(limit: Money) -> ResultEngine<()> {
    if !limit.is_positive() {
        return Err(EngineError::Validation(
            "monthly limit must be > 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_threshold(threshold: u8) -> ResultEngine<()> {
    if threshold > 100 {
        return Err(EngineError::Validation(format!(
            "alert threshold must be between 0 and 100, got {threshold}"
        )));
    }
    Ok(())
}

async fn require_budget<C: ConnectionTrait>(
    db: &C,
    owner_id: &str,
    budget_id: Uuid,
) -> ResultEngine<budgets::Model> {
    budgets::Entity::find_by_id(budget_id)
        .filter(budgets::Column::OwnerId.eq(owner_id.to_string()))
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("budget not exists".to_string()))
}

async fn find_budget_by_category<C: ConnectionTrait>(
    db: &C,
    owner_id: &str,
    category: &str,
) -> ResultEngine<Option<budgets::Model>> {
    Ok(budgets::Entity::find()
        .filter(budgets::Column::OwnerId.eq(owner_id.to_string()))
        .filter(Expr::cust("LOWER(category)").eq(category.trim().to_lowercase()))
        .one(db)
        .await?)
}

pub(crate) async fn list_budgets<C: ConnectionTrait>(
    db: &C,
    owner_id: &str,
) -> ResultEngine<Vec<Budget>> {
    budgets::Entity::find()
        .filter(budgets::Column::OwnerId.eq(owner_id.to_string()))
        .order_by_asc(budgets::Column::Category)
        .all(db)
        .await?
        .into_iter()
        .map(Budget::try_from)
        .collect()
}

async fn status_of<C: ConnectionTrait>(
    db: &C,
    budget: Budget,
    month: Month,
) -> ResultEngine<BudgetStatus> {
    let (from, to) = month.range()?;
    let spent = category_spending(db, &budget.owner_id, &budget.category, from, to).await?;
    Ok(BudgetStatus::compute(budget, month, spent))
}

impl Engine {
    /// Sets the budget of a category.
    ///
    /// There is at most one budget per `(owner, category)`: when the
    /// category already has one its limit and threshold are replaced.
    pub async fn upsert_budget(&self, owner_id: &str, input: BudgetInput) -> ResultEngine<Budget> {
        let owner_id = normalize_owner(owner_id)?;
        let category = normalize_required_text(&input.category, "category", MAX_CATEGORY_LEN)?;
        validate_limit(input.monthly_limit)?;
        let alert_threshold = input.alert_threshold.unwrap_or(DEFAULT_ALERT_THRESHOLD);
        validate_threshold(alert_threshold)?;

        with_tx!(self, |db_tx| {
            let now = Utc::now();
            let budget = match find_budget_by_category(&db_tx, &owner_id, &category).await? {
                Some(model) => {
                    let mut budget = Budget::try_from(model)?;
                    budget.monthly_limit = input.monthly_limit;
                    budget.alert_threshold = alert_threshold;
                    budget.updated_at = now;
                    budgets::ActiveModel::from(&budget).update(&db_tx).await?;
                    budget
                }
                None => {
                    let budget = Budget {
                        id: Uuid::new_v4(),
                        owner_id: owner_id.clone(),
                        category: category.clone(),
                        monthly_limit: input.monthly_limit,
                        alert_threshold,
                        created_at: now,
                        updated_at: now,
                    };
                    budgets::ActiveModel::from(&budget).insert(&db_tx).await?;
                    budget
                }
            };
            tracing::info!(
                owner_id = %budget.owner_id,
                category = %budget.category,
                limit = %budget.monthly_limit,
                "budget saved"
            );
            Ok(budget)
        })
    }

    /// Return a budget snapshot from DB.
    pub async fn budget(&self, owner_id: &str, budget_id: Uuid) -> ResultEngine<Budget> {
        let model = require_budget(&self.database, owner_id, budget_id).await?;
        Budget::try_from(model)
    }

    pub async fn update_budget(
        &self,
        owner_id: &str,
        budget_id: Uuid,
        update: BudgetUpdate,
    ) -> ResultEngine<Budget> {
        if let Some(limit) = update.monthly_limit {
            validate_limit(limit)?;
        }
        if let Some(threshold) = update.alert_threshold {
            validate_threshold(threshold)?;
        }
        with_tx!(self, |db_tx| {
            let model = require_budget(&db_tx, owner_id, budget_id).await?;
            let mut budget = Budget::try_from(model)?;
            if let Some(limit) = update.monthly_limit {
                budget.monthly_limit = limit;
            }
            if let Some(threshold) = update.alert_threshold {
                budget.alert_threshold = threshold;
            }
            budget.updated_at = Utc::now();
            budgets::ActiveModel::from(&budget).update(&db_tx).await?;
            Ok(budget)
        })
    }

    pub async fn delete_budget(&self, owner_id: &str, budget_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            require_budget(&db_tx, owner_id, budget_id).await?;
            budgets::Entity::delete_by_id(budget_id).exec(&db_tx).await?;
            tracing::info!(owner_id, %budget_id, "budget deleted");
            Ok(())
        })
    }

    /// Budgets of `owner_id`, sorted by category.
    pub async fn list_budgets(&self, owner_id: &str) -> ResultEngine<Vec<Budget>> {
        list_budgets(&self.database, owner_id).await
    }

    /// Spending of one budget in `month`.
    pub async fn budget_status(
        &self,
        owner_id: &str,
        budget_id: Uuid,
        month: Month,
    ) -> ResultEngine<BudgetStatus> {
        let model = require_budget(&self.database, owner_id, budget_id).await?;
        status_of(&self.database, Budget::try_from(model)?, month).await
    }

    /// Status of every budget of `owner_id` in `month`, with the alerts
    /// ranked by severity.
    pub async fn budget_overview(&self, owner_id: &str, month: Month) -> ResultEngine<BudgetOverview> {
        let budgets = list_budgets(&self.database, owner_id).await?;
        let mut statuses = Vec::with_capacity(budgets.len());
        for budget in budgets {
            statuses.push(status_of(&self.database, budget, month).await?);
        }
        let overview = BudgetOverview::from_statuses(month, statuses);
        tracing::debug!(
            owner_id,
            %month,
            budgets = overview.budgets.len(),
            alerts = overview.alerts.len(),
            "budget overview computed"
        );
        Ok(overview)
    }

    /// Would adding an expense of `amount` to `category` in `month` raise a
    /// budget alert? Returns `None` when the category has no budget or stays
    /// below its threshold.
    pub async fn check_budget_on_expense(
        &self,
        owner_id: &str,
        category: &str,
        amount: Money,
        month: Month,
    ) -> ResultEngine<Option<BudgetAlert>> {
        let Some(model) = find_budget_by_category(&self.database, owner_id, category).await?
        else {
            return Ok(None);
        };
        let budget = Budget::try_from(model)?;
        let (from, to) = month.range()?;
        let spent = category_spending(&self.database, owner_id, &budget.category, from, to).await?;

        let status = BudgetStatus::compute(budget, month, spent.saturating_add(amount));
        let Some(mut alert) = status.alert() else {
            return Ok(None);
        };
        alert.message = match alert.severity {
            AlertSeverity::Danger => {
                format!("This expense will exceed your {} budget!", alert.category)
            }
            AlertSeverity::Warning => format!(
                "This expense will use {}% of your {} budget",
                alert.percentage_used, alert.category
            ),
        };
        Ok(Some(alert))
    }
}
