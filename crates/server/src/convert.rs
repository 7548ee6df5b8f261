//! Mapping between engine values and wire types.

use api_types::{
    Currency as ApiCurrency,
    budget::{AlertSeverity as ApiSeverity, BudgetAlertView, BudgetStatusView, BudgetView},
    entry::EntryView,
    import::{ImportRowErrorView, ImportRowView},
    recurring::{Frequency as ApiFrequency, RuleView},
};
use chrono::{NaiveDate, Utc};

use crate::ServerError;

pub(crate) fn currency_to_api(currency: engine::Currency) -> ApiCurrency {
    match currency {
        engine::Currency::Inr => ApiCurrency::Inr,
        engine::Currency::Usd => ApiCurrency::Usd,
        engine::Currency::Eur => ApiCurrency::Eur,
        engine::Currency::Gbp => ApiCurrency::Gbp,
        engine::Currency::Jpy => ApiCurrency::Jpy,
        engine::Currency::Aud => ApiCurrency::Aud,
        engine::Currency::Cad => ApiCurrency::Cad,
    }
}

pub(crate) fn currency_from_api(currency: ApiCurrency) -> engine::Currency {
    match currency {
        ApiCurrency::Inr => engine::Currency::Inr,
        ApiCurrency::Usd => engine::Currency::Usd,
        ApiCurrency::Eur => engine::Currency::Eur,
        ApiCurrency::Gbp => engine::Currency::Gbp,
        ApiCurrency::Jpy => engine::Currency::Jpy,
        ApiCurrency::Aud => engine::Currency::Aud,
        ApiCurrency::Cad => engine::Currency::Cad,
    }
}

fn frequency_to_api(frequency: engine::Frequency) -> ApiFrequency {
    match frequency {
        engine::Frequency::Daily => ApiFrequency::Daily,
        engine::Frequency::Weekly { .. } => ApiFrequency::Weekly,
        engine::Frequency::Monthly { .. } => ApiFrequency::Monthly,
        engine::Frequency::Yearly { .. } => ApiFrequency::Yearly,
    }
}

pub(crate) fn entry_view(entry: engine::LedgerEntry) -> EntryView {
    EntryView {
        id: entry.id,
        amount_minor: entry.amount.minor(),
        currency: currency_to_api(entry.currency),
        idempotency_key: entry.idempotency_key().map(ToString::to_string),
        category: entry.category,
        description: entry.description,
        date: entry.occurred_on,
        tags: entry.tags.into_iter().collect(),
        notes: entry.notes,
        rule_id: entry.rule_id,
        created_at: entry.created_at,
    }
}

pub(crate) fn rule_view(rule: engine::RecurrenceRule) -> RuleView {
    // Next date the scheduler would materialize, whatever the run date.
    let next_due_date = rule.next_due_date_after(NaiveDate::MAX);
    RuleView {
        id: rule.id,
        amount_minor: rule.amount.minor(),
        currency: currency_to_api(rule.currency),
        frequency: frequency_to_api(rule.frequency),
        day_of_week: rule.frequency.day_of_week(),
        day_of_month: rule.frequency.day_of_month(),
        month_of_year: rule.frequency.month_of_year(),
        label: rule.frequency.label(),
        start_date: rule.start_date,
        end_date: rule.end_date,
        last_processed: rule.last_processed,
        next_due_date,
        active: rule.active,
        category: rule.category,
        description: rule.description,
    }
}

pub(crate) fn budget_view(budget: engine::Budget) -> BudgetView {
    BudgetView {
        id: budget.id,
        category: budget.category,
        monthly_limit_minor: budget.monthly_limit.minor(),
        alert_threshold: budget.alert_threshold,
    }
}

pub(crate) fn status_view(status: engine::BudgetStatus) -> BudgetStatusView {
    BudgetStatusView {
        month: status.month.to_string(),
        spent_minor: status.spent.minor(),
        remaining_minor: status.remaining.minor(),
        percentage_used: status.percentage_used,
        is_over_budget: status.is_over_budget,
        is_alert: status.is_alert,
        budget: budget_view(status.budget),
    }
}

pub(crate) fn alert_view(alert: engine::BudgetAlert) -> BudgetAlertView {
    BudgetAlertView {
        budget_id: alert.budget_id,
        category: alert.category,
        monthly_limit_minor: alert.monthly_limit.minor(),
        spent_minor: alert.spent.minor(),
        percentage_used: alert.percentage_used,
        severity: match alert.severity {
            engine::AlertSeverity::Warning => ApiSeverity::Warning,
            engine::AlertSeverity::Danger => ApiSeverity::Danger,
        },
        message: alert.message,
    }
}

pub(crate) fn row_error_view(err: engine::ImportRowError) -> ImportRowErrorView {
    ImportRowErrorView {
        line: err.line,
        message: err.message,
        fields: err.fields,
    }
}

pub(crate) fn import_row_view(candidate: engine::ImportCandidate) -> ImportRowView {
    let entry = candidate.entry;
    ImportRowView {
        line: candidate.line,
        date: entry.occurred_on,
        amount_minor: entry.amount.minor(),
        currency: currency_to_api(entry.currency),
        category: entry.category,
        description: entry.description,
        tags: entry.tags,
        notes: entry.notes,
    }
}

/// Parses a `YYYY-MM` month, defaulting to the current one.
pub(crate) fn month_or_current(month: Option<&str>) -> Result<engine::Month, ServerError> {
    match month {
        Some(raw) => Ok(raw.parse::<engine::Month>()?),
        None => Ok(engine::Month::of(Utc::now().date_naive())),
    }
}
