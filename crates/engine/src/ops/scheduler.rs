//! Recurrence rules lifecycle and due-date materialization.
//!
//! [`Engine::process_due`] walks every active rule forward one due date at a
//! time. Each date commits in its own DB transaction together with the
//! `last_processed` checkpoint, so an interrupted run resumes at the next
//! unprocessed date and a repeated run is a no-op.

use chrono::{NaiveDate, Utc};
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    DedupeKey, EngineError, LedgerEntry, NewEntry, NewRule, RecurrenceRule, ResultEngine,
    recurring_rules,
    util::{MAX_CATEGORY_LEN, MAX_DESCRIPTION_LEN, normalize_required_text, validate_new_entry},
};

use super::{
    Engine,
    entries::{build_entry, insert_if_absent, normalize_owner},
    with_tx,
};

/// Prefix of the description of materialized entries.
const RECURRING_PREFIX: &str = "[Recurring] ";

/// Outcome of a scheduler run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedRecurring {
    /// Entries created by this run.
    pub processed_count: usize,
    pub entries: Vec<LedgerEntry>,
    /// Due dates whose entry already existed (e.g. written by a concurrent run).
    pub skipped: usize,
    /// Rules that failed. Their committed dates stay in place.
    pub errors: Vec<RuleFailure>,
}

/// A rule the scheduler gave up on during one run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFailure {
    pub rule_id: Uuid,
    pub owner_id: String,
    pub message: String,
}

/// Advances `last_processed` to `due_date`, never moving it backwards.
///
/// Returns the number of rows touched: `0` when the rule is gone, paused, or
/// already past `due_date`.
pub(crate) async fn update_rule_last_processed<C: ConnectionTrait>(
    db: &C,
    rule_id: Uuid,
    due_date: NaiveDate,
) -> ResultEngine<u64> {
    let result = recurring_rules::Entity::update_many()
        .col_expr(recurring_rules::Column::LastProcessed, Expr::value(due_date))
        .filter(recurring_rules::Column::Id.eq(rule_id))
        .filter(recurring_rules::Column::Active.eq(true))
        .filter(
            recurring_rules::Column::LastProcessed
                .is_null()
                .or(recurring_rules::Column::LastProcessed.lt(due_date)),
        )
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

async fn rule_is_active<C: ConnectionTrait>(db: &C, rule_id: Uuid) -> ResultEngine<bool> {
    let rule = recurring_rules::Entity::find_by_id(rule_id)
        .filter(recurring_rules::Column::Active.eq(true))
        .one(db)
        .await?;
    Ok(rule.is_some())
}

/// Raw rows, so one unreadable rule does not hide the others.
pub(crate) async fn list_active_rules<C: ConnectionTrait>(
    db: &C,
    owner_id: Option<&str>,
) -> ResultEngine<Vec<recurring_rules::Model>> {
    let mut query =
        recurring_rules::Entity::find().filter(recurring_rules::Column::Active.eq(true));
    if let Some(owner_id) = owner_id {
        query = query.filter(recurring_rules::Column::OwnerId.eq(owner_id.to_string()));
    }
    let rules = query
        .order_by_asc(recurring_rules::Column::CreatedAt)
        .order_by_asc(recurring_rules::Column::Id)
        .all(db)
        .await?;
    Ok(rules)
}

async fn require_rule<C: ConnectionTrait>(
    db: &C,
    owner_id: &str,
    rule_id: Uuid,
) -> ResultEngine<recurring_rules::Model> {
    recurring_rules::Entity::find_by_id(rule_id)
        .filter(recurring_rules::Column::OwnerId.eq(owner_id.to_string()))
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("recurring rule not exists".to_string()))
}

fn entry_for_due_date(rule: &RecurrenceRule, due_date: NaiveDate) -> NewEntry {
    NewEntry::new(
        rule.amount,
        rule.category.clone(),
        format!("{RECURRING_PREFIX}{}", rule.description),
        due_date,
    )
    .currency(rule.currency)
}

impl Engine {
    /// Create a new recurrence rule. Nothing is materialized until the next
    /// [`Engine::process_due`].
    pub async fn create_rule(&self, cmd: NewRule) -> ResultEngine<RecurrenceRule> {
        let owner_id = normalize_owner(&cmd.owner_id)?;
        if !cmd.amount.is_positive() {
            return Err(EngineError::Validation("amount must be > 0".to_string()));
        }
        if let Some(end) = cmd.end_date
            && end < cmd.start_date
        {
            return Err(EngineError::RuleConfig(
                "end_date must not be before start_date".to_string(),
            ));
        }

        let rule = RecurrenceRule {
            id: Uuid::new_v4(),
            owner_id,
            amount: cmd.amount,
            currency: cmd.currency,
            category: normalize_required_text(&cmd.category, "category", MAX_CATEGORY_LEN)?,
            description: normalize_required_text(
                &cmd.description,
                "description",
                MAX_DESCRIPTION_LEN - RECURRING_PREFIX.len(),
            )?,
            frequency: cmd.frequency,
            start_date: cmd.start_date,
            end_date: cmd.end_date,
            last_processed: None,
            active: true,
            created_at: Utc::now(),
        };
        recurring_rules::ActiveModel::from(&rule)
            .insert(&self.database)
            .await?;
        tracing::info!(
            owner_id = %rule.owner_id,
            rule_id = %rule.id,
            frequency = %rule.frequency.label(),
            "recurring rule created"
        );
        Ok(rule)
    }

    /// Return a rule snapshot from DB.
    pub async fn rule(&self, owner_id: &str, rule_id: Uuid) -> ResultEngine<RecurrenceRule> {
        let model = require_rule(&self.database, owner_id, rule_id).await?;
        RecurrenceRule::try_from(model)
    }

    /// Every rule of `owner_id`, active or not.
    pub async fn list_rules(&self, owner_id: &str) -> ResultEngine<Vec<RecurrenceRule>> {
        recurring_rules::Entity::find()
            .filter(recurring_rules::Column::OwnerId.eq(owner_id.to_string()))
            .order_by_asc(recurring_rules::Column::CreatedAt)
            .order_by_asc(recurring_rules::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(RecurrenceRule::try_from)
            .collect()
    }

    /// Flips the `active` flag. `last_processed` is left as is, so a
    /// reactivated rule catches up on the dates missed while paused.
    ///
    /// The flip is a single column update, so a checkpoint advanced by a
    /// concurrent scheduler run is never written back.
    pub async fn toggle_rule(&self, owner_id: &str, rule_id: Uuid) -> ResultEngine<RecurrenceRule> {
        with_tx!(self, |db_tx| {
            let result = recurring_rules::Entity::update_many()
                .col_expr(recurring_rules::Column::Active, Expr::cust("NOT active"))
                .filter(recurring_rules::Column::Id.eq(rule_id))
                .filter(recurring_rules::Column::OwnerId.eq(owner_id.to_string()))
                .exec(&db_tx)
                .await?;
            if result.rows_affected == 0 {
                return Err(EngineError::KeyNotFound("recurring rule not exists".to_string()));
            }
            let rule = RecurrenceRule::try_from(require_rule(&db_tx, owner_id, rule_id).await?)?;
            tracing::info!(owner_id, %rule_id, active = rule.active, "recurring rule toggled");
            Ok(rule)
        })
    }

    /// Deletes a rule. Entries it already materialized are kept.
    pub async fn delete_rule(&self, owner_id: &str, rule_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            require_rule(&db_tx, owner_id, rule_id).await?;
            recurring_rules::Entity::delete_by_id(rule_id)
                .exec(&db_tx)
                .await?;
            tracing::info!(owner_id, %rule_id, "recurring rule deleted");
            Ok(())
        })
    }

    /// Materializes every due date up to `as_of` (inclusive) for the active
    /// rules of `owner_id`, or of every owner when `None`.
    ///
    /// Dates are processed in chronological order per rule. Each date is
    /// committed with its checkpoint before moving on. A rule that fails is
    /// recorded in [`ProcessedRecurring::errors`] and the run moves on to the
    /// next one; only retryable database errors abort the whole run.
    pub async fn process_due(
        &self,
        owner_id: Option<&str>,
        as_of: NaiveDate,
    ) -> ResultEngine<ProcessedRecurring> {
        let rules = list_active_rules(&self.database, owner_id).await?;
        let mut out = ProcessedRecurring::default();

        for model in rules {
            let rule_id = model.id;
            let rule_owner = model.owner_id.clone();
            let result = match RecurrenceRule::try_from(model) {
                Ok(rule) => self.process_rule(rule, as_of, &mut out).await,
                Err(err) => Err(err),
            };
            match result {
                Ok(()) => {}
                Err(err) if err.is_retryable() => return Err(err),
                Err(err) => {
                    tracing::warn!(%rule_id, owner_id = %rule_owner, "recurring rule failed: {err}");
                    out.errors.push(RuleFailure {
                        rule_id,
                        owner_id: rule_owner,
                        message: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            owner_id = owner_id.unwrap_or("*"),
            %as_of,
            processed = out.processed_count,
            skipped = out.skipped,
            failed = out.errors.len(),
            "recurring rules processed"
        );
        Ok(out)
    }

    async fn process_rule(
        &self,
        mut rule: RecurrenceRule,
        as_of: NaiveDate,
        out: &mut ProcessedRecurring,
    ) -> ResultEngine<()> {
        while let Some(due_date) = rule.next_due_date_after(as_of) {
            let valid = validate_new_entry(entry_for_due_date(&rule, due_date))?;
            let entry = build_entry(
                rule.owner_id.clone(),
                valid,
                Some(DedupeKey::recurrence(rule.id, due_date)),
            );

            // Checkpoint first: a rule deleted or paused since the listing
            // gets no entry for this date.
            let outcome = with_tx!(self, |db_tx| {
                let advanced = update_rule_last_processed(&db_tx, rule.id, due_date).await?;
                if advanced == 0 && !rule_is_active(&db_tx, rule.id).await? {
                    Ok::<_, EngineError>(None)
                } else {
                    insert_if_absent(&db_tx, entry).await.map(Some)
                }
            })?;

            let Some(outcome) = outcome else {
                tracing::info!(rule_id = %rule.id, %due_date, "recurring rule gone or paused, stopping");
                break;
            };
            if outcome.created {
                tracing::debug!(rule_id = %rule.id, %due_date, "recurring entry materialized");
                out.processed_count += 1;
                out.entries.push(outcome.entry);
            } else {
                tracing::debug!(rule_id = %rule.id, %due_date, "recurring entry already present");
                out.skipped += 1;
            }
            rule.last_processed = Some(due_date);
        }
        Ok(())
    }
}
