use base64::Engine as _;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sea_orm::{
    Condition, ConnectionTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr, TransactionTrait,
    prelude::*,
    sea_query::{Expr, LikeExpr, OnConflict},
};

use crate::{
    CreateEntryCmd, DedupeKey, EngineError, EntryUpdate, LedgerEntry, Money, ResultEngine,
    entries,
    util::{
        MAX_CATEGORY_LEN, MAX_DESCRIPTION_LEN, MAX_NOTES_LEN, ValidEntry, ensure_positive_amount,
        normalize_optional_text, normalize_required_text, normalize_tags, validate_new_entry,
    },
};

use super::{Engine, WriteOutcome, with_tx};

/// Filters for listing entries.
///
/// `from` and `to` are both inclusive.
#[derive(Clone, Debug, Default)]
pub struct EntryFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Case-insensitive substring of the category.
    pub category: Option<String>,
    /// Case-insensitive substring of the description.
    pub search: Option<String>,
    pub tag: Option<String>,
    pub min_amount: Option<Money>,
    pub max_amount: Option<Money>,
}

fn validate_list_filter(filter: &EntryFilter) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from > to
    {
        return Err(EngineError::Validation(
            "invalid range: from must be <= to".to_string(),
        ));
    }
    if let (Some(min), Some(max)) = (filter.min_amount, filter.max_amount)
        && min > max
    {
        return Err(EngineError::Validation(
            "invalid range: min_amount must be <= max_amount".to_string(),
        ));
    }
    Ok(())
}

const LIKE_ESCAPE: char = '!';

/// `LIKE` pattern matching `needle` anywhere, with `%` and `_` taken literally.
fn contains(needle: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape(LIKE_ESCAPE)
}

trait ApplyEntryFilters: QueryFilter + Sized {
    fn apply_entry_filters(self, filter: &EntryFilter) -> Self;
}

impl<T> ApplyEntryFilters for T
where
    T: QueryFilter + Sized,
{
    fn apply_entry_filters(mut self, filter: &EntryFilter) -> Self {
        if let Some(from) = filter.from {
            self = self.filter(entries::Column::OccurredOn.gte(from));
        }
        if let Some(to) = filter.to {
            self = self.filter(entries::Column::OccurredOn.lte(to));
        }
        if let Some(category) = filter.category.as_deref().map(str::trim)
            && !category.is_empty()
        {
            self = self.filter(entries::Column::Category.like(contains(category)));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim)
            && !search.is_empty()
        {
            self = self.filter(entries::Column::Description.like(contains(search)));
        }
        if let Some(tag) = filter.tag.as_deref().map(str::trim)
            && !tag.is_empty()
        {
            // Tags are stored as a JSON array of lowercase strings.
            self = self.filter(
                entries::Column::Tags.like(contains(&format!("\"{}\"", tag.to_lowercase()))),
            );
        }
        if let Some(min) = filter.min_amount {
            self = self.filter(entries::Column::AmountMinor.gte(min.minor()));
        }
        if let Some(max) = filter.max_amount {
            self = self.filter(entries::Column::AmountMinor.lte(max.minor()));
        }
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct EntriesCursor {
    occurred_on: NaiveDate,
    entry_id: Uuid,
}

impl EntriesCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid entries cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid entries cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid entries cursor".to_string()))
    }
}

pub(crate) fn normalize_owner(owner_id: &str) -> ResultEngine<String> {
    let trimmed = owner_id.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(
            "owner id must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Builds the entry that will be stored for validated data.
pub(crate) fn build_entry(
    owner_id: String,
    valid: ValidEntry,
    dedupe: Option<DedupeKey>,
) -> LedgerEntry {
    let now = Utc::now();
    let (rule_id, due_date) = match &dedupe {
        Some(DedupeKey::Recurrence { rule_id, due_date }) => (Some(*rule_id), Some(*due_date)),
        _ => (None, None),
    };
    let ValidEntry { entry, tags } = valid;
    LedgerEntry {
        id: Uuid::new_v4(),
        owner_id,
        amount: entry.amount,
        currency: entry.currency,
        category: entry.category,
        description: entry.description,
        occurred_on: entry.occurred_on,
        tags,
        notes: entry.notes,
        dedupe,
        rule_id,
        due_date,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) async fn find_by_dedupe<C: ConnectionTrait>(
    db: &C,
    owner_id: &str,
    dedupe: &DedupeKey,
) -> ResultEngine<Option<LedgerEntry>> {
    entries::Entity::find()
        .filter(entries::Column::OwnerId.eq(owner_id.to_string()))
        .filter(entries::Column::DedupeKind.eq(dedupe.kind()))
        .filter(entries::Column::DedupeValue.eq(dedupe.value()))
        .one(db)
        .await?
        .map(LedgerEntry::try_from)
        .transpose()
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err, DbErr::RecordNotInserted)
        || matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Stores `entry` unless an entry with the same `(owner, dedupe key)`
/// already exists, in which case the stored one is returned untouched.
///
/// The insert relies on the storage unique index: when two writers race on
/// the same key exactly one insert lands and the loser re-reads the winner.
pub(crate) async fn insert_if_absent<C: ConnectionTrait>(
    db: &C,
    entry: LedgerEntry,
) -> ResultEngine<WriteOutcome> {
    let Some(dedupe) = entry.dedupe.clone() else {
        entries::ActiveModel::from(&entry).insert(db).await?;
        return Ok(WriteOutcome::created(entry));
    };

    if let Some(existing) = find_by_dedupe(db, &entry.owner_id, &dedupe).await? {
        return Ok(WriteOutcome::existing(existing));
    }

    let inserted = entries::Entity::insert(entries::ActiveModel::from(&entry))
        .on_conflict(
            OnConflict::columns([
                entries::Column::OwnerId,
                entries::Column::DedupeKind,
                entries::Column::DedupeValue,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await;
    match inserted {
        Ok(rows) if rows > 0 => return Ok(WriteOutcome::created(entry)),
        Ok(_) => {}
        Err(err) if is_unique_violation(&err) => {}
        Err(err) => return Err(err.into()),
    }

    tracing::debug!(
        owner_id = %entry.owner_id,
        dedupe_kind = dedupe.kind(),
        "dedupe conflict, reading stored entry"
    );
    find_by_dedupe(db, &entry.owner_id, &dedupe)
        .await?
        .map(WriteOutcome::existing)
        .ok_or_else(|| EngineError::ExistingKey(dedupe.value()))
}

async fn require_entry<C: ConnectionTrait>(
    db: &C,
    owner_id: &str,
    entry_id: Uuid,
) -> ResultEngine<entries::Model> {
    entries::Entity::find_by_id(entry_id)
        .filter(entries::Column::OwnerId.eq(owner_id.to_string()))
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("entry not exists".to_string()))
}

/// Sum of the amounts of `category` entries dated in `[from, to)`.
pub(crate) async fn category_spending<C: ConnectionTrait>(
    db: &C,
    owner_id: &str,
    category: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> ResultEngine<Money> {
    let total: Option<Option<i64>> = entries::Entity::find()
        .select_only()
        .column_as(entries::Column::AmountMinor.sum(), "total")
        .filter(entries::Column::OwnerId.eq(owner_id.to_string()))
        .filter(Expr::cust("LOWER(category)").eq(category.to_lowercase()))
        .filter(entries::Column::OccurredOn.gte(from))
        .filter(entries::Column::OccurredOn.lt(to))
        .into_tuple()
        .one(db)
        .await?;
    Ok(Money::new(total.flatten().unwrap_or(0)))
}

impl Engine {
    /// Creates a ledger entry, at most once per `(owner, dedupe key)`.
    ///
    /// Without a dedupe key every call creates a new entry. With one, a
    /// repeated call returns the stored entry with `created == false`.
    pub async fn create_entry(&self, cmd: CreateEntryCmd) -> ResultEngine<WriteOutcome> {
        let owner_id = normalize_owner(&cmd.owner_id)?;
        let dedupe = cmd.dedupe.map(DedupeKey::normalize).transpose()?;
        let valid = validate_new_entry(cmd.entry)?;

        let entry = build_entry(owner_id, valid, dedupe);
        let outcome = insert_if_absent(&self.database, entry).await?;
        if outcome.created {
            tracing::info!(
                owner_id = %outcome.entry.owner_id,
                entry_id = %outcome.entry.id,
                amount = %outcome.entry.amount,
                "entry created"
            );
        } else {
            tracing::debug!(
                owner_id = %outcome.entry.owner_id,
                entry_id = %outcome.entry.id,
                "duplicate write suppressed"
            );
        }
        Ok(outcome)
    }

    /// Return an entry snapshot from DB.
    pub async fn entry(&self, owner_id: &str, entry_id: Uuid) -> ResultEngine<LedgerEntry> {
        let model = require_entry(&self.database, owner_id, entry_id).await?;
        LedgerEntry::try_from(model)
    }

    /// Lists every entry matching `filter`, newest first.
    pub async fn list_entries(
        &self,
        owner_id: &str,
        filter: &EntryFilter,
    ) -> ResultEngine<Vec<LedgerEntry>> {
        validate_list_filter(filter)?;
        entries::Entity::find()
            .filter(entries::Column::OwnerId.eq(owner_id.to_string()))
            .apply_entry_filters(filter)
            .order_by_desc(entries::Column::OccurredOn)
            .order_by_desc(entries::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(LedgerEntry::try_from)
            .collect()
    }

    /// Lists entries with cursor-based pagination.
    ///
    /// Pagination is newest → older by `(occurred_on DESC, entry_id DESC)`.
    pub async fn list_entries_page(
        &self,
        owner_id: &str,
        limit: u64,
        cursor: Option<&str>,
        filter: &EntryFilter,
    ) -> ResultEngine<(Vec<LedgerEntry>, Option<String>)> {
        validate_list_filter(filter)?;

        let limit_plus_one = limit.saturating_add(1);
        let mut query = entries::Entity::find()
            .filter(entries::Column::OwnerId.eq(owner_id.to_string()))
            .order_by_desc(entries::Column::OccurredOn)
            .order_by_desc(entries::Column::Id)
            .limit(limit_plus_one);

        if let Some(cursor) = cursor {
            let cursor = EntriesCursor::decode(cursor)?;
            query = query.filter(
                Condition::any()
                    .add(entries::Column::OccurredOn.lt(cursor.occurred_on))
                    .add(
                        Condition::all()
                            .add(entries::Column::OccurredOn.eq(cursor.occurred_on))
                            .add(entries::Column::Id.lt(cursor.entry_id)),
                    ),
            );
        }
        query = query.apply_entry_filters(filter);

        let rows = query.all(&self.database).await?;
        let has_more = rows.len() > limit as usize;

        let out: Vec<LedgerEntry> = rows
            .into_iter()
            .take(limit as usize)
            .map(LedgerEntry::try_from)
            .collect::<ResultEngine<_>>()?;

        let next_cursor = if has_more {
            out.last()
                .map(|entry| EntriesCursor {
                    occurred_on: entry.occurred_on,
                    entry_id: entry.id,
                })
                .map(|c| c.encode())
                .transpose()?
        } else {
            None
        };

        Ok((out, next_cursor))
    }

    /// Entries of one owner dated in `[from, to)`, optionally restricted to
    /// a category (case-insensitive exact match), oldest first.
    pub async fn query_entries(
        &self,
        owner_id: &str,
        category: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ResultEngine<Vec<LedgerEntry>> {
        let mut query = entries::Entity::find()
            .filter(entries::Column::OwnerId.eq(owner_id.to_string()))
            .filter(entries::Column::OccurredOn.gte(from))
            .filter(entries::Column::OccurredOn.lt(to));
        if let Some(category) = category {
            query = query.filter(Expr::cust("LOWER(category)").eq(category.trim().to_lowercase()));
        }
        query
            .order_by_asc(entries::Column::OccurredOn)
            .order_by_asc(entries::Column::CreatedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(LedgerEntry::try_from)
            .collect()
    }

    /// Distinct categories used by an owner, sorted.
    pub async fn categories(&self, owner_id: &str) -> ResultEngine<Vec<String>> {
        let categories: Vec<String> = entries::Entity::find()
            .select_only()
            .column(entries::Column::Category)
            .distinct()
            .filter(entries::Column::OwnerId.eq(owner_id.to_string()))
            .order_by_asc(entries::Column::Category)
            .into_tuple()
            .all(&self.database)
            .await?;
        Ok(categories)
    }

    /// Applies a user edit to an entry.
    ///
    /// The dedupe key and the originating rule are never changed by an edit.
    pub async fn update_entry(
        &self,
        owner_id: &str,
        entry_id: Uuid,
        update: EntryUpdate,
    ) -> ResultEngine<LedgerEntry> {
        with_tx!(self, |db_tx| {
            let model = require_entry(&db_tx, owner_id, entry_id).await?;
            let mut entry = LedgerEntry::try_from(model)?;

            if let Some(amount) = update.amount {
                ensure_positive_amount(amount)?;
                entry.amount = amount;
            }
            if let Some(currency) = update.currency {
                entry.currency = currency;
            }
            if let Some(category) = update.category.as_deref() {
                entry.category = normalize_required_text(category, "category", MAX_CATEGORY_LEN)?;
            }
            if let Some(description) = update.description.as_deref() {
                entry.description =
                    normalize_required_text(description, "description", MAX_DESCRIPTION_LEN)?;
            }
            if let Some(occurred_on) = update.occurred_on {
                entry.occurred_on = occurred_on;
            }
            if let Some(tags) = update.tags {
                entry.tags = normalize_tags(tags)?;
            }
            if let Some(notes) = update.notes {
                entry.notes = normalize_optional_text(notes.as_deref(), "notes", MAX_NOTES_LEN)?;
            }
            entry.updated_at = Utc::now();

            entries::ActiveModel::from(&entry).update(&db_tx).await?;
            Ok(entry)
        })
    }

    /// Deletes an entry of `owner_id`.
    pub async fn delete_entry(&self, owner_id: &str, entry_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            require_entry(&db_tx, owner_id, entry_id).await?;
            entries::Entity::delete_by_id(entry_id).exec(&db_tx).await?;
            tracing::info!(owner_id, %entry_id, "entry deleted");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{DbBackend, QueryTrait};

    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        let sql = entries::Entity::find()
            .filter(entries::Column::Description.like(contains("50%_off!")))
            .build(DbBackend::Sqlite)
            .to_string();
        assert!(sql.contains("'%50!%!_off!!%'"), "{sql}");
        assert!(sql.contains("ESCAPE"), "{sql}");
    }
}
