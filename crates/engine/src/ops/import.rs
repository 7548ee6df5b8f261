use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Money, RawRow, ResultEngine,
    import::{ImportCandidate, ImportRowError, prepare_rows},
    util::validate_new_entry,
};

use super::{
    Engine,
    entries::{build_entry, insert_if_absent, normalize_owner},
};

/// Valid rows shown by a preview.
const PREVIEW_SAMPLE_SIZE: usize = 20;
/// Row errors returned by a preview.
const PREVIEW_MAX_ERRORS: usize = 20;
/// Row errors returned by a commit.
const COMMIT_MAX_ERRORS: usize = 50;

/// Dry-run summary of an import. Nothing is written.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPreview {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    pub errors: Vec<ImportRowError>,
    pub sample_valid_entries: Vec<ImportCandidate>,
    /// Sum of the amounts of every valid row.
    pub estimated_total: Money,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    /// Valid rows that now have an entry, created by this commit or by an
    /// earlier one.
    pub success_count: usize,
    pub error_count: usize,
    /// Valid rows whose entry already existed.
    pub duplicate_count: usize,
    pub total_rows: usize,
    pub errors: Vec<ImportRowError>,
    /// Entries created by this commit.
    pub entry_ids: Vec<Uuid>,
}

impl Engine {
    /// Validates `rows` without writing anything.
    pub fn preview_import(&self, owner_id: &str, rows: &[RawRow]) -> ResultEngine<ImportPreview> {
        normalize_owner(owner_id)?;

        let mut preview = ImportPreview {
            total_rows: rows.len(),
            ..ImportPreview::default()
        };
        for prepared in prepare_rows(rows) {
            match prepared {
                Ok(candidate) => {
                    preview.valid_rows += 1;
                    preview.estimated_total =
                        preview.estimated_total.saturating_add(candidate.entry.amount);
                    if preview.sample_valid_entries.len() < PREVIEW_SAMPLE_SIZE {
                        preview.sample_valid_entries.push(candidate);
                    }
                }
                Err(err) => {
                    preview.invalid_rows += 1;
                    if preview.errors.len() < PREVIEW_MAX_ERRORS {
                        preview.errors.push(err);
                    }
                }
            }
        }
        tracing::debug!(
            owner_id,
            total = preview.total_rows,
            valid = preview.valid_rows,
            "import previewed"
        );
        Ok(preview)
    }

    /// Writes every valid row, each under its content-derived dedupe key.
    ///
    /// Rows are independent: an invalid row is reported and skipped, and a
    /// row already imported by a previous commit counts as a duplicate.
    pub async fn commit_import(&self, owner_id: &str, rows: &[RawRow]) -> ResultEngine<ImportResult> {
        let owner_id = normalize_owner(owner_id)?;

        let mut result = ImportResult {
            total_rows: rows.len(),
            ..ImportResult::default()
        };
        let mut errors = Vec::new();
        for prepared in prepare_rows(rows) {
            let ImportCandidate {
                line,
                entry,
                dedupe,
            } = match prepared {
                Ok(candidate) => candidate,
                Err(err) => {
                    errors.push(err);
                    continue;
                }
            };

            let valid = match validate_new_entry(entry) {
                Ok(valid) => valid,
                Err(err) => {
                    errors.push(row_error(line, rows, err));
                    continue;
                }
            };
            let outcome = insert_if_absent(
                &self.database,
                build_entry(owner_id.clone(), valid, Some(dedupe)),
            )
            .await;
            match outcome {
                Ok(outcome) => {
                    result.success_count += 1;
                    if outcome.created {
                        result.entry_ids.push(outcome.entry.id);
                    } else {
                        result.duplicate_count += 1;
                    }
                }
                Err(err) if err.is_retryable() => return Err(err),
                Err(err) => errors.push(row_error(line, rows, err)),
            }
        }

        result.error_count = errors.len();
        errors.truncate(COMMIT_MAX_ERRORS);
        result.errors = errors;

        tracing::info!(
            owner_id = %owner_id,
            total = result.total_rows,
            created = result.entry_ids.len(),
            duplicates = result.duplicate_count,
            errors = result.error_count,
            "import committed"
        );
        Ok(result)
    }
}

fn row_error(line: usize, rows: &[RawRow], err: EngineError) -> ImportRowError {
    ImportRowError {
        line,
        message: match err {
            EngineError::Validation(message) => message,
            other => other.to_string(),
        },
        fields: rows
            .iter()
            .find(|row| row.line == line)
            .map(|row| row.fields.clone())
            .unwrap_or_default(),
    }
}
