//! Bulk import of externally produced rows.
//!
//! Rows are parsed one by one: a malformed row turns into an
//! [`ImportRowError`] and never prevents the other rows from being imported.
//! Every valid row gets a content-derived [`DedupeKey::Import`], so committing
//! the same file twice leaves the ledger unchanged the second time.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    Currency, DedupeKey, EngineError, Money, NewEntry, ResultEngine,
    util::{MAX_CATEGORY_LEN, MAX_DESCRIPTION_LEN, MAX_NOTES_LEN, MAX_TAGS, parse_entry_date},
};

pub const REQUIRED_COLUMNS: [&str; 4] = ["date", "category", "description", "amount"];

/// Symbols stripped from amounts before parsing.
const CURRENCY_SYMBOLS: [char; 5] = ['₹', '$', '€', '£', '¥'];

/// One raw input row, keyed by lowercase column name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    /// Line number in the source file, used to report errors.
    pub line: usize,
    pub fields: BTreeMap<String, String>,
}

impl RawRow {
    pub fn new<I, K, V>(line: usize, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            line,
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.as_ref().trim().to_lowercase(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(|v| v.trim()).unwrap_or("")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRowError {
    pub line: usize,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

/// A row that passed validation, with the key it will be written under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCandidate {
    pub line: usize,
    pub entry: NewEntry,
    pub dedupe: DedupeKey,
}

/// Splits CSV text into rows. The header row is required and must contain
/// every column of [`REQUIRED_COLUMNS`]; `currency`, `tags` and `notes` are
/// optional.
pub fn parse_csv(text: &str) -> ResultEngine<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| EngineError::Validation(format!("CSV parsing error: {err}")))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(EngineError::Validation(
            "no headers found in CSV file".to_string(),
        ));
    }
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .into_iter()
        .filter(|c| !headers.iter().any(|h| h == c))
        .collect();
    if !missing.is_empty() {
        return Err(EngineError::Validation(format!(
            "missing required columns: {}",
            missing.join(", ")
        )));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|err| EngineError::Validation(format!("CSV parsing error: {err}")))?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(rows.len() + 2);
        rows.push(RawRow::new(line, headers.iter().zip(record.iter())));
    }
    Ok(rows)
}

/// Validates one row into entry data.
pub fn parse_row(row: &RawRow) -> ResultEngine<NewEntry> {
    let occurred_on = parse_entry_date(row.get("date"))?;

    let raw_amount = row.get("amount");
    let cleaned: String = raw_amount
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',')
        .collect();
    let amount: Money = cleaned
        .parse()
        .map_err(|_| EngineError::Validation(format!("invalid amount: {raw_amount}")))?;
    if !amount.is_positive() {
        return Err(EngineError::Validation(
            "amount must be positive".to_string(),
        ));
    }

    let category = row.get("category");
    if category.is_empty() || category.chars().count() > MAX_CATEGORY_LEN {
        return Err(EngineError::Validation(format!(
            "category is required (max {MAX_CATEGORY_LEN} chars)"
        )));
    }
    let description = row.get("description");
    if description.is_empty() || description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(EngineError::Validation(format!(
            "description is required (max {MAX_DESCRIPTION_LEN} chars)"
        )));
    }

    // Unknown currencies fall back to the default rather than rejecting the row.
    let currency = Currency::try_from(row.get("currency")).unwrap_or_default();

    let tags = row
        .get("tags")
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .take(MAX_TAGS);

    let mut entry = NewEntry::new(amount, category, description, occurred_on)
        .currency(currency)
        .tags(tags);
    let notes = row.get("notes");
    if !notes.is_empty() && notes.chars().count() <= MAX_NOTES_LEN {
        entry = entry.notes(notes);
    }
    Ok(entry)
}

/// Hash of the fields that identify an imported expense.
///
/// `ordinal` distinguishes identical rows within the same file: the n-th copy
/// of a row always maps to the same key.
pub fn content_hash(entry: &NewEntry, ordinal: usize) -> String {
    let date = entry.occurred_on.to_string();
    let category = entry.category.to_lowercase();
    let amount = entry.amount.minor().to_string();
    let ordinal = ordinal.to_string();
    let fields = [
        date.as_str(),
        category.as_str(),
        entry.description.as_str(),
        amount.as_str(),
        entry.currency.code(),
        ordinal.as_str(),
    ];

    // Each field is length-prefixed so no separator inside free text can
    // shift bytes from one field to the next.
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Validates every row independently.
pub fn prepare_rows(rows: &[RawRow]) -> Vec<Result<ImportCandidate, ImportRowError>> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    rows.iter()
        .map(|row| match parse_row(row) {
            Ok(entry) => {
                let base = content_hash(&entry, 0);
                let ordinal = seen.entry(base).or_insert(0);
                let hash = content_hash(&entry, *ordinal);
                *ordinal += 1;
                Ok(ImportCandidate {
                    line: row.line,
                    entry,
                    dedupe: DedupeKey::Import { hash },
                })
            }
            Err(err) => Err(ImportRowError {
                line: row.line,
                message: match err {
                    EngineError::Validation(message) => message,
                    other => other.to_string(),
                },
                fields: row.fields.clone(),
            }),
        })
        .collect()
}
