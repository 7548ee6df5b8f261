//! Recurrence rules and due-date computation.
//!
//! A [`RecurrenceRule`] produces a deterministic stream of due dates: given
//! the same rule state and reference date, [`RecurrenceRule::next_due_date_after`]
//! always returns the same answer. The scheduler relies on this to make
//! repeated runs over the same window converge.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, Money, ResultEngine};

/// How often a rule fires, together with the anchor fields that frequency
/// needs. Each variant carries only its own anchors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frequency", rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly { weekday: Weekday },
    /// `day` is 1..=31; shorter months clamp to their last day.
    Monthly { day: u32 },
    /// `month` is 1..=12, `day` is 1..=31 with the same clamping as monthly.
    Yearly { month: u32, day: u32 },
}

impl Frequency {
    /// Builds a frequency from its flat storage/wire representation.
    ///
    /// `day_of_week` is 0 = Monday .. 6 = Sunday. Anchors that the frequency
    /// does not use must be absent.
    pub fn new(
        kind: &str,
        day_of_week: Option<i32>,
        day_of_month: Option<i32>,
        month_of_year: Option<i32>,
    ) -> ResultEngine<Self> {
        let forbid = |name: &str, value: Option<i32>| -> ResultEngine<()> {
            match value {
                Some(_) => Err(EngineError::RuleConfig(format!(
                    "{name} is not allowed for {kind} frequency"
                ))),
                None => Ok(()),
            }
        };
        let require = |name: &str, value: Option<i32>| -> ResultEngine<i32> {
            value.ok_or_else(|| {
                EngineError::RuleConfig(format!("{name} is required for {kind} frequency"))
            })
        };

        match kind.trim().to_ascii_lowercase().as_str() {
            "daily" => {
                forbid("day_of_week", day_of_week)?;
                forbid("day_of_month", day_of_month)?;
                forbid("month_of_year", month_of_year)?;
                Ok(Frequency::Daily)
            }
            "weekly" => {
                forbid("day_of_month", day_of_month)?;
                forbid("month_of_year", month_of_year)?;
                let weekday = weekday_from_index(require("day_of_week", day_of_week)?)?;
                Ok(Frequency::Weekly { weekday })
            }
            "monthly" => {
                forbid("day_of_week", day_of_week)?;
                forbid("month_of_year", month_of_year)?;
                let day = checked_anchor("day_of_month", require("day_of_month", day_of_month)?, 31)?;
                Ok(Frequency::Monthly { day })
            }
            "yearly" => {
                forbid("day_of_week", day_of_week)?;
                let day = checked_anchor("day_of_month", require("day_of_month", day_of_month)?, 31)?;
                let month =
                    checked_anchor("month_of_year", require("month_of_year", month_of_year)?, 12)?;
                Ok(Frequency::Yearly { month, day })
            }
            other => Err(EngineError::RuleConfig(format!(
                "unknown frequency: {other}"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly { .. } => "weekly",
            Self::Monthly { .. } => "monthly",
            Self::Yearly { .. } => "yearly",
        }
    }

    /// Human readable description, e.g. `Monthly on day 31`.
    pub fn label(self) -> String {
        match self {
            Self::Daily => "Daily".to_string(),
            Self::Weekly { weekday } => format!("Weekly on {weekday}"),
            Self::Monthly { day } => format!("Monthly on day {day}"),
            Self::Yearly { month, day } => format!("Yearly on {month:02}-{day:02}"),
        }
    }

    pub fn day_of_week(self) -> Option<i32> {
        match self {
            Self::Weekly { weekday } => Some(weekday.num_days_from_monday() as i32),
            _ => None,
        }
    }

    pub fn day_of_month(self) -> Option<i32> {
        match self {
            Self::Monthly { day } | Self::Yearly { day, .. } => Some(day as i32),
            _ => None,
        }
    }

    pub fn month_of_year(self) -> Option<i32> {
        match self {
            Self::Yearly { month, .. } => Some(month as i32),
            _ => None,
        }
    }

    /// Smallest date `>= from` matching this frequency.
    ///
    /// Returns `None` only when the calendar overflows.
    pub fn first_on_or_after(self, from: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Daily => Some(from),
            Self::Weekly { weekday } => {
                let target = weekday.num_days_from_monday();
                let current = from.weekday().num_days_from_monday();
                let offset = (target + 7 - current) % 7;
                from.checked_add_days(Days::new(u64::from(offset)))
            }
            Self::Monthly { day } => {
                let candidate = clamped_date(from.year(), from.month(), day)?;
                if candidate >= from {
                    return Some(candidate);
                }
                let next = first_of_month(from.year(), from.month())?
                    .checked_add_months(Months::new(1))?;
                clamped_date(next.year(), next.month(), day)
            }
            Self::Yearly { month, day } => {
                let candidate = clamped_date(from.year(), month, day)?;
                if candidate >= from {
                    return Some(candidate);
                }
                clamped_date(from.year().checked_add(1)?, month, day)
            }
        }
    }
}

fn weekday_from_index(index: i32) -> ResultEngine<Weekday> {
    u8::try_from(index)
        .ok()
        .and_then(|i| Weekday::try_from(i).ok())
        .ok_or_else(|| {
            EngineError::RuleConfig(format!(
                "day_of_week must be 0 (Monday) ..= 6 (Sunday), got {index}"
            ))
        })
}

fn checked_anchor(name: &str, value: i32, max: u32) -> ResultEngine<u32> {
    match u32::try_from(value) {
        Ok(v) if (1..=max).contains(&v) => Ok(v),
        _ => Err(EngineError::RuleConfig(format!(
            "{name} must be between 1 and {max}, got {value}"
        ))),
    }
}

fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = first_of_month(year, month)?;
    let next = first.checked_add_months(Months::new(1))?;
    u32::try_from(next.signed_duration_since(first).num_days()).ok()
}

/// `year-month-day`, with `day` clamped to the last day of the month.
fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = days_in_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.min(last))
}

/// A template that materializes one ledger entry per due date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub id: Uuid,
    pub owner_id: String,
    pub amount: Money,
    pub currency: Currency,
    pub category: String,
    pub description: String,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    /// Inclusive; `None` means the rule never ends.
    pub end_date: Option<NaiveDate>,
    /// Latest due date already materialized.
    pub last_processed: Option<NaiveDate>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl RecurrenceRule {
    /// Next due date not yet processed, if it falls on or before `reference`.
    ///
    /// The candidate is the smallest date `>= max(start_date, last_processed + 1)`
    /// matching the frequency. Inactive rules and rules past their end date
    /// yield `None`.
    pub fn next_due_date_after(&self, reference: NaiveDate) -> Option<NaiveDate> {
        if !self.active {
            return None;
        }
        let lower = match self.last_processed {
            Some(last) => last.succ_opt()?.max(self.start_date),
            None => self.start_date,
        };
        let due = self.frequency.first_on_or_after(lower)?;
        if due > reference || self.end_date.is_some_and(|end| due > end) {
            return None;
        }
        Some(due)
    }

    /// All due dates up to `reference`, in chronological order, as the
    /// scheduler would materialize them.
    pub fn due_dates_through(&self, reference: NaiveDate) -> Vec<NaiveDate> {
        let mut cursor = self.clone();
        let mut out = Vec::new();
        while let Some(due) = cursor.next_due_date_after(reference) {
            out.push(due);
            cursor.last_processed = Some(due);
        }
        out
    }
}
