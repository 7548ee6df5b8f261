//! Storage for recurrence rules.

use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{Currency, EngineError, Frequency, Money, RecurrenceRule};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "recurring_rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub category: String,
    pub description: String,
    pub frequency: String,
    pub day_of_week: Option<i32>,
    pub day_of_month: Option<i32>,
    pub month_of_year: Option<i32>,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub last_processed: Option<Date>,
    pub active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&RecurrenceRule> for ActiveModel {
    fn from(rule: &RecurrenceRule) -> Self {
        Self {
            id: ActiveValue::Set(rule.id),
            owner_id: ActiveValue::Set(rule.owner_id.clone()),
            amount_minor: ActiveValue::Set(rule.amount.minor()),
            currency: ActiveValue::Set(rule.currency.code().to_string()),
            category: ActiveValue::Set(rule.category.clone()),
            description: ActiveValue::Set(rule.description.clone()),
            frequency: ActiveValue::Set(rule.frequency.as_str().to_string()),
            day_of_week: ActiveValue::Set(rule.frequency.day_of_week()),
            day_of_month: ActiveValue::Set(rule.frequency.day_of_month()),
            month_of_year: ActiveValue::Set(rule.frequency.month_of_year()),
            start_date: ActiveValue::Set(rule.start_date),
            end_date: ActiveValue::Set(rule.end_date),
            last_processed: ActiveValue::Set(rule.last_processed),
            active: ActiveValue::Set(rule.active),
            created_at: ActiveValue::Set(rule.created_at),
        }
    }
}

impl TryFrom<Model> for RecurrenceRule {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let frequency = Frequency::new(
            &model.frequency,
            model.day_of_week,
            model.day_of_month,
            model.month_of_year,
        )?;
        Ok(Self {
            id: model.id,
            owner_id: model.owner_id,
            amount: Money::new(model.amount_minor),
            currency: Currency::try_from(model.currency.as_str())?,
            category: model.category,
            description: model.description,
            frequency,
            start_date: model.start_date,
            end_date: model.end_date,
            last_processed: model.last_processed,
            active: model.active,
            created_at: model.created_at,
        })
    }
}
