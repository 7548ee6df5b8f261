use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum RecurringRules {
    Table,
    Id,
    OwnerId,
    AmountMinor,
    Currency,
    Category,
    Description,
    Frequency,
    DayOfWeek,
    DayOfMonth,
    MonthOfYear,
    StartDate,
    EndDate,
    LastProcessed,
    Active,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RecurringRules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RecurringRules::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RecurringRules::OwnerId).string().not_null())
                    .col(
                        ColumnDef::new(RecurringRules::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RecurringRules::Currency).string().not_null())
                    .col(ColumnDef::new(RecurringRules::Category).string().not_null())
                    .col(
                        ColumnDef::new(RecurringRules::Description)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RecurringRules::Frequency)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RecurringRules::DayOfWeek).integer())
                    .col(ColumnDef::new(RecurringRules::DayOfMonth).integer())
                    .col(ColumnDef::new(RecurringRules::MonthOfYear).integer())
                    .col(ColumnDef::new(RecurringRules::StartDate).date().not_null())
                    .col(ColumnDef::new(RecurringRules::EndDate).date())
                    .col(ColumnDef::new(RecurringRules::LastProcessed).date())
                    .col(
                        ColumnDef::new(RecurringRules::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(RecurringRules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-recurring_rules-owner-active")
                    .table(RecurringRules::Table)
                    .col(RecurringRules::OwnerId)
                    .col(RecurringRules::Active)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RecurringRules::Table).to_owned())
            .await
    }
}
