use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum LedgerEntries {
    Table,
    Id,
    OwnerId,
    AmountMinor,
    Currency,
    Category,
    Description,
    OccurredOn,
    Tags,
    Notes,
    DedupeKind,
    DedupeValue,
    RuleId,
    DueDate,
    CreatedAt,
    UpdatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LedgerEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerEntries::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LedgerEntries::OwnerId).string().not_null())
                    .col(
                        ColumnDef::new(LedgerEntries::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LedgerEntries::Currency).string().not_null())
                    .col(ColumnDef::new(LedgerEntries::Category).string().not_null())
                    .col(
                        ColumnDef::new(LedgerEntries::Description)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LedgerEntries::OccurredOn).date().not_null())
                    .col(ColumnDef::new(LedgerEntries::Tags).text())
                    .col(ColumnDef::new(LedgerEntries::Notes).text())
                    .col(ColumnDef::new(LedgerEntries::DedupeKind).string())
                    .col(ColumnDef::new(LedgerEntries::DedupeValue).string())
                    .col(ColumnDef::new(LedgerEntries::RuleId).uuid())
                    .col(ColumnDef::new(LedgerEntries::DueDate).date())
                    .col(
                        ColumnDef::new(LedgerEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LedgerEntries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // NULL keys never collide, so entries without a dedupe key are not
        // constrained.
        manager
            .create_index(
                Index::create()
                    .name("uidx-ledger_entries-owner-dedupe")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::OwnerId)
                    .col(LedgerEntries::DedupeKind)
                    .col(LedgerEntries::DedupeValue)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uidx-ledger_entries-owner-rule-due")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::OwnerId)
                    .col(LedgerEntries::RuleId)
                    .col(LedgerEntries::DueDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-ledger_entries-owner-occurred_on")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::OwnerId)
                    .col(LedgerEntries::OccurredOn)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
            .await
    }
}
