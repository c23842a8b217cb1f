use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Reports {
    Table,
    Id,
    ContentType,
    ContentId,
    ReporterId,
    Reason,
    Description,
    Resolved,
    ResolvedBy,
    ResolutionAction,
    ResolutionNotes,
    ResolvedAt,
    ReportedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reports::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Reports::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Reports::ContentType)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Reports::ContentId).integer().not_null())
                    .col(ColumnDef::new(Reports::ReporterId).integer().not_null())
                    .col(ColumnDef::new(Reports::Reason).string_len(50).not_null())
                    .col(ColumnDef::new(Reports::Description).text().null())
                    .col(
                        ColumnDef::new(Reports::Resolved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Reports::ResolvedBy).integer().null())
                    .col(
                        ColumnDef::new(Reports::ResolutionAction)
                            .string_len(20)
                            .null(),
                    )
                    .col(ColumnDef::new(Reports::ResolutionNotes).text().null())
                    .col(ColumnDef::new(Reports::ResolvedAt).timestamp().null())
                    .col(
                        ColumnDef::new(Reports::ReportedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Unresolved count per content item.
        manager
            .create_index(
                Index::create()
                    .name("idx_reports_content_resolved")
                    .table(Reports::Table)
                    .col(Reports::ContentType)
                    .col(Reports::ContentId)
                    .col(Reports::Resolved)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reports_resolved_reported_at")
                    .table(Reports::Table)
                    .col(Reports::Resolved)
                    .col(Reports::ReportedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // One report per reporter per content item, for all time.
        manager
            .create_index(
                Index::create()
                    .name("idx_reports_unique_reporter")
                    .table(Reports::Table)
                    .col(Reports::ReporterId)
                    .col(Reports::ContentType)
                    .col(Reports::ContentId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reports::Table).to_owned())
            .await
    }
}
