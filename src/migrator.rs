#![allow(elided_lifetimes_in_paths)]

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_commission_table::Migration),
            Box::new(m20250101_000002_create_commission_adjustment_table::Migration),
            Box::new(m20250101_000003_create_commission_summary_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250101_000001_create_commission_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_commission_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Commission::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Commission::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Commission::StaffId).uuid().not_null())
                        .col(ColumnDef::new(Commission::BranchId).uuid().not_null())
                        .col(ColumnDef::new(Commission::AppointmentId).uuid().not_null())
                        .col(ColumnDef::new(Commission::ServiceId).uuid().not_null())
                        .col(
                            ColumnDef::new(Commission::CommissionType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Commission::Rate).decimal().not_null())
                        .col(ColumnDef::new(Commission::BaseAmount).decimal().not_null())
                        .col(
                            ColumnDef::new(Commission::Amount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Commission::Status).string().not_null())
                        .col(
                            ColumnDef::new(Commission::CalculatedOn)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Commission::ApprovedBy).uuid().null())
                        .col(ColumnDef::new(Commission::ApprovedAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Commission::LockedAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Commission::ReversedAt).timestamp_with_time_zone().null())
                        .col(
                            ColumnDef::new(Commission::IsManual)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Commission::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Commission::UpdatedAt).timestamp_with_time_zone().null())
                        .col(
                            ColumnDef::new(Commission::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            // Scope selection for summaries and reports
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_commission_scope")
                        .table(Commission::Table)
                        .col(Commission::StaffId)
                        .col(Commission::BranchId)
                        .col(Commission::CalculatedOn)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_commission_status")
                        .table(Commission::Table)
                        .col(Commission::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_commission_calculated_on")
                        .table(Commission::Table)
                        .col(Commission::CalculatedOn)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Commission::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Commission {
        Table,
        Id,
        StaffId,
        BranchId,
        AppointmentId,
        ServiceId,
        CommissionType,
        Rate,
        BaseAmount,
        Amount,
        Status,
        CalculatedOn,
        ApprovedBy,
        ApprovedAt,
        LockedAt,
        ReversedAt,
        IsManual,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20250101_000002_create_commission_adjustment_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_commission_adjustment_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CommissionAdjustment::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CommissionAdjustment::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionAdjustment::CommissionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionAdjustment::Sequence)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionAdjustment::PreviousAmount)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionAdjustment::NewAmount)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionAdjustment::Reason)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionAdjustment::AdjustmentType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionAdjustment::AppliedBy)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionAdjustment::AppliedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_commission_adjustment_trail")
                        .table(CommissionAdjustment::Table)
                        .col(CommissionAdjustment::CommissionId)
                        .col(CommissionAdjustment::Sequence)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CommissionAdjustment::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CommissionAdjustment {
        Table,
        Id,
        CommissionId,
        Sequence,
        PreviousAmount,
        NewAmount,
        Reason,
        AdjustmentType,
        AppliedBy,
        AppliedAt,
    }
}

mod m20250101_000003_create_commission_summary_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_commission_summary_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CommissionSummary::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CommissionSummary::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CommissionSummary::StaffId).uuid().not_null())
                        .col(
                            ColumnDef::new(CommissionSummary::BranchId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionSummary::Month)
                                .string_len(7)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionSummary::TotalServices)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(CommissionSummary::TotalCommission)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(CommissionSummary::AverageCommission)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(CommissionSummary::Status).string().not_null())
                        .col(
                            ColumnDef::new(CommissionSummary::GeneratedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CommissionSummary::ApprovedBy).uuid().null())
                        .col(
                            ColumnDef::new(CommissionSummary::ApprovedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(CommissionSummary::LockedAt).timestamp_with_time_zone().null())
                        .col(
                            ColumnDef::new(CommissionSummary::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CommissionSummary::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_commission_summary_scope")
                        .table(CommissionSummary::Table)
                        .col(CommissionSummary::StaffId)
                        .col(CommissionSummary::BranchId)
                        .col(CommissionSummary::Month)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_commission_summary_month")
                        .table(CommissionSummary::Table)
                        .col(CommissionSummary::Month)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CommissionSummary::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CommissionSummary {
        Table,
        Id,
        StaffId,
        BranchId,
        Month,
        TotalServices,
        TotalCommission,
        AverageCommission,
        Status,
        GeneratedAt,
        ApprovedBy,
        ApprovedAt,
        LockedAt,
        CreatedAt,
        Version,
    }
}
