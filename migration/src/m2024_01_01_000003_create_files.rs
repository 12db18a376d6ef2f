//! Migration to create the files table.
//!
//! Stores metadata for uploaded spreadsheets; the bytes live in blob storage
//! under `blob_path`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Files::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Files::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Files::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Files::UploadedBy).uuid().not_null())
                    .col(ColumnDef::new(Files::OriginalName).string_len(255).not_null())
                    .col(ColumnDef::new(Files::BlobPath).string_len(500).not_null())
                    .col(ColumnDef::new(Files::FileType).string_len(20).not_null())
                    .col(ColumnDef::new(Files::SizeBytes).big_integer().null())
                    .col(
                        ColumnDef::new(Files::Status)
                            .string_len(30)
                            .not_null()
                            .default("uploaded"),
                    )
                    .col(
                        ColumnDef::new(Files::UploadedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_files_tenant_id")
                            .from(Files::Table, Files::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_files_uploaded_by")
                            .from(Files::Table, Files::UploadedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Listing is always tenant-scoped and newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_files_tenant_uploaded_at")
                    .table(Files::Table)
                    .col(Files::TenantId)
                    .col(Files::UploadedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_files_tenant_uploaded_at")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Files::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Files {
    Table,
    Id,
    TenantId,
    UploadedBy,
    OriginalName,
    BlobPath,
    FileType,
    SizeBytes,
    Status,
    UploadedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
