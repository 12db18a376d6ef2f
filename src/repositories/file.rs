//! # File Repository
//!
//! Every read is scoped by tenant id; a file owned by another tenant is
//! indistinguishable from a missing one.

use crate::error::RepositoryError;
use crate::models::file::{
    self, ActiveModel as FileActiveModel, Column, Entity as File, FileType, Model,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

/// Metadata for a file whose bytes have already been stored
#[derive(Debug, Clone)]
pub struct NewFile {
    /// Pre-generated so the blob path can embed it
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub uploaded_by: Uuid,
    pub original_name: String,
    pub blob_path: String,
    pub file_type: FileType,
    pub size_bytes: i64,
}

/// Repository for File database operations
pub struct FileRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> FileRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Record an uploaded file with status `uploaded`
    pub async fn create_file(&self, new_file: NewFile) -> Result<Model, RepositoryError> {
        let record = FileActiveModel {
            id: Set(new_file.id),
            tenant_id: Set(new_file.tenant_id),
            uploaded_by: Set(new_file.uploaded_by),
            original_name: Set(new_file.original_name),
            blob_path: Set(new_file.blob_path),
            file_type: Set(new_file.file_type),
            size_bytes: Set(Some(new_file.size_bytes)),
            status: Set(file::STATUS_UPLOADED.to_string()),
            uploaded_at: Set(Utc::now().into()),
        };

        record
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// List a tenant's files, newest first
    pub async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Model>, RepositoryError> {
        File::find()
            .filter(Column::TenantId.eq(tenant_id))
            .order_by_desc(Column::UploadedAt)
            .order_by_desc(Column::Id)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Fetch a file only if it belongs to `tenant_id`
    pub async fn get_for_tenant(
        &self,
        tenant_id: Uuid,
        file_id: Uuid,
    ) -> Result<Option<Model>, RepositoryError> {
        File::find_by_id(file_id)
            .filter(Column::TenantId.eq(tenant_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Like [`Self::get_for_tenant`] but maps absence to `NotFound`
    pub async fn require_for_tenant(
        &self,
        tenant_id: Uuid,
        file_id: Uuid,
    ) -> Result<Model, RepositoryError> {
        self.get_for_tenant(tenant_id, file_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("File not found".to_string()))
    }
}
