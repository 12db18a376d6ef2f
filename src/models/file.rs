//! File entity model
//!
//! Metadata for an uploaded spreadsheet. The bytes live in blob storage under
//! `blob_path`.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Status assigned to freshly uploaded files.
pub const STATUS_UPLOADED: &str = "uploaded";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    /// User that uploaded the file (same tenant)
    pub uploaded_by: Uuid,

    pub original_name: String,

    pub blob_path: String,

    pub file_type: FileType,

    pub size_bytes: Option<i64>,

    pub status: String,

    pub uploaded_at: DateTimeWithTimeZone,
}

/// Detected tabular format of an upload.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum FileType {
    #[sea_orm(string_value = "csv")]
    #[serde(rename = "csv")]
    Csv,

    #[sea_orm(string_value = "xlsx")]
    #[serde(rename = "xlsx")]
    Xlsx,
}

impl FileType {
    /// `csv` when the name ends in `.csv` (any case), otherwise `xlsx`.
    pub fn detect(filename: &str) -> Self {
        if filename.to_ascii_lowercase().ends_with(".csv") {
            FileType::Csv
        } else {
            FileType::Xlsx
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UploadedBy",
        to = "super::user::Column::Id"
    )]
    Uploader,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Uploader.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Public representation of a file returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileResponse {
    pub id: Uuid,
    pub original_name: String,
    #[schema(value_type = String, format = DateTime)]
    pub uploaded_at: DateTimeWithTimeZone,
    pub status: String,
    pub size_bytes: Option<i64>,
}

impl From<Model> for FileResponse {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            original_name: model.original_name,
            uploaded_at: model.uploaded_at,
            status: model.status,
            size_bytes: model.size_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_file_type() {
        assert_eq!(FileType::detect("sales.CSV"), FileType::Csv);
        assert_eq!(FileType::detect("sales.xlsx"), FileType::Xlsx);
        assert_eq!(FileType::detect("legacy.xls"), FileType::Xlsx);
    }
}
