//! # Tenant Repository
//!
//! This module contains the repository implementation for Tenant entities.

use crate::error::RepositoryError;
use crate::models::tenant::{
    ActiveModel as TenantActiveModel, Column, Entity as Tenant, Model as TenantModel, TenantPlan,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use uuid::Uuid;

/// Request data for creating a new tenant
#[derive(Debug, Clone)]
pub struct CreateTenantRequest {
    /// Display name for the tenant
    pub name: String,
    /// Unique slug derived from the name
    pub slug: String,
    pub plan: TenantPlan,
    pub trial_ends_at: Option<DateTime<Utc>>,
}

/// Repository for Tenant database operations
pub struct TenantRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> TenantRepository<'a, C> {
    /// Create a new TenantRepository with the given database connection or transaction
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Create a new tenant
    pub async fn create_tenant(
        &self,
        request: CreateTenantRequest,
    ) -> Result<TenantModel, RepositoryError> {
        self.validate_tenant_name(&request.name)?;

        let tenant = TenantActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            slug: Set(request.slug),
            plan: Set(request.plan),
            trial_ends_at: Set(request.trial_ends_at.map(Into::into)),
            is_active: Set(true),
            created_at: Set(Utc::now().into()),
        };

        tenant
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Get tenant by ID
    pub async fn get_tenant_by_id(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<TenantModel>, RepositoryError> {
        Tenant::find_by_id(tenant_id)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Check whether a slug is already taken
    pub async fn slug_exists(&self, slug: &str) -> Result<bool, RepositoryError> {
        let count = Tenant::find()
            .filter(Column::Slug.eq(slug))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(count > 0)
    }

    /// Mark a tenant active or inactive
    pub async fn set_active(
        &self,
        tenant_id: Uuid,
        is_active: bool,
    ) -> Result<TenantModel, RepositoryError> {
        let tenant = self
            .get_tenant_by_id(tenant_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("Tenant not found".to_string()))?;

        let mut active: TenantActiveModel = tenant.into();
        active.is_active = Set(is_active);

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Change plan and trial end for a tenant
    pub async fn update_plan(
        &self,
        tenant_id: Uuid,
        plan: TenantPlan,
        trial_ends_at: Option<DateTime<Utc>>,
    ) -> Result<TenantModel, RepositoryError> {
        let tenant = self
            .get_tenant_by_id(tenant_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("Tenant not found".to_string()))?;

        let mut active: TenantActiveModel = tenant.into();
        active.plan = Set(plan);
        active.trial_ends_at = Set(trial_ends_at.map(Into::into));

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    fn validate_tenant_name(&self, name: &str) -> Result<(), RepositoryError> {
        if name.trim().is_empty() {
            return Err(RepositoryError::validation_error(
                "Tenant name cannot be empty",
            ));
        }

        if name.chars().count() > 200 {
            return Err(RepositoryError::validation_error(
                "Tenant name cannot exceed 200 characters",
            ));
        }

        Ok(())
    }
}
