//! # User Repository

use crate::error::RepositoryError;
use crate::models::user::{ActiveModel as UserActiveModel, Column, Entity as User, Model, UserRole};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

/// Request data for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub tenant_id: Uuid,
    /// Already normalized (trimmed, lowercase)
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
}

/// Repository for User database operations
pub struct UserRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> UserRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Insert a new active user.
    ///
    /// # Returns
    ///
    /// `RepositoryError::Conflict` when the email is already registered.
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<Model, RepositoryError> {
        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(request.tenant_id),
            email: Set(request.email),
            password_hash: Set(request.password_hash),
            role: Set(request.role),
            is_active: Set(true),
            created_at: Set(Utc::now().into()),
        };

        user.insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn get_by_id(&self, user_id: Uuid) -> Result<Option<Model>, RepositoryError> {
        User::find_by_id(user_id)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Model>, RepositoryError> {
        User::find()
            .filter(Column::Email.eq(email))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Deactivate or reactivate a user
    pub async fn set_active(&self, user_id: Uuid, is_active: bool) -> Result<Model, RepositoryError> {
        let user = self
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("User not found".to_string()))?;

        let mut active: UserActiveModel = user.into();
        active.is_active = Set(is_active);

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
