//! Tenant entity model
//!
//! This module contains the SeaORM entity model for the tenants table,
//! the isolation boundary for users and files.

use chrono::Utc;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tenant entity representing an isolated customer account
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Display name supplied at registration
    pub name: String,

    /// URL-safe identifier derived from the name (unique)
    #[sea_orm(unique)]
    pub slug: String,

    pub plan: TenantPlan,

    /// End of the free trial for `demo` tenants
    pub trial_ends_at: Option<DateTimeWithTimeZone>,

    pub is_active: bool,

    pub created_at: DateTimeWithTimeZone,
}

/// Billing plan of a tenant.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum TenantPlan {
    #[sea_orm(string_value = "demo")]
    #[serde(rename = "demo")]
    #[default]
    Demo,

    #[sea_orm(string_value = "paid")]
    #[serde(rename = "paid")]
    Paid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user::Entity")]
    Users,

    #[sea_orm(has_many = "super::file::Entity")]
    Files,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Files.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// True when a `demo` tenant's trial has run out.
    pub fn trial_expired(&self) -> bool {
        self.plan == TenantPlan::Demo
            && self
                .trial_ends_at
                .is_some_and(|ends_at| ends_at.with_timezone(&Utc) < Utc::now())
    }
}

/// Derives a tenant slug from its display name.
///
/// Lowercases and trims the name, then turns spaces and underscores into hyphens.
pub fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '_' { '-' } else { c })
        .collect()
}
