//! # Data Models
//!
//! SeaORM entities for tenants, users and files, plus small API payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod file;
pub mod tenant;
pub mod user;

pub use file::Entity as File;
pub use tenant::Entity as Tenant;
pub use user::Entity as User;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "beam-analytics".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Liveness response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    #[schema(example = "ok")]
    pub status: String,
}
