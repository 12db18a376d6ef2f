//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations. Each takes
//! any [`sea_orm::ConnectionTrait`], so callers can run them inside a
//! transaction.

pub mod file;
pub mod tenant;
pub mod user;

pub use file::{FileRepository, NewFile};
pub use tenant::{CreateTenantRequest, TenantRepository};
pub use user::{CreateUserRequest, UserRepository};
