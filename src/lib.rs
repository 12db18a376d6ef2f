//! # Beam Analytics Library
//!
//! Multi-tenant backend for uploading spreadsheets and computing descriptive
//! analytics over them: authentication, tenant-scoped file storage, the
//! insights pipeline, AI summaries and the direct-upload ingest surface.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod insights;
pub mod models;
pub mod password;
pub mod repositories;
pub mod server;
pub mod storage;
pub mod summary;
pub mod telemetry;
pub mod tokens;
pub mod webhook;
pub use migration;
