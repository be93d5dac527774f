//! Domain entities
//!
//! This module contains the core domain types for gdup:
//! - Newtypes for type-safe identifiers and content hashes
//! - Audit records written once per remote operation
//! - Upload tasks handed from the walker to the workers
//! - Domain-specific error types

pub mod audit;
pub mod errors;
pub mod newtypes;
pub mod task;

// Re-export commonly used types
pub use audit::{AuditOperation, AuditRecord, StatusCode};
pub use errors::DomainError;
pub use newtypes::*;
pub use task::UploadTask;
