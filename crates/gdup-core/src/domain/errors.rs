//! Domain error types
//!
//! This module defines error types specific to domain operations:
//! identifier and hash validation, and audit line parsing.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid remote ID format
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Invalid content hash (expected 32 hex characters)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// An audit log line could not be parsed
    #[error("Invalid audit record: {0}")]
    InvalidAuditRecord(String),
}
