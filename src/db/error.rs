//! Database error types.
//!
//! This module provides abstracted error types for database operations.
//! It uses miette for fancy diagnostic output and thiserror for derive macros.
//! The error types are storage-backend agnostic.

use miette::Diagnostic;
use thiserror::Error;

/// Database operation errors.
#[derive(Error, Diagnostic, Debug)]
pub enum DbError {
    #[error("Entity not found: {entity_type} with id '{id}'")]
    #[diagnostic(code(epicme::db::not_found))]
    NotFound { entity_type: String, id: String },

    #[error("Entity already exists: {entity_type} with id '{id}'")]
    #[diagnostic(code(epicme::db::already_exists))]
    AlreadyExists { entity_type: String, id: String },

    #[error("Validation error: {message}")]
    #[diagnostic(code(epicme::db::validation_error))]
    Validation { message: String },

    #[error("Database error: {message}")]
    #[diagnostic(code(epicme::db::database_error))]
    Database { message: String },

    #[error("Migration error: {message}")]
    #[diagnostic(code(epicme::db::migration_error))]
    Migration { message: String },

    #[error("Connection error: {message}")]
    #[diagnostic(code(epicme::db::connection_error))]
    Connection { message: String },

    #[error("Constraint violation: {message}")]
    #[diagnostic(code(epicme::db::constraint))]
    Constraint { message: String },
}

impl DbError {
    pub fn not_found(entity_type: &str, id: impl ToString) -> Self {
        DbError::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }

    /// True when the error means the addressed row does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
