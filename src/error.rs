// Error kinds shared by every store operation
//
// Validation -> malformed or out-of-range input
// Reference  -> id that points at nothing (or a row still referenced)
// Conflict   -> uniqueness clash or a paid amount above the bill total

use rusqlite::ffi;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{entity} {id} not found or still referenced")]
    Reference { entity: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl LedgerError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        LedgerError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn reference(entity: &'static str, id: impl std::fmt::Display) -> Self {
        LedgerError::Reference {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, LedgerError::Validation { .. })
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, LedgerError::Reference { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerError::Conflict(_))
    }

    /// Translate a SQLite constraint failure into the matching domain error.
    ///
    /// Validators normally reject bad input before it reaches SQLite; this keeps
    /// the error kinds stable for writes that only the table constraints catch.
    pub fn from_constraint(err: rusqlite::Error, entity: &'static str) -> Self {
        if let rusqlite::Error::SqliteFailure(ref failure, ref message) = err {
            if failure.code == rusqlite::ErrorCode::ConstraintViolation {
                let detail = message.clone().unwrap_or_else(|| failure.to_string());
                return match failure.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        LedgerError::Conflict(format!("duplicate {}: {}", entity, detail))
                    }
                    // RESTRICT actions report the trigger code, not the foreign key one
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY | ffi::SQLITE_CONSTRAINT_TRIGGER => {
                        LedgerError::Reference { entity, id: detail }
                    }
                    _ => LedgerError::Validation {
                        field: entity.to_string(),
                        message: detail,
                    },
                };
            }
        }
        LedgerError::Storage(err)
    }
}
