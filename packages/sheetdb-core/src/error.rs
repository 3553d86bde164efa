//! Record engine error types.

use serde::Serialize;
use thiserror::Error;

/// Field-level validation errors.
///
/// These are always recovered locally: the form controller attaches them to
/// the offending field instead of propagating them.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldError {
    /// Non-nullable field left empty
    #[error("Field '{field}' is required")]
    Required { field: String },

    /// Value does not match the column's declared type
    #[error("Field '{field}' expects {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    /// Lookup value is not a number or not one of the loaded options
    #[error("Field '{field}' references unknown key {value}")]
    ReferentialIntegrity { field: String, value: String },

    /// Manually assigned primary key already used by another row
    #[error("Field '{field}' key {value} already exists")]
    DuplicateKey { field: String, value: i64 },

    /// Image URL could not be loaded
    #[error("Field '{field}' image '{url}' is unreachable: {reason}")]
    UnreachableResource {
        field: String,
        url: String,
        reason: String,
    },
}

impl FieldError {
    /// Returns the name of the field this error is attached to.
    pub fn field(&self) -> &str {
        match self {
            FieldError::Required { field }
            | FieldError::TypeMismatch { field, .. }
            | FieldError::ReferentialIntegrity { field, .. }
            | FieldError::DuplicateKey { field, .. }
            | FieldError::UnreachableResource { field, .. } => field,
        }
    }
}

/// Column creation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// Column name collides (case-insensitive, trimmed) with an existing column
    #[error("Column '{name}' already exists in table {table}")]
    DuplicateName { table: u64, name: String },

    /// Column-count or primary-key cap reached
    #[error("Schema limit reached for table {table}: {reason}")]
    SchemaLimit { table: u64, reason: String },

    /// Formula definition is malformed or references a non-numeric column
    #[error("Invalid formula for column '{column}': {reason}")]
    InvalidFormula { column: String, reason: String },

    /// Lookup column without a target table
    #[error("Invalid lookup for column '{column}': {reason}")]
    InvalidLookup { column: String, reason: String },

    /// Column name is empty after trimming
    #[error("Column name must not be empty")]
    EmptyName,
}

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Field errors collected by a full-record validation pass, in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an error.
    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// First failing field, in column order.
    pub fn first(&self) -> Option<&FieldError> {
        self.errors.first()
    }

    /// Error attached to `field`, if any.
    pub fn get(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field() == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl From<Vec<FieldError>> for ValidationErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }
}

impl IntoIterator for ValidationErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.errors.first() {
            Some(first) if self.errors.len() > 1 => {
                write!(f, "{} (and {} more)", first, self.errors.len() - 1)
            }
            Some(first) => write!(f, "{}", first),
            None => f.write_str("no validation errors"),
        }
    }
}
