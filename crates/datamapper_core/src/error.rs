//! Typed failure taxonomy for repository, finder and mapper operations.
//!
//! # Responsibility
//! - Separate the single-result "not found" signal from general ORM failures.
//! - Wrap backend errors so driver types never cross the mapper boundary.
//!
//! # Invariants
//! - Collection queries never produce `EntityNotFound`.
//! - `InvalidOperator` is raised when a query executes, not while it is built.

use crate::db::DbError;
use crate::definition::DefinitionError;
use crate::value::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type OrmResult<T> = Result<T, OrmError>;

#[derive(Debug)]
pub enum OrmError {
    /// A single-result query matched zero records.
    EntityNotFound { entity: String, criteria: String },
    /// A filter referenced an operator outside the closed operator set.
    InvalidOperator(String),
    /// Delete/update was requested for an entity that was never persisted.
    MissingIdentity { entity: String },
    /// The identity does not correspond to a stored record.
    UnknownIdentity { entity: String, id: Value },
    /// An insert carried an identity that is already stored.
    DuplicateIdentity { entity: String, id: Value },
    /// No definition is registered under this entity name.
    UnknownEntity(String),
    UnknownField { entity: String, field: String },
    UnknownRelation { entity: String, relation: String },
    /// An entity of one type was handed to a repository of another.
    EntityMismatch { expected: String, actual: String },
    InvalidQuery(String),
    /// A row or entity could not be converted using its definition.
    Build { entity: String, message: String },
    Definition(DefinitionError),
    Storage(DbError),
}

impl OrmError {
    /// Returns `true` for the single-result not-found signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntityNotFound { .. })
    }

    pub(crate) fn build(entity: &str, message: impl Into<String>) -> Self {
        Self::Build {
            entity: entity.to_string(),
            message: message.into(),
        }
    }
}

impl Display for OrmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntityNotFound { entity, criteria } => {
                write!(f, "{entity} not found ({criteria})")
            }
            Self::InvalidOperator(name) => write!(f, "invalid operator `{name}`"),
            Self::MissingIdentity { entity } => {
                write!(f, "{entity} has no identity and was never persisted")
            }
            Self::UnknownIdentity { entity, id } => {
                write!(f, "{entity} with identity {id} does not exist")
            }
            Self::DuplicateIdentity { entity, id } => {
                write!(f, "{entity} with identity {id} already exists")
            }
            Self::UnknownEntity(name) => write!(f, "unknown entity `{name}`"),
            Self::UnknownField { entity, field } => {
                write!(f, "entity `{entity}` has no field `{field}`")
            }
            Self::UnknownRelation { entity, relation } => {
                write!(f, "entity `{entity}` has no relation `{relation}`")
            }
            Self::EntityMismatch { expected, actual } => {
                write!(f, "repository for `{expected}` cannot handle `{actual}` entities")
            }
            Self::InvalidQuery(message) => write!(f, "invalid query: {message}"),
            Self::Build { entity, message } => {
                write!(f, "cannot build `{entity}` entity: {message}")
            }
            Self::Definition(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OrmError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Definition(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DefinitionError> for OrmError {
    fn from(value: DefinitionError) -> Self {
        Self::Definition(value)
    }
}

impl From<DbError> for OrmError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for OrmError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(value))
    }
}
