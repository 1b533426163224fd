//! SQLite storage bootstrap.
//!
//! # Responsibility
//! - Open and configure SQLite connections.
//! - Create entity tables from definitions.
//! - Register SQL functions the SQLite mapper relies on.
//!
//! # Invariants
//! - Identifiers reaching SQL text are validated by the definition loader
//!   and always quoted.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod functions;
mod open;
mod schema;

pub use functions::register_functions;
pub use open::{open_db, open_db_in_memory};
pub use schema::{ensure_table, ensure_tables, quote_identifier};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
