//! Scalar SQL functions backed by Rust crates.

use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, Error};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Registers `regexp(pattern, text)` on `conn`.
///
/// Uses `regex` crate syntax, unanchored and case-sensitive. A `NULL` text
/// never matches. Compiled patterns are cached per statement.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let pattern = ctx.get_or_create_aux(0, |raw| -> Result<Regex, BoxError> {
                Ok(Regex::new(raw.as_str()?)?)
            })?;
            let text = ctx
                .get_raw(1)
                .as_str_or_null()
                .map_err(|err| Error::UserFunctionError(err.into()))?;
            Ok(text.is_some_and(|text| pattern.is_match(text)))
        },
    )
}
