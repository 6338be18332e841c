//! Identifier validation and quoting, and literal rendering for scripts.
//!
//! Identifiers (table, column names) cannot be bound as parameters, so every
//! name that reaches statement text goes through [`quote_ident`]. Values are
//! always bound as parameters on the live path; [`quote_literal`] exists only
//! for snapshot scripts, which are replayed outside parameter binding.
//!
//! Table and column names in the grocery schema are Cyrillic, so validation
//! is deliberately byte-length based and does not restrict the alphabet.

use crate::error::AppError;

/// PostgreSQL truncates identifiers at NAMEDATALEN - 1 bytes.
pub const MAX_IDENTIFIER_BYTES: usize = 63;

/// Reject names that cannot be a real identifier.
pub fn validate_identifier(name: &str) -> Result<(), AppError> {
    if name.is_empty() {
        return Err(AppError::Validation("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(AppError::Validation(format!(
            "Identifier contains a null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_BYTES {
        return Err(AppError::Validation(format!(
            "Identifier exceeds {} bytes (got {}): {:?}",
            MAX_IDENTIFIER_BYTES,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote an identifier: wrap in double quotes, double embedded quotes.
pub fn quote_ident(name: &str) -> Result<String, AppError> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// `schema."table"`; the schema is validated as a plain identifier at
/// configuration time and stays unquoted.
pub fn qualify(schema: &str, table: &str) -> Result<String, AppError> {
    Ok(format!("{}.{}", schema, quote_ident(table)?))
}

/// Render a cell as a script literal: `NULL` or a standard-conforming
/// string literal that the store coerces to the column type on insert.
///
/// Only quotes are doubled; backslashes pass through as ordinary
/// characters. That reading requires `standard_conforming_strings = on`,
/// the server default, which `connect` also sets on the session that
/// replays scripts. Replaying a script elsewhere with the setting off
/// would corrupt values containing a backslash.
pub fn quote_literal(value: Option<&str>) -> String {
    match value {
        None => "NULL".to_string(),
        Some(v) => format!("'{}'", v.replace('\'', "''")),
    }
}

/// Every name must belong to the introspected column set of the table.
pub fn ensure_known_columns<'a, I>(table: &str, known: &[String], names: I) -> Result<(), AppError>
where
    I: IntoIterator<Item = &'a String>,
{
    for name in names {
        if !known.iter().any(|k| k == name) {
            return Err(AppError::Validation(format!(
                "Column '{}' does not exist in table '{}'",
                name, table
            )));
        }
    }
    Ok(())
}
