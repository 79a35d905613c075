//! Centralized identifier validation and quoting for SQL injection prevention.
//!
//! SQL identifiers (table names, column names, constraint names) cannot be
//! passed as parameters in prepared statements - only data values can be
//! parameterized. Every identifier this tool interpolates into DDL comes from
//! the database catalog or from a derived column name, but catalog-sourced
//! names are still quoted defensively: a hostile identifier created before the
//! run would otherwise be executed verbatim.
//!
//! To safely construct dynamic SQL with identifiers, we:
//! 1. Validate identifiers for suspicious patterns (null bytes, excessive length)
//! 2. Escape embedded double quotes and wrap in double quotes

use crate::error::{ConvertError, Result};

/// Maximum identifier length. PostgreSQL truncates identifiers at 63 bytes,
/// but derived names (`<stem>_uuid`) may momentarily exceed that before the
/// server truncates them, so the limit here is deliberately looser.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes (injection vector)
/// - Identifiers exceeding maximum length
///
/// # Errors
///
/// Returns `ConvertError::Config` for invalid identifiers with a descriptive message.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ConvertError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(ConvertError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ConvertError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier.
///
/// Escapes double quotes by doubling them and wraps in double quotes.
/// Validates the identifier before quoting.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(quote_ident("users")?, "\"users\"");
/// assert_eq!(quote_ident("table\"name")?, "\"table\"\"name\"");
/// ```
pub fn quote_ident(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a comma-separated column list for use in a constraint or index
/// definition. Each column is validated and quoted individually.
pub fn quote_column_list(columns: &[String]) -> Result<String> {
    let quoted: Result<Vec<String>> = columns.iter().map(|c| quote_ident(c)).collect();
    Ok(quoted?.join(", "))
}
