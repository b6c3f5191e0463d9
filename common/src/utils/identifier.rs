//! Identifier checks for database names.

/// Whether `name` is a plain identifier (letters, digits, underscore).
///
/// Target names are interpolated into connection options, so anything
/// else is refused.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Whether `name` may be used for a new database: a plain identifier that
/// starts with a letter.
pub fn is_creatable_database_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) && is_valid_identifier(name)
}
