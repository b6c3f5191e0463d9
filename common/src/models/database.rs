//! Database entity models.
//!
//! Contains models for database listing and creation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::utils::identifier::{is_creatable_database_name, is_valid_identifier};
use crate::utils::safety::SYSTEM_SCHEMAS;

/// Query parameters for listing databases.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ListDatabasesRequest {
    /// Also list the system schemas.
    #[serde(default)]
    pub include_system: bool,
}

/// A database on the connected server.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DatabaseItem {
    /// Database name.
    pub name: String,
    /// Number of tables.
    pub tables: u64,
    /// Human-readable size ("N/A", "12.50 KB", "3.20 MB", "System").
    pub size: String,
    /// Set for system schemas.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<bool>,
    /// Character set (set on creation).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    /// Collation (set on creation).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
}

impl DatabaseItem {
    /// Creates a user database item from its table count and size in MB.
    pub fn new(name: impl Into<String>, tables: u64, size_mb: Option<f64>) -> Self {
        Self {
            name: name.into(),
            tables,
            size: format_size(size_mb),
            system: None,
            charset: None,
            collation: None,
        }
    }

    /// Creates an entry for a system schema.
    pub fn system(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: 0,
            size: "System".to_string(),
            system: Some(true),
            charset: None,
            collation: None,
        }
    }
}

/// Formats a size in megabytes the way the UI displays it.
pub fn format_size(size_mb: Option<f64>) -> String {
    match size_mb {
        Some(mb) if mb > 0.0 && mb < 1.0 => format!("{:.2} KB", mb * 1024.0),
        Some(mb) if mb >= 1.0 => format!("{:.2} MB", mb),
        _ => "N/A".to_string(),
    }
}

/// Request body for creating a database.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateDatabaseRequest {
    /// New database name.
    #[validate(
        length(min = 1, max = 64, message = "Database name must be 1-64 characters"),
        custom(function = "validate_database_name")
    )]
    pub name: String,
    /// Character set (default: utf8mb4).
    #[validate(custom(function = "validate_plain_identifier"))]
    #[serde(default = "default_charset")]
    pub charset: String,
    /// Collation (default: utf8mb4_unicode_ci).
    #[validate(custom(function = "validate_plain_identifier"))]
    #[serde(default = "default_collation")]
    pub collation: String,
}

fn default_charset() -> String {
    "utf8mb4".to_string()
}

fn default_collation() -> String {
    "utf8mb4_unicode_ci".to_string()
}

fn validate_database_name(name: &str) -> Result<(), ValidationError> {
    if !is_creatable_database_name(name) {
        return Err(ValidationError::new("database_name").with_message(
            "Database name may only contain letters, digits and underscores, and must start with a letter"
                .into(),
        ));
    }
    if SYSTEM_SCHEMAS.contains(&name.to_ascii_lowercase().as_str()) {
        return Err(ValidationError::new("reserved_name")
            .with_message("A system schema name cannot be used as a database name".into()));
    }
    Ok(())
}

fn validate_plain_identifier(value: &str) -> Result<(), ValidationError> {
    if is_valid_identifier(value) {
        Ok(())
    } else {
        Err(ValidationError::new("identifier")
            .with_message("Charset and collation must be plain identifiers".into()))
    }
}
