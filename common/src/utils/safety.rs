//! Batch safety policy.
//!
//! Classifies a statement and decides, once for the whole batch and before
//! any connection is opened, whether it may run. Detection is keyword and
//! pattern based; obfuscated or multi-statement input can slip past it.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{AppError, AppResult};
use crate::models::query::{QueryClassification, QueryRequest};

/// MySQL system schemas.
pub const SYSTEM_SCHEMAS: [&str; 4] = ["mysql", "information_schema", "performance_schema", "sys"];

/// Databases that can never be dropped through the console, confirmed or not.
pub const PROTECTED_DATABASES: [&str; 5] = [
    "mysql",
    "information_schema",
    "performance_schema",
    "sys",
    "phpmyadmin",
];

static SELECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*SELECT\s+").unwrap());

static DROP_DATABASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*DROP\s+(?:DATABASE|SCHEMA)\s+").unwrap());

static SYSTEM_SCHEMA_MUTATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:TRUNCATE|DELETE|DROP|ALTER|UPDATE)\s+.*?\b(?:mysql|information_schema|performance_schema|sys)\.",
    )
    .unwrap()
});

static DROP_TARGET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bDROP\s+(?:DATABASE|SCHEMA)\s+(?:IF\s+EXISTS\s+)?`?([A-Za-z0-9_$]+)`?")
        .unwrap()
});

/// Outcome of a successful policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyDecision {
    /// Statement shape, shared by every target.
    pub classification: QueryClassification,
    /// A confirmed DROP DATABASE that must be audited before execution.
    pub audit_required: bool,
}

/// Batch-level statement gate.
pub struct SafetyPolicy;

impl SafetyPolicy {
    /// Classifies a statement by its leading keyword.
    pub fn classify(sql: &str) -> QueryClassification {
        if SELECT_RE.is_match(sql) {
            QueryClassification::Select
        } else if DROP_DATABASE_RE.is_match(sql) {
            QueryClassification::DropDatabase
        } else {
            QueryClassification::Other
        }
    }

    /// Evaluates a validated request.
    ///
    /// # Errors
    /// Returns `AppError::SafetyViolation` when the statement mutates a
    /// system schema, drops a protected database, or drops a database
    /// without `confirm_drop`.
    pub fn evaluate(request: &QueryRequest) -> AppResult<PolicyDecision> {
        let sql = request.query();
        let classification = Self::classify(sql);

        if SYSTEM_SCHEMA_MUTATION_RE.is_match(sql) {
            return Err(AppError::SafetyViolation(
                "Statements that modify MySQL system schemas are not allowed".to_string(),
            ));
        }

        if classification != QueryClassification::DropDatabase {
            return Ok(PolicyDecision {
                classification,
                audit_required: false,
            });
        }

        if let Some(name) = Self::protected_drop_target(sql) {
            return Err(AppError::SafetyViolation(format!(
                "Cannot drop system database: {name}"
            )));
        }

        if !request.confirm_drop() {
            return Err(AppError::SafetyViolation(
                "DROP DATABASE requires explicit confirmation".to_string(),
            ));
        }

        Ok(PolicyDecision {
            classification,
            audit_required: true,
        })
    }

    /// First protected database named by any DROP DATABASE/SCHEMA in `sql`.
    fn protected_drop_target(sql: &str) -> Option<String> {
        DROP_TARGET_RE
            .captures_iter(sql)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_ascii_lowercase())
            .find(|name| PROTECTED_DATABASES.contains(&name.as_str()))
    }
}
