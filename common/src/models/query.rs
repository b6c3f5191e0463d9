//! SQL batch models.
//!
//! A batch is one statement run against an ordered list of target
//! databases. The response carries exactly one `TargetOutcome` per target,
//! in request order.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::errors::TargetError;

/// One result row: column name to value, in column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Wire shape of `POST /api/query`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct QueryRequestBody {
    /// SQL statement, executed verbatim against every target.
    #[validate(custom(function = "validate_statement"))]
    pub query: String,

    /// Target database names, in execution order.
    #[validate(length(min = 1, message = "Select at least one database"))]
    pub databases: Vec<String>,

    /// Explicit confirmation required for DROP DATABASE / DROP SCHEMA.
    #[serde(default)]
    pub confirm_drop: Option<bool>,
}

fn validate_statement(query: &str) -> Result<(), ValidationError> {
    if query.trim().is_empty() {
        return Err(ValidationError::new("query").with_message("SQL query is required".into()));
    }
    Ok(())
}

/// A validated, immutable batch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    query: String,
    databases: Vec<String>,
    confirm_drop: bool,
}

impl QueryRequest {
    /// Builds a request; the statement is stored trimmed.
    pub fn new(query: impl AsRef<str>, databases: Vec<String>, confirm_drop: bool) -> Self {
        Self {
            query: query.as_ref().trim().to_string(),
            databases,
            confirm_drop,
        }
    }

    /// The statement text.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Target databases, in request order.
    pub fn databases(&self) -> &[String] {
        &self.databases
    }

    /// Whether the caller confirmed a DROP DATABASE.
    pub fn confirm_drop(&self) -> bool {
        self.confirm_drop
    }
}

impl From<QueryRequestBody> for QueryRequest {
    fn from(body: QueryRequestBody) -> Self {
        Self::new(body.query, body.databases, body.confirm_drop.unwrap_or(false))
    }
}

/// Statement shape, used to pick result shape and safety rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryClassification {
    /// Row-returning SELECT.
    Select,
    /// DROP DATABASE / DROP SCHEMA.
    DropDatabase,
    /// Everything else (DML, DDL, SHOW, ...).
    Other,
}

impl fmt::Display for QueryClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::DropDatabase => write!(f, "DROP DATABASE"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

/// Result of running the statement against one target.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TargetOutcome {
    /// Target database name, as given in the request.
    pub database: String,

    /// Whether the statement succeeded on this target.
    pub success: bool,

    /// Human-readable summary or error message.
    pub message: String,

    /// Column names of the result set, in order (SELECT only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,

    /// Result rows (SELECT only).
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub rows: Option<Vec<Row>>,

    /// Number of rows returned (SELECT only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,

    /// Number of rows affected (non-SELECT only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,

    /// Last generated AUTO_INCREMENT value, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_insert_id: Option<String>,

    /// Failure class (failures only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,

    /// MySQL error number (driver failures only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,

    /// SQLSTATE (driver failures only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_state: Option<String>,

    /// Wall time spent on this target, connection included.
    pub execution_time_ms: u64,
}

impl TargetOutcome {
    fn base(database: &str, success: bool, message: String, execution_time_ms: u64) -> Self {
        Self {
            database: database.to_string(),
            success,
            message,
            columns: None,
            rows: None,
            row_count: None,
            affected_rows: None,
            last_insert_id: None,
            error_type: None,
            error_code: None,
            sql_state: None,
            execution_time_ms,
        }
    }

    /// A successful SELECT.
    pub fn selected(
        database: &str,
        columns: Vec<String>,
        rows: Vec<Row>,
        execution_time_ms: u64,
    ) -> Self {
        let count = rows.len();
        Self {
            columns: Some(columns),
            rows: Some(rows),
            row_count: Some(count),
            ..Self::base(
                database,
                true,
                format!("Query executed successfully. {count} rows returned."),
                execution_time_ms,
            )
        }
    }

    /// A successful non-SELECT statement.
    pub fn affected(
        database: &str,
        affected_rows: u64,
        last_insert_id: Option<u64>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            affected_rows: Some(affected_rows),
            last_insert_id: last_insert_id.filter(|id| *id != 0).map(|id| id.to_string()),
            ..Self::base(
                database,
                true,
                format!("Query executed successfully. {affected_rows} rows affected."),
                execution_time_ms,
            )
        }
    }

    /// A failed target.
    pub fn failed(database: &str, error: &TargetError, execution_time_ms: u64) -> Self {
        let fault = error.fault();
        Self {
            error_type: Some(error.error_type().to_string()),
            error_code: fault.and_then(|f| f.code),
            sql_state: fault.and_then(|f| f.sql_state.clone()),
            ..Self::base(database, false, error.to_string(), execution_time_ms)
        }
    }

    /// Column names, falling back to the keys of the first row.
    pub fn column_names(&self) -> Vec<String> {
        match (&self.columns, &self.rows) {
            (Some(columns), _) if !columns.is_empty() => columns.clone(),
            (_, Some(rows)) => rows
                .first()
                .map(|row| row.keys().cloned().collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DriverFault;
    use serde_json::json;

    fn body(raw: &str) -> Result<QueryRequestBody, serde_json::Error> {
        serde_json::from_str(raw)
    }

    #[test]
    fn test_body_rejects_unknown_fields() {
        assert!(body(r#"{"query":"SELECT 1","databases":["a"],"limit":5}"#).is_err());
    }

    #[test]
    fn test_body_rejects_non_string_targets() {
        assert!(body(r#"{"query":"SELECT 1","databases":[1,2]}"#).is_err());
    }

    #[test]
    fn test_body_rejects_non_bool_confirmation() {
        assert!(body(r#"{"query":"SELECT 1","databases":["a"],"confirm_drop":"yes"}"#).is_err());
    }

    #[test]
    fn test_blank_query_fails_validation() {
        let parsed = body(r#"{"query":"   ","databases":["a"]}"#).unwrap();
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn test_empty_targets_fail_validation() {
        let parsed = body(r#"{"query":"SELECT 1","databases":[]}"#).unwrap();
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn test_request_trims_statement_and_defaults_confirmation() {
        let parsed = body(r#"{"query":"  SELECT 1 \n","databases":["a"]}"#).unwrap();
        let request = QueryRequest::from(parsed);
        assert_eq!(request.query(), "SELECT 1");
        assert!(!request.confirm_drop());
    }

    #[test]
    fn test_selected_outcome_shape() {
        let mut row = Row::new();
        row.insert("1".into(), json!(1));
        let outcome = TargetOutcome::selected("db_a", vec!["1".into()], vec![row], 3);
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["row_count"], 1);
        assert_eq!(value["rows"], json!([{"1": 1}]));
        assert!(value.get("affected_rows").is_none());
        assert!(value.get("error_type").is_none());
    }

    #[test]
    fn test_affected_outcome_hides_zero_insert_id() {
        let outcome = TargetOutcome::affected("db_a", 2, Some(0), 1);
        assert_eq!(outcome.affected_rows, Some(2));
        assert!(outcome.last_insert_id.is_none());
        assert!(outcome.rows.is_none());

        let outcome = TargetOutcome::affected("db_a", 1, Some(42), 1);
        assert_eq!(outcome.last_insert_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_failed_outcome_carries_driver_details() {
        let error = TargetError::Driver(DriverFault {
            message: "Table not found.".into(),
            code: Some(1146),
            sql_state: Some("42S02".into()),
        });
        let outcome = TargetOutcome::failed("db_b", &error, 0);
        assert!(!outcome.success);
        assert_eq!(outcome.error_type.as_deref(), Some("driver"));
        assert_eq!(outcome.error_code, Some(1146));
        assert_eq!(outcome.sql_state.as_deref(), Some("42S02"));
        assert!(outcome.rows.is_none());
        assert!(outcome.affected_rows.is_none());
    }

    #[test]
    fn test_column_names_fall_back_to_first_row() {
        let mut row = Row::new();
        row.insert("id".into(), json!(1));
        row.insert("name".into(), json!("x"));
        let mut outcome = TargetOutcome::selected("db", Vec::new(), vec![row], 0);
        outcome.columns = None;
        assert_eq!(outcome.column_names(), vec!["id", "name"]);
    }
}
