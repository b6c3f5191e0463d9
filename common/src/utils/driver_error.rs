//! MySQL driver error taxonomy.
//!
//! Maps MySQL error numbers (and client-side I/O failures) onto a small set
//! of human-readable categories. Codes outside the table keep a cleaned
//! version of the driver's own message.

use std::io;

use sqlx::mysql::MySqlDatabaseError;

use crate::errors::DriverFault;
use crate::utils::sanitizer::ResultSanitizer;

/// Known failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorCategory {
    AccessDenied,
    AuthenticationFailed,
    UnknownDatabase,
    UnknownColumn,
    UnknownTable,
    DuplicateKey,
    SyntaxError,
    ForeignKeyAdd,
    ForeignKeyRestrict,
    ForeignKeyMissingParent,
    MissingDefault,
    ServerUnreachable,
    PortUnreachable,
    ConnectionDropped,
}

impl DriverErrorCategory {
    /// Category for a MySQL error number.
    pub fn from_code(code: u16) -> Option<Self> {
        let category = match code {
            1044 => Self::AccessDenied,
            1045 => Self::AuthenticationFailed,
            1049 => Self::UnknownDatabase,
            1054 => Self::UnknownColumn,
            1062 => Self::DuplicateKey,
            1064 => Self::SyntaxError,
            1146 => Self::UnknownTable,
            1216 => Self::ForeignKeyAdd,
            1217 | 1451 => Self::ForeignKeyRestrict,
            1452 => Self::ForeignKeyMissingParent,
            1364 => Self::MissingDefault,
            2002 => Self::ServerUnreachable,
            2003 => Self::PortUnreachable,
            2006 | 2013 => Self::ConnectionDropped,
            _ => return None,
        };
        Some(category)
    }

    /// Client-library error number used for an I/O failure of this category.
    fn client_code(self) -> Option<u16> {
        match self {
            Self::ServerUnreachable => Some(2002),
            Self::PortUnreachable => Some(2003),
            Self::ConnectionDropped => Some(2006),
            _ => None,
        }
    }

    /// Human-readable message.
    pub fn message(self) -> &'static str {
        match self {
            Self::AccessDenied => "Access denied to the database. Check the user's privileges.",
            Self::AuthenticationFailed => "Invalid username or password for the database server.",
            Self::UnknownDatabase => "Database not found. Check that the database exists.",
            Self::UnknownColumn => "Unknown column in the query. Check the column names.",
            Self::UnknownTable => "Table not found. Check that the table exists in the database.",
            Self::DuplicateKey => "Duplicate entry: unique key violation. This value already exists.",
            Self::SyntaxError => "SQL syntax error. Check the syntax of your query.",
            Self::ForeignKeyAdd => "Cannot add the foreign key constraint. Check the relationships.",
            Self::ForeignKeyRestrict => {
                "Cannot delete or update: foreign key constraint. Related rows exist."
            }
            Self::ForeignKeyMissingParent => {
                "Cannot add or update: foreign key constraint. The referenced row does not exist."
            }
            Self::MissingDefault => {
                "A required field has no default value. Provide a value for every required field."
            }
            Self::ServerUnreachable => "Cannot reach the MySQL server. Check that it is running.",
            Self::PortUnreachable => "Cannot connect to the MySQL server on the given port.",
            Self::ConnectionDropped => "The MySQL server closed the connection.",
        }
    }

    fn from_io(kind: io::ErrorKind) -> Option<Self> {
        match kind {
            io::ErrorKind::ConnectionRefused => Some(Self::PortUnreachable),
            io::ErrorKind::NotFound | io::ErrorKind::AddrNotAvailable => {
                Some(Self::ServerUnreachable)
            }
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Some(Self::ConnectionDropped),
            _ => None,
        }
    }
}

/// Builds a `DriverFault` from a sqlx error.
pub fn describe_sqlx_error(err: &sqlx::Error) -> DriverFault {
    match err {
        sqlx::Error::Database(db_err) => {
            let (code, sql_state) = match db_err.try_downcast_ref::<MySqlDatabaseError>() {
                Some(mysql_err) => (Some(mysql_err.number()), mysql_err.code().map(str::to_owned)),
                None => (None, db_err.code().map(|c| c.into_owned())),
            };
            let message = code
                .and_then(DriverErrorCategory::from_code)
                .map(|c| c.message().to_string())
                .unwrap_or_else(|| clean_driver_message(db_err.message()));
            DriverFault {
                message,
                code,
                sql_state,
            }
        }
        sqlx::Error::Io(io_err) => match DriverErrorCategory::from_io(io_err.kind()) {
            Some(category) => DriverFault {
                message: category.message().to_string(),
                code: category.client_code(),
                sql_state: Some("HY000".to_string()),
            },
            None => DriverFault::new(clean_driver_message(&io_err.to_string())),
        },
        other => DriverFault::new(clean_driver_message(&other.to_string())),
    }
}

/// Strips driver prefixes such as `error returned from database: 1064 (42000): `
/// and control characters from a raw message.
pub fn clean_driver_message(raw: &str) -> String {
    let mut message = raw.trim();
    for prefix in ["error returned from database:", "error communicating with database:"] {
        if let Some(rest) = message.strip_prefix(prefix) {
            message = rest.trim_start();
        }
    }
    message = strip_code_prefix(message);

    let cleaned = ResultSanitizer::clean_text(message).trim().to_string();
    if cleaned.is_empty() {
        "Unknown database error".to_string()
    } else {
        cleaned
    }
}

/// Removes a leading `NNNN (SSSSS): ` marker.
fn strip_code_prefix(message: &str) -> &str {
    let digits = message.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return message;
    }
    let rest = &message[digits..];
    match rest.strip_prefix(" (").and_then(|r| r.split_once("): ")) {
        Some((state, tail)) if state.len() == 5 => tail,
        _ => message,
    }
}
