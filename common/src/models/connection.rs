//! Connection configuration models.
//!
//! A `ConnectionConfig` is created by the connect step of the session
//! service and is read-only everywhere else.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Default MySQL port.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Credentials of the server a session is connected to.
///
/// Serialized in full only on the internal session endpoint; public
/// responses use [`ConnectionSummary`].
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ConnectionConfig {
    /// Server host name or address.
    pub host: String,
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Server port.
    pub port: u16,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"***")
            .field("port", &self.port)
            .finish()
    }
}

/// Request body for opening a session against a MySQL server.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConnectRequest {
    /// Server host (default: localhost).
    #[validate(length(min = 1, max = 255, message = "Host must be 1-255 characters"))]
    #[serde(default = "default_host")]
    pub host: String,
    /// Login user (default: root).
    #[validate(length(min = 1, max = 128, message = "Username must be 1-128 characters"))]
    #[serde(default = "default_username")]
    pub username: String,
    /// Login password (default: empty).
    #[serde(default)]
    pub password: String,
    /// Server port (default: 3306).
    #[validate(range(min = 1, message = "Port must be between 1 and 65535"))]
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_username() -> String {
    "root".to_string()
}

fn default_port() -> u16 {
    DEFAULT_MYSQL_PORT
}

impl ConnectRequest {
    /// Converts the request into a ConnectionConfig.
    pub fn into_config(self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.host.trim().to_string(),
            username: self.username,
            password: self.password,
            port: self.port,
        }
    }
}

/// Connection details safe to return to clients (no password).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectionSummary {
    pub host: String,
    pub username: String,
    pub port: u16,
}

impl From<&ConnectionConfig> for ConnectionSummary {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            host: config.host.clone(),
            username: config.username.clone(),
            port: config.port,
        }
    }
}
