//! MySQL 服务器管理模块
//!
//! 连接探测、数据库列表与创建数据库都使用短连接：每次调用单独打开连接，返回前关闭。

use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection, Executor, Row};

use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::models::{ConnectionConfig, CreateDatabaseRequest, DatabaseItem};
use common::utils::describe_sqlx_error;
use common::utils::safety::SYSTEM_SCHEMAS;

/// MySQL 错误码：数据库已存在
const ER_DB_CREATE_EXISTS: u16 = 1007;

const SCHEMA_STATS_SQL: &str = "SELECT s.SCHEMA_NAME AS name, \
        COUNT(t.TABLE_NAME) AS table_count, \
        CAST(COALESCE(SUM(t.DATA_LENGTH + t.INDEX_LENGTH), 0) AS UNSIGNED) AS size_bytes \
     FROM information_schema.SCHEMATA s \
     LEFT JOIN information_schema.TABLES t ON s.SCHEMA_NAME = t.TABLE_SCHEMA \
     GROUP BY s.SCHEMA_NAME";

const SCHEMA_EXISTS_SQL: &str =
    "SELECT SCHEMA_NAME FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = ?";

/// 已连接会话的服务器级操作
#[derive(Debug, Clone)]
pub struct MySqlAdmin {
    connect_timeout: Duration,
    charset: String,
    collation: String,
}

impl MySqlAdmin {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            charset: config.session_charset.clone(),
            collation: config.session_collation.clone(),
        }
    }

    fn connect_options(&self, config: &ConnectionConfig) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(&config.password)
            .charset(&self.charset)
            .collation(&self.collation)
    }

    async fn open(&self, config: &ConnectionConfig) -> AppResult<MySqlConnection> {
        let options = self.connect_options(config);
        let connect = options.connect();
        match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => {
                let fault = describe_sqlx_error(&e);
                Err(AppError::DatabaseConnection {
                    message: fault.message,
                    code: fault.code,
                })
            }
            Err(_) => Err(AppError::DatabaseConnection {
                message: format!(
                    "Connection timed out after {} seconds",
                    self.connect_timeout.as_secs()
                ),
                code: None,
            }),
        }
    }

    async fn release(conn: MySqlConnection) {
        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "关闭管理连接失败");
        }
    }

    /// 打开探测连接并返回服务器版本
    pub async fn server_version(&self, config: &ConnectionConfig) -> AppResult<String> {
        let mut conn = self.open(config).await?;
        let version = sqlx::query_scalar::<_, String>("SELECT VERSION()")
            .fetch_one(&mut conn)
            .await
            .map_err(query_error);
        Self::release(conn).await;
        version
    }

    /// 列出数据库及其表数量和大小，按名称排序
    pub async fn list_databases(
        &self,
        config: &ConnectionConfig,
        include_system: bool,
    ) -> AppResult<Vec<DatabaseItem>> {
        let mut conn = self.open(config).await?;
        let rows = sqlx::query(SCHEMA_STATS_SQL).fetch_all(&mut conn).await;
        Self::release(conn).await;

        let mut databases = Vec::new();
        for row in rows.map_err(query_error)? {
            let name: String = row.try_get("name").map_err(query_error)?;
            let is_system = SYSTEM_SCHEMAS.contains(&name.to_ascii_lowercase().as_str());
            if is_system {
                if include_system {
                    databases.push(DatabaseItem::system(name));
                }
                continue;
            }
            let tables: i64 = row.try_get("table_count").map_err(query_error)?;
            let size_bytes: u64 = row.try_get("size_bytes").map_err(query_error)?;
            databases.push(DatabaseItem::new(
                name,
                tables.max(0) as u64,
                Some(size_bytes as f64 / (1024.0 * 1024.0)),
            ));
        }
        databases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(databases)
    }

    /// 确认数据库不存在后创建
    ///
    /// 请求必须已经过校验：名称、字符集与排序规则会直接拼接进语句。
    pub async fn create_database(
        &self,
        config: &ConnectionConfig,
        req: &CreateDatabaseRequest,
    ) -> AppResult<DatabaseItem> {
        let mut conn = self.open(config).await?;
        let result = Self::create_on(&mut conn, req).await;
        Self::release(conn).await;
        result
    }

    async fn create_on(
        conn: &mut MySqlConnection,
        req: &CreateDatabaseRequest,
    ) -> AppResult<DatabaseItem> {
        if Self::schema_exists(conn, &req.name).await? {
            return Err(already_exists(&req.name));
        }

        let statement = create_statement(req);
        conn.execute(sqlx::raw_sql(&statement))
            .await
            .map_err(|e| match query_error(e) {
                AppError::DatabaseQuery {
                    code: Some(ER_DB_CREATE_EXISTS),
                    ..
                } => already_exists(&req.name),
                other => other,
            })?;

        if !Self::schema_exists(conn, &req.name).await? {
            return Err(AppError::Internal(format!(
                "database '{}' was not found after creation",
                req.name
            )));
        }

        Ok(DatabaseItem {
            charset: Some(req.charset.clone()),
            collation: Some(req.collation.clone()),
            ..DatabaseItem::new(req.name.clone(), 0, None)
        })
    }

    async fn schema_exists(conn: &mut MySqlConnection, name: &str) -> AppResult<bool> {
        let found = conn
            .fetch_optional(sqlx::query(SCHEMA_EXISTS_SQL).bind(name))
            .await
            .map_err(query_error)?;
        Ok(found.is_some())
    }
}

fn create_statement(req: &CreateDatabaseRequest) -> String {
    format!(
        "CREATE DATABASE `{}` CHARACTER SET {} COLLATE {}",
        req.name, req.charset, req.collation
    )
}

fn already_exists(name: &str) -> AppError {
    AppError::AlreadyExists(format!("Database '{name}' already exists"))
}

fn query_error(e: sqlx::Error) -> AppError {
    let fault = describe_sqlx_error(&e);
    AppError::DatabaseQuery {
        message: fault.message,
        code: fault.code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str) -> CreateDatabaseRequest {
        serde_json::from_value(serde_json::json!({ "name": name })).unwrap()
    }

    #[test]
    fn test_create_statement_uses_defaults() {
        assert_eq!(
            create_statement(&request("shop")),
            "CREATE DATABASE `shop` CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci"
        );
    }

    #[test]
    fn test_connect_options_have_no_default_database() {
        let admin = MySqlAdmin::new(&AppConfig::default());
        let config = ConnectionConfig {
            host: "db".into(),
            username: "root".into(),
            password: String::new(),
            port: 3306,
        };
        let options = admin.connect_options(&config);
        assert_eq!(options.get_database(), None);
        assert_eq!(options.get_charset(), "utf8mb4");
    }

    #[test]
    fn test_already_exists_message() {
        let err = already_exists("shop");
        assert_eq!(err.to_string(), "Database 'shop' already exists");
        assert_eq!(err.error_type(), "already_exists");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        let admin = MySqlAdmin::new(&AppConfig::default());
        let config = ConnectionConfig {
            host: "127.0.0.1".into(),
            username: "root".into(),
            password: String::new(),
            port: 1,
        };
        let err = admin.server_version(&config).await.unwrap_err();
        assert_eq!(err.error_type(), "connection");
    }
}
