//! 单库执行模块
//!
//! 每个目标库使用独立的 MySQL 连接：以目标库为默认数据库打开，
//! 执行结束即关闭。不使用连接池，也不重试。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, ConnectOptions, Connection, Executor, Row, TypeInfo, ValueRef};
use tracing::debug;

use common::config::AppConfig;
use common::errors::{DriverFault, TargetError};
use common::models::{ConnectionConfig, QueryClassification};
use common::utils::{describe_sqlx_error, RawRow, RawValue};

/// 单个目标库上的原始执行结果（未清洗）
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    /// SELECT 结果集
    Rows {
        columns: Vec<String>,
        rows: Vec<RawRow>,
    },
    /// 其他语句的影响计数
    Affected {
        affected_rows: u64,
        last_insert_id: Option<u64>,
    },
}

/// 在单个目标库上执行一条语句
#[async_trait]
pub trait TargetExecutor: Send + Sync {
    async fn execute(
        &self,
        target: &str,
        statement: &str,
        classification: QueryClassification,
        config: &ConnectionConfig,
    ) -> Result<Execution, TargetError>;
}

/// 基于 sqlx 的 MySQL 执行器
#[derive(Debug, Clone)]
pub struct MySqlTargetExecutor {
    connect_timeout: Duration,
    read_timeout: Duration,
    charset: String,
    collation: String,
}

impl MySqlTargetExecutor {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            charset: config.session_charset.clone(),
            collation: config.session_collation.clone(),
        }
    }

    fn connect_options(&self, target: &str, config: &ConnectionConfig) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(&config.password)
            .database(target)
            .charset(&self.charset)
            .collation(&self.collation)
    }

    async fn connect(
        &self,
        target: &str,
        config: &ConnectionConfig,
    ) -> Result<MySqlConnection, TargetError> {
        let options = self.connect_options(target, config);
        match tokio::time::timeout(self.connect_timeout, options.connect()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(TargetError::Connection(describe_sqlx_error(&e))),
            Err(_) => Err(TargetError::Connection(timed_out(
                "Connection",
                self.connect_timeout,
            ))),
        }
    }

    async fn run(
        &self,
        conn: &mut MySqlConnection,
        statement: &str,
        classification: QueryClassification,
    ) -> Result<Execution, TargetError> {
        let work = run_statement(conn, statement, classification);
        match tokio::time::timeout(self.read_timeout, work).await {
            Ok(Ok(execution)) => Ok(execution),
            Ok(Err(e)) => Err(TargetError::Driver(describe_sqlx_error(&e))),
            Err(_) => Err(TargetError::Driver(timed_out("Query", self.read_timeout))),
        }
    }
}

/// SELECT 走预处理协议以获得带类型的值，其他语句走文本协议
async fn run_statement(
    conn: &mut MySqlConnection,
    statement: &str,
    classification: QueryClassification,
) -> Result<Execution, sqlx::Error> {
    match classification {
        QueryClassification::Select => {
            let rows = conn.fetch_all(sqlx::query(statement)).await?;
            let columns = rows
                .first()
                .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
                .unwrap_or_default();
            Ok(Execution::Rows {
                columns,
                rows: rows.iter().map(read_row).collect(),
            })
        }
        QueryClassification::DropDatabase | QueryClassification::Other => {
            let result = conn.execute(sqlx::raw_sql(statement)).await?;
            Ok(Execution::Affected {
                affected_rows: result.rows_affected(),
                last_insert_id: Some(result.last_insert_id()),
            })
        }
    }
}

#[async_trait]
impl TargetExecutor for MySqlTargetExecutor {
    async fn execute(
        &self,
        target: &str,
        statement: &str,
        classification: QueryClassification,
        config: &ConnectionConfig,
    ) -> Result<Execution, TargetError> {
        let mut conn = self.connect(target, config).await?;
        let result = self.run(&mut conn, statement, classification).await;

        // 连接被 drop 时套接字同样会关闭，close() 是正常的关闭路径
        if let Err(e) = conn.close().await {
            debug!(database = %target, error = %e, "关闭连接失败");
        }
        result
    }
}

fn timed_out(what: &str, limit: Duration) -> DriverFault {
    DriverFault::new(format!("{what} timed out after {} seconds", limit.as_secs()))
}

fn read_row(row: &MySqlRow) -> RawRow {
    row.columns()
        .iter()
        .map(|col| (col.name().to_string(), read_cell(row, col.ordinal(), col.type_info().name())))
        .collect()
}

/// 按列的 MySQL 类型名读取单元格
///
/// 字符串、二进制、DECIMAL 与 JSON 列保留原始字节，交给清洗器处理。
fn read_cell(row: &MySqlRow, idx: usize, type_name: &str) -> RawValue {
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return RawValue::Null,
        Ok(_) => {}
        Err(_) => return RawValue::Unreadable,
    }

    let type_name = type_name.to_ascii_uppercase();
    let base = type_name.split_whitespace().next().unwrap_or_default();
    let unsigned = type_name.ends_with("UNSIGNED");

    let typed = match base {
        "BOOLEAN" => row.try_get::<bool, _>(idx).ok().map(Value::from),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" if unsigned => {
            row.try_get::<u64, _>(idx).ok().map(Value::from)
        }
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => row
            .try_get::<i64, _>(idx)
            .ok()
            .map(Value::from)
            .or_else(|| row.try_get::<u64, _>(idx).ok().map(Value::from)),
        "FLOAT" => row.try_get::<f32, _>(idx).ok().map(|v| Value::from(f64::from(v))),
        "DOUBLE" => row.try_get::<f64, _>(idx).ok().map(Value::from),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(idx)
            .ok()
            .map(|v| Value::String(v.to_string())),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(idx)
            .ok()
            .map(|v| Value::String(v.to_string())),
        "DATETIME" => row
            .try_get::<chrono::NaiveDateTime, _>(idx)
            .ok()
            .map(|v| Value::String(v.format("%Y-%m-%d %H:%M:%S%.f").to_string())),
        "TIMESTAMP" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
            .ok()
            .map(|v| Value::String(v.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string())),
        _ => None,
    };

    match typed {
        Some(value) => RawValue::Scalar(value),
        None => row
            .try_get_unchecked::<Vec<u8>, _>(idx)
            .map(RawValue::Text)
            .unwrap_or(RawValue::Unreadable),
    }
}
