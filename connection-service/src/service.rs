//! 会话与数据库管理服务模块

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use common::errors::{AppError, AppResult};
use common::models::{
    ConnectRequest, ConnectionConfig, ConnectionSummary, CreateDatabaseRequest, DatabaseItem,
};
use crate::server::MySqlAdmin;
use crate::session_store::{SessionInfo, SessionStore};

/// 连接成功后返回的数据
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectResult {
    /// 会话 ID，后续请求放在 `x-session-id` 头中
    pub session_id: String,
    /// 服务器信息
    pub server_info: ServerInfo,
}

/// MySQL 服务器信息
#[derive(Debug, Serialize, ToSchema)]
pub struct ServerInfo {
    pub version: String,
    pub host: String,
    pub port: u16,
}

/// 会话状态
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionStatus {
    /// 是否存在活动连接
    pub connected: bool,
    /// 连接信息（不含密码）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ConnectionSummary>,
    /// 会话开始时间
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_start: Option<DateTime<Utc>>,
    /// 无连接时的提示信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<SessionInfo> for SessionStatus {
    fn from(info: SessionInfo) -> Self {
        Self {
            connected: true,
            config: Some(ConnectionSummary::from(&info.config)),
            session_start: Some(info.started_at),
            message: None,
        }
    }
}

impl SessionStatus {
    fn disconnected() -> Self {
        Self {
            connected: false,
            config: None,
            session_start: None,
            message: Some("No active session".to_string()),
        }
    }
}

/// 会话服务 Trait
#[async_trait]
pub trait SessionServiceTrait: Send + Sync {
    /// 连接 MySQL 服务器并创建会话
    async fn connect(&self, req: ConnectRequest) -> AppResult<ConnectResult>;

    /// 查询会话状态
    async fn status(&self, session_id: Option<&str>) -> SessionStatus;

    /// 注销会话（幂等）
    async fn logout(&self, session_id: Option<&str>) -> bool;

    /// 获取会话的完整连接配置（内部接口）
    async fn lookup(&self, session_id: &str) -> AppResult<ConnectionConfig>;

    /// 列出数据库
    async fn list_databases(
        &self,
        session_id: Option<&str>,
        include_system: bool,
    ) -> AppResult<Vec<DatabaseItem>>;

    /// 创建数据库
    async fn create_database(
        &self,
        session_id: Option<&str>,
        req: CreateDatabaseRequest,
    ) -> AppResult<DatabaseItem>;
}

/// 会话服务
pub struct SessionService {
    store: Arc<SessionStore>,
    admin: MySqlAdmin,
}

impl SessionService {
    /// 创建新的会话服务实例
    pub fn new(store: Arc<SessionStore>, admin: MySqlAdmin) -> Self {
        Self { store, admin }
    }

    async fn active_config(&self, session_id: Option<&str>) -> AppResult<ConnectionConfig> {
        let session_id = session_id.ok_or(AppError::NoActiveConnection)?;
        self.store
            .get(session_id)
            .await
            .map(|info| info.config)
            .ok_or(AppError::NoActiveConnection)
    }
}

#[async_trait]
impl SessionServiceTrait for SessionService {
    async fn connect(&self, req: ConnectRequest) -> AppResult<ConnectResult> {
        req.validate()?;
        let config = req.into_config();

        let version = self.admin.server_version(&config).await?;
        let server_info = ServerInfo {
            version,
            host: config.host.clone(),
            port: config.port,
        };
        let session_id = self.store.open(config).await;

        tracing::info!(host = %server_info.host, port = server_info.port, "会话已创建");
        Ok(ConnectResult {
            session_id,
            server_info,
        })
    }

    async fn status(&self, session_id: Option<&str>) -> SessionStatus {
        match session_id {
            Some(id) => self
                .store
                .get(id)
                .await
                .map(SessionStatus::from)
                .unwrap_or_else(SessionStatus::disconnected),
            None => SessionStatus::disconnected(),
        }
    }

    async fn logout(&self, session_id: Option<&str>) -> bool {
        let Some(id) = session_id else {
            return false;
        };
        let closed = self.store.close(id).await;
        if closed {
            tracing::info!("会话已注销");
        }
        closed
    }

    async fn lookup(&self, session_id: &str) -> AppResult<ConnectionConfig> {
        self.store
            .get(session_id)
            .await
            .map(|info| info.config)
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))
    }

    async fn list_databases(
        &self,
        session_id: Option<&str>,
        include_system: bool,
    ) -> AppResult<Vec<DatabaseItem>> {
        let config = self.active_config(session_id).await?;
        self.admin.list_databases(&config, include_system).await
    }

    async fn create_database(
        &self,
        session_id: Option<&str>,
        mut req: CreateDatabaseRequest,
    ) -> AppResult<DatabaseItem> {
        let config = self.active_config(session_id).await?;
        req.name = req.name.trim().to_string();
        req.validate()?;
        let item = self.admin.create_database(&config, &req).await?;
        tracing::info!(database = %item.name, "数据库已创建");
        Ok(item)
    }
}
