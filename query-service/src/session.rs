//! 会话查询模块：向 connection-service 查询会话对应的连接配置

use async_trait::async_trait;
use reqwest::StatusCode;

use common::errors::{AppError, AppResult};
use common::models::ConnectionConfig;

/// 根据会话 ID 获取建立会话时的连接配置
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// 会话不存在或已过期时返回 `Ok(None)`
    async fn resolve(&self, session_id: &str) -> AppResult<Option<ConnectionConfig>>;
}

/// 调用 `GET {connection_service}/internal/sessions/{id}`
#[derive(Debug, Clone)]
pub struct HttpSessionResolver {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSessionResolver {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// 会话 ID 作为单个经过百分号编码的路径段拼接
    fn session_url(&self, session_id: &str) -> AppResult<reqwest::Url> {
        let invalid_base =
            || AppError::Internal(format!("连接服务地址无效: {}", self.base_url));
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|_| invalid_base())?;
        url.path_segments_mut()
            .map_err(|_| invalid_base())?
            .pop_if_empty()
            .extend(["internal", "sessions", session_id]);
        Ok(url)
    }
}

#[async_trait]
impl SessionResolver for HttpSessionResolver {
    async fn resolve(&self, session_id: &str) -> AppResult<Option<ConnectionConfig>> {
        let response = self
            .client
            .get(self.session_url(session_id)?)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("无法连接到连接服务: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "连接服务返回错误状态: {}",
                response.status()
            )));
        }

        let config = response.json::<ConnectionConfig>().await.map_err(|e| {
            AppError::ExternalService(format!("连接服务返回无效响应: {e}"))
        })?;
        Ok(Some(config))
    }
}

/// 会话 ID 为十六进制字符串，其他格式一律不查询
fn is_well_formed_session_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 128 && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// 缺少会话、会话 ID 格式错误或会话不存在时，一律视为没有活动连接
pub async fn require_connection(
    resolver: &dyn SessionResolver,
    token: Option<&str>,
) -> AppResult<ConnectionConfig> {
    let Some(session_id) = token.filter(|id| is_well_formed_session_id(id)) else {
        return Err(AppError::NoActiveConnection);
    };
    resolver
        .resolve(session_id)
        .await?
        .ok_or(AppError::NoActiveConnection)
}
