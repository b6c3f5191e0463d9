//! Handler模块

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use utoipa::ToSchema;

use common::errors::{AppError, AppResult};
use common::middleware::{RequestContext, SessionToken};
use common::models::{
    ConnectRequest, ConnectionConfig, CreateDatabaseRequest, DatabaseItem, ListDatabasesRequest,
};
use common::response::{ApiResponse, ErrorBody};
use crate::service::{ConnectResult, SessionServiceTrait, SessionStatus};
use crate::state::AppState;

const SERVICE_NAME: &str = "connection-service";

/// 解析 JSON 请求体，失败时返回校验错误
fn parse_body<T: DeserializeOwned>(
    body: Result<Bytes, BytesRejection>,
    limit: usize,
) -> AppResult<T> {
    let body = body.map_err(|rejection| AppError::from_body_rejection(&rejection, limit))?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::Validation("Request body is required".to_string()));
    }
    serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))
}

/// 连接 MySQL 服务器并创建会话
#[utoipa::path(
    post,
    path = "/api/connect",
    tag = "session",
    request_body = ConnectRequest,
    responses(
        (status = 200, description = "连接成功，data 中包含会话 ID", body = ConnectResult),
        (status = 400, description = "请求体无效", body = ErrorBody),
        (status = 502, description = "无法连接到 MySQL 服务器", body = ErrorBody)
    )
)]
pub async fn connect(
    State(state): State<AppState>,
    context: RequestContext,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ApiResponse<ConnectResult>>, AppError> {
    let req: ConnectRequest = parse_body(body, state.config.max_body_bytes)?;
    let result = state.service.connect(req).await?;
    Ok(Json(
        ApiResponse::ok_with_message(result, "Connection successful")
            .with_request_id(context.request_id)
            .with_service(SERVICE_NAME),
    ))
}

/// 会话状态响应
#[derive(Serialize, ToSchema)]
pub struct SessionStatusBody {
    pub success: bool,
    #[serde(flatten)]
    pub status: SessionStatus,
}

/// 查询当前会话状态
#[utoipa::path(
    get,
    path = "/api/session",
    tag = "session",
    params(
        ("x-session-id" = Option<String>, Header, description = "会话 ID")
    ),
    responses(
        (status = 200, description = "会话状态", body = SessionStatusBody)
    )
)]
pub async fn session_status(
    State(state): State<AppState>,
    token: SessionToken,
) -> Json<SessionStatusBody> {
    let status = state.service.status(token.as_deref()).await;
    Json(SessionStatusBody {
        success: true,
        status,
    })
}

/// 注销当前会话
#[utoipa::path(
    post,
    path = "/api/logout",
    tag = "session",
    params(
        ("x-session-id" = Option<String>, Header, description = "会话 ID")
    ),
    responses(
        (status = 200, description = "会话已注销")
    )
)]
pub async fn logout(State(state): State<AppState>, token: SessionToken) -> Json<ApiResponse<()>> {
    state.service.logout(token.as_deref()).await;
    Json(ApiResponse::success("Session closed").with_service(SERVICE_NAME))
}

/// 数据库列表
#[derive(Serialize, ToSchema)]
pub struct DatabaseList {
    pub databases: Vec<DatabaseItem>,
    pub total: usize,
}

/// 列出服务器上的数据库
#[utoipa::path(
    get,
    path = "/api/databases",
    tag = "databases",
    params(
        ("x-session-id" = String, Header, description = "会话 ID"),
        ("include_system" = Option<bool>, Query, description = "是否包含系统库")
    ),
    responses(
        (status = 200, description = "数据库列表", body = DatabaseList),
        (status = 401, description = "没有活动连接", body = ErrorBody)
    )
)]
pub async fn list_databases(
    State(state): State<AppState>,
    token: SessionToken,
    Query(params): Query<ListDatabasesRequest>,
) -> Result<Json<ApiResponse<DatabaseList>>, AppError> {
    let databases = state
        .service
        .list_databases(token.as_deref(), params.include_system)
        .await?;
    let total = databases.len();
    Ok(Json(
        ApiResponse::ok(DatabaseList { databases, total }).with_service(SERVICE_NAME),
    ))
}

/// 创建数据库
#[utoipa::path(
    post,
    path = "/api/databases",
    tag = "databases",
    request_body = CreateDatabaseRequest,
    params(
        ("x-session-id" = String, Header, description = "会话 ID")
    ),
    responses(
        (status = 200, description = "数据库已创建", body = DatabaseItem),
        (status = 400, description = "名称无效", body = ErrorBody),
        (status = 401, description = "没有活动连接", body = ErrorBody),
        (status = 409, description = "数据库已存在", body = ErrorBody)
    )
)]
pub async fn create_database(
    State(state): State<AppState>,
    token: SessionToken,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ApiResponse<DatabaseItem>>, AppError> {
    let req: CreateDatabaseRequest = parse_body(body, state.config.max_body_bytes)?;
    let item = state.service.create_database(token.as_deref(), req).await?;
    let message = format!("Database '{}' created successfully", item.name);
    Ok(Json(
        ApiResponse::ok_with_message(item, message).with_service(SERVICE_NAME),
    ))
}

/// 内部端点，供查询服务获取会话的连接配置
pub async fn get_session_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConnectionConfig>, AppError> {
    state.service.lookup(&id).await.map(Json)
}

/// 方法不允许
pub async fn method_not_allowed() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody::new("Method not allowed", "method_not_allowed")),
    )
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        sessions: state.store.count().await,
    })
}

/// 健康检查响应
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// 服务状态
    pub status: String,
    /// 服务名称
    pub service: String,
    /// 服务版本
    pub version: String,
    /// 当前时间戳
    pub timestamp: DateTime<Utc>,
    /// 当前会话数
    pub sessions: usize,
}
