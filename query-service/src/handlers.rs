//! Handler模块

use std::any::Any;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error};
use utoipa::ToSchema;

use common::errors::{AppError, AppResult};
use common::middleware::{RequestContext, SessionToken};
use common::models::query::{QueryRequestBody, TargetOutcome};
use common::response::ErrorBody;
use crate::encoder::fatal_response;
use crate::session::require_connection;
use crate::state::AppState;
use crate::request_validator::RequestValidator;

/// 在所选数据库上逐个执行 SQL 语句
///
/// 成功时返回按请求顺序排列的结果数组；被拒绝时返回单个失败对象。
#[utoipa::path(
    post,
    path = "/api/query",
    tag = "query",
    request_body = QueryRequestBody,
    params(
        ("x-session-id" = String, Header, description = "connection-service 返回的会话 ID")
    ),
    responses(
        (status = 200, description = "每个目标数据库一个结果", body = Vec<TargetOutcome>),
        (status = 400, description = "请求体无效", body = ErrorBody),
        (status = 401, description = "没有活动连接", body = ErrorBody),
        (status = 403, description = "被安全策略拦截", body = ErrorBody),
        (status = 413, description = "请求体超过大小限制", body = ErrorBody),
        (status = 405, description = "方法不允许", body = ErrorBody)
    )
)]
pub async fn execute_query(
    State(state): State<AppState>,
    context: RequestContext,
    token: SessionToken,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    match run_batch(&state, &context, token.as_deref(), body).await {
        Ok(outcomes) => state.encoder.batch_response(&outcomes),
        Err(err) => {
            if err.status_code().is_server_error() {
                error!(error = %err, error_type = err.error_type(), "批量请求执行失败");
            } else {
                debug!(error = %err, error_type = err.error_type(), "批量请求被拒绝");
            }
            state.encoder.rejection_response(&err)
        }
    }
}

/// 依次检查会话、请求体，再交给分发器（安全策略、审计、逐库执行）
async fn run_batch(
    state: &AppState,
    context: &RequestContext,
    token: Option<&str>,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<Vec<TargetOutcome>> {
    let config = require_connection(state.sessions.as_ref(), token).await?;
    let body = body
        .map_err(|rejection| AppError::from_body_rejection(&rejection, state.config.max_body_bytes))?;
    let request = RequestValidator::parse(&body)?;
    state
        .dispatcher
        .dispatch(&request, &config, &context.client_addr)
        .await
}

/// 非 POST 请求
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
    })
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

/// Panic 兜底：返回结构化的致命错误
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    };
    error!(detail = %detail, "请求处理发生 panic");
    fatal_response(&detail)
}
