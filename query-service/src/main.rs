//! SQL 批量执行服务
//!
//! 提供多数据库 SQL 执行功能，包括：
//! - 请求校验与安全策略（系统库保护、DROP DATABASE 确认与审计）
//! - 按顺序在每个目标数据库上独立执行，失败互不影响
//! - 结果清洗与分级降级的 JSON 编码

mod audit;
mod dispatcher;
mod encoder;
mod executor;
mod handlers;
mod request_validator;
mod routes;
mod session;
mod state;

use std::net::SocketAddr;

use anyhow::Context;
use axum::{extract::DefaultBodyLimit, middleware, routing::get, Json, Router};
use common::config::AppConfig;
use common::middleware::request_context_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;

const SERVICE_NAME: &str = "query-service";
const DEFAULT_PORT: u16 = 8082;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "查询服务 API",
        version = "0.1.0",
        description = "多数据库 SQL 批量执行微服务"
    ),
    paths(
        handlers::execute_query,
        handlers::health_check,
    ),
    components(schemas(
        common::models::QueryRequestBody,
        common::models::TargetOutcome,
        common::response::ErrorBody,
        handlers::HealthResponse,
    )),
    tags(
        (name = "query", description = "查询执行端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置并初始化日志追踪
    let config = AppConfig::load_with_service(SERVICE_NAME, DEFAULT_PORT);
    config.init_tracing();

    // 创建应用状态
    let state = AppState::new(config.clone());

    // 创建路由
    let app = create_router(state);

    // 启动服务
    let addr = config.bind_addr();
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {addr}"))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("服务运行失败")?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(handlers::handle_panic))
        .layer(middleware::from_fn(request_context_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
