//! MySQL 会话与数据库管理服务
//!
//! 提供查询服务所依赖的会话功能，包括：
//! - 连接 MySQL 服务器并创建会话
//! - 会话状态查询与注销
//! - 数据库列表与创建
//! - 内部会话配置查询接口

mod handlers;
mod routes;
mod server;
mod service;
mod session_store;
mod state;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::{extract::DefaultBodyLimit, middleware, routing::get, Json, Router};
use common::config::AppConfig;
use common::middleware::request_context_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;

const SERVICE_NAME: &str = "connection-service";
const DEFAULT_PORT: u16 = 8081;

/// 过期会话清理周期
const PURGE_INTERVAL: Duration = Duration::from_secs(300);

#[derive(OpenApi)]
#[openapi(
    info(
        title = "连接服务 API",
        version = "0.1.0",
        description = "MySQL 会话与数据库管理微服务"
    ),
    paths(
        handlers::connect,
        handlers::session_status,
        handlers::logout,
        handlers::list_databases,
        handlers::create_database,
        handlers::health_check,
    ),
    components(schemas(
        common::models::ConnectRequest,
        common::models::ConnectionSummary,
        common::models::CreateDatabaseRequest,
        common::models::DatabaseItem,
        common::response::ErrorBody,
        service::ConnectResult,
        service::ServerInfo,
        service::SessionStatus,
        handlers::SessionStatusBody,
        handlers::DatabaseList,
        handlers::HealthResponse,
    )),
    tags(
        (name = "session", description = "会话管理端点"),
        (name = "databases", description = "数据库管理端点"),
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

    // 定期清理过期会话
    let store = state.store.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = store.purge_expired().await;
            if purged > 0 {
                info!(purged, "清理过期会话");
            }
        }
    });

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
        .layer(middleware::from_fn(request_context_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use common::models::ConnectionConfig;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState::new(AppConfig {
            service_name: SERVICE_NAME.to_string(),
            ..AppConfig::default()
        })
    }

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            host: "db.internal".into(),
            username: "console".into(),
            password: "secret".into(),
            port: 3306,
        }
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).expect("valid JSON body"))
    }

    fn get_with_session(uri: &str, session: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(session) = session {
            builder = builder.header("x-session-id", session);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_internal_lookup_returns_full_config() {
        let state = state();
        let id = state.store.open(config()).await;
        let (status, value) = send(
            create_router(state),
            get_with_session(&format!("/internal/sessions/{id}"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_value::<ConnectionConfig>(value).unwrap(), config());
    }

    #[tokio::test]
    async fn test_internal_lookup_unknown_is_404() {
        let (status, value) = send(
            create_router(state()),
            get_with_session("/internal/sessions/missing", None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(value["success"], false);
        assert_eq!(value["error_type"], "session_not_found");
    }

    #[tokio::test]
    async fn test_session_status() {
        let state = state();
        let id = state.store.open(config()).await;
        let app = create_router(state);

        let (_, value) = send(app.clone(), get_with_session("/api/session", Some(&id))).await;
        assert_eq!(value["success"], true);
        assert_eq!(value["connected"], true);
        assert_eq!(value["config"]["host"], "db.internal");
        assert!(value["config"].get("password").is_none());
        assert!(value["session_start"].is_string());

        let (_, value) = send(app, get_with_session("/api/session", None)).await;
        assert_eq!(value["connected"], false);
    }

    #[tokio::test]
    async fn test_logout_closes_session() {
        let state = state();
        let id = state.store.open(config()).await;
        let app = create_router(state.clone());

        let req = Request::builder()
            .method("POST")
            .uri("/api/logout")
            .header("x-session-id", id.as_str())
            .body(Body::empty())
            .unwrap();
        let (status, value) = send(app.clone(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["success"], true);
        assert_eq!(state.store.count().await, 0);

        let (status, _) = send(app, get_with_session(&format!("/internal/sessions/{id}"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_databases_require_session() {
        let (status, value) = send(
            create_router(state()),
            get_with_session("/api/databases", None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(value["message"], "no active connection");
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_body() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/connect")
            .body(Body::empty())
            .unwrap();
        let (status, value) = send(create_router(state()), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["error_type"], "validation");
    }

    #[tokio::test]
    async fn test_connect_oversized_body_is_json_rejection() {
        let state = AppState::new(AppConfig {
            service_name: SERVICE_NAME.to_string(),
            max_body_bytes: 64,
            ..AppConfig::default()
        });
        let body = json!({"host": "h".repeat(256), "username": "root"}).to_string();
        let req = Request::builder()
            .method("POST")
            .uri("/api/connect")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let (status, value) = send(create_router(state), req).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(value["success"], false);
        assert_eq!(value["error_type"], "payload_too_large");
    }

    #[tokio::test]
    async fn test_connect_get_is_method_not_allowed() {
        let (status, value) = send(
            create_router(state()),
            get_with_session("/api/connect", None),
        )
        .await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(value["success"], false);
    }

    #[tokio::test]
    async fn test_create_database_validates_name() {
        let state = state();
        let id = state.store.open(config()).await;
        let req = Request::builder()
            .method("POST")
            .uri("/api/databases")
            .header("x-session-id", id.as_str())
            .body(Body::from(json!({"name": "mysql"}).to_string()))
            .unwrap();
        let (status, value) = send(create_router(state), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["error_type"], "validation");
    }

    #[tokio::test]
    async fn test_health_reports_sessions() {
        let state = state();
        state.store.open(config()).await;
        let (status, value) = send(create_router(state), get_with_session("/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["service"], "connection-service");
        assert_eq!(value["sessions"], 1);
    }
}
