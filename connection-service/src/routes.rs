//! 连接服务路由模块

use axum::{
    routing::{get, post},
    Router,
};
use crate::handlers;
use crate::state::AppState;

/// 创建会话与数据库管理路由
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/connect",
            post(handlers::connect).fallback(handlers::method_not_allowed),
        )
        .route("/api/session", get(handlers::session_status))
        .route(
            "/api/logout",
            post(handlers::logout).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/databases",
            get(handlers::list_databases)
                .post(handlers::create_database)
                .fallback(handlers::method_not_allowed),
        )
        .route("/api/health", get(handlers::health_check))
        .route("/internal/sessions/{id}", get(handlers::get_session_config))
}
