//! 查询服务应用状态

use std::sync::Arc;

use common::config::{AppConfig, ServiceUrls};

use crate::audit::LogAuditSink;
use crate::dispatcher::DatabaseDispatcher;
use crate::encoder::ResponseEncoder;
use crate::executor::MySqlTargetExecutor;
use crate::session::{HttpSessionResolver, SessionResolver};

/// 各 handler 共享的应用状态
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub dispatcher: DatabaseDispatcher,
    pub sessions: Arc<dyn SessionResolver>,
    pub encoder: ResponseEncoder,
}

impl AppState {
    /// 创建生产环境状态：MySQL 执行器、HTTP 会话查询、审计日志与可选的审计文件
    pub fn new(config: AppConfig) -> Self {
        let service_urls = ServiceUrls::load();
        let dispatcher = DatabaseDispatcher::new(
            Arc::new(MySqlTargetExecutor::new(&config)),
            Arc::new(LogAuditSink::new(config.audit_log_path.clone())),
        );
        let sessions = Arc::new(HttpSessionResolver::new(
            service_urls.connection_service,
            reqwest::Client::new(),
        ));
        Self::with_parts(config, dispatcher, sessions)
    }

    /// 由指定组件组装状态
    pub fn with_parts(
        config: AppConfig,
        dispatcher: DatabaseDispatcher,
        sessions: Arc<dyn SessionResolver>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            sessions,
            encoder: ResponseEncoder::default(),
        }
    }
}
