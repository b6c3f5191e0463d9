//! 连接服务应用状态

use std::sync::Arc;

use common::config::AppConfig;

use crate::server::MySqlAdmin;
use crate::service::SessionService;
use crate::session_store::SessionStore;

/// 各 handler 共享的应用状态
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<SessionStore>,
    pub service: Arc<SessionService>,
}

impl AppState {
    /// 创建应用状态
    pub fn new(config: AppConfig) -> Self {
        let store = Arc::new(SessionStore::new(config.session_ttl()));
        let service = Arc::new(SessionService::new(store.clone(), MySqlAdmin::new(&config)));
        Self {
            config,
            store,
            service,
        }
    }
}
