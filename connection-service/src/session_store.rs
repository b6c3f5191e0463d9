//! 内存会话存储模块
//!
//! 以会话 ID 保存建立会话时的 `ConnectionConfig`。会话空闲超过配置时间后过期，
//! 每次成功查询都会刷新过期时间。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use common::models::ConnectionConfig;
use common::utils::IdGenerator;

struct StoredSession {
    config: ConnectionConfig,
    started_at: DateTime<Utc>,
    last_seen: Instant,
}

/// 有效会话的快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub config: ConnectionConfig,
    pub started_at: DateTime<Utc>,
}

/// 按 ID 索引的有效会话
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, StoredSession>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// 以新的会话 ID 保存连接配置并返回该 ID
    pub async fn open(&self, config: ConnectionConfig) -> String {
        let session_id = IdGenerator::session_id();
        let session = StoredSession {
            config,
            started_at: Utc::now(),
            last_seen: Instant::now(),
        };
        self.sessions.write().await.insert(session_id.clone(), session);
        session_id
    }

    /// 查询并刷新会话，已过期的会话会被移除
    pub async fn get(&self, session_id: &str) -> Option<SessionInfo> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            None => return None,
            Some(session) if session.last_seen.elapsed() < self.ttl => {
                session.last_seen = Instant::now();
                return Some(SessionInfo {
                    session_id: session_id.to_string(),
                    config: session.config.clone(),
                    started_at: session.started_at,
                });
            }
            Some(_) => {}
        }
        sessions.remove(session_id);
        tracing::debug!(session_id = %session_id, "会话已过期");
        None
    }

    /// 移除会话，返回会话是否存在
    pub async fn close(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    /// 清理所有过期会话并返回清理数量
    pub async fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_seen.elapsed() < self.ttl);
        before - sessions.len()
    }

    /// 已保存的会话数量，未清理的过期会话也计算在内
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            host: "localhost".into(),
            username: "root".into(),
            password: "pw".into(),
            port: 3306,
        }
    }

    #[tokio::test]
    async fn test_open_and_get() {
        let store = SessionStore::new(Duration::from_secs(3600));
        let id = store.open(config()).await;
        assert_eq!(id.len(), 32);

        let info = store.get(&id).await.unwrap();
        assert_eq!(info.session_id, id);
        assert_eq!(info.config, config());
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let store = SessionStore::new(Duration::from_secs(3600));
        let a = store.open(config()).await;
        let b = store.open(config()).await;
        assert_ne!(a, b);
        assert_eq!(store.count().await, 2);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let store = SessionStore::new(Duration::from_secs(3600));
        let id = store.open(config()).await;
        assert!(store.close(&id).await);
        assert!(!store.close(&id).await);
        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_removed_on_lookup() {
        let store = SessionStore::new(Duration::ZERO);
        let id = store.open(config()).await;
        assert!(store.get(&id).await.is_none());
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = SessionStore::new(Duration::ZERO);
        store.open(config()).await;
        store.open(config()).await;
        assert_eq!(store.purge_expired().await, 2);
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        assert!(store.get("missing").await.is_none());
    }
}
