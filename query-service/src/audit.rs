//! DROP DATABASE 审计模块
//!
//! 已确认的 DROP DATABASE 在访问任何目标库之前记录，执行失败时记录仍然保留。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, warn};

/// 一次需要审计的 DROP DATABASE 批量请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropAudit {
    pub statement: String,
    pub targets: Vec<String>,
    pub caller: String,
    pub timestamp: DateTime<Utc>,
}

impl DropAudit {
    pub fn new(statement: &str, targets: &[String], caller: &str) -> Self {
        Self {
            statement: statement.to_string(),
            targets: targets.to_vec(),
            caller: caller.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// 单行格式，语句中的换行被压平
    pub fn to_line(&self) -> String {
        let statement = self.statement.split_whitespace().collect::<Vec<_>>().join(" ");
        format!(
            "{} DROP DATABASE executed by {}: statement=\"{}\" targets=[{}]",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.caller,
            statement,
            self.targets.join(", ")
        )
    }
}

/// 只追加的操作日志
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &DropAudit);
}

/// 审计记录写入 `audit` 日志目标，配置了文件路径时同时追加到文件
#[derive(Debug, Default)]
pub struct LogAuditSink {
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl LogAuditSink {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    async fn append(&self, path: &Path, line: &str) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await
    }
}

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, event: &DropAudit) {
        let line = event.to_line();
        warn!(
            target: "audit",
            caller = %event.caller,
            targets = ?event.targets,
            statement = %event.statement,
            "DROP DATABASE 已确认"
        );

        if let Some(path) = &self.path {
            if let Err(e) = self.append(path, &line).await {
                // 审计记录已写入日志目标
                error!(path = %path.display(), error = %e, "审计记录写入文件失败");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> DropAudit {
        DropAudit::new(
            "DROP DATABASE\n  test_db",
            &["test_db".to_string(), "other_db".to_string()],
            "203.0.113.9",
        )
    }

    #[test]
    fn test_line_contains_every_field() {
        let event = event();
        let line = event.to_line();
        assert!(line.contains("203.0.113.9"));
        assert!(line.contains("statement=\"DROP DATABASE test_db\""));
        assert!(line.contains("targets=[test_db, other_db]"));
        assert!(line.starts_with(&event.timestamp.format("%Y-%m-%d").to_string()));
        assert!(!line.contains('\n'));
    }

    #[tokio::test]
    async fn test_file_sink_appends_lines() {
        let path = std::env::temp_dir().join(format!("audit-{}.log", uuid::Uuid::new_v4()));
        let sink = LogAuditSink::new(Some(path.clone()));

        sink.record(&event()).await;
        sink.record(&event()).await;

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().all(|l| l.contains("DROP DATABASE executed by 203.0.113.9")));
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_unwritable_path_does_not_fail() {
        let sink = LogAuditSink::new(Some(PathBuf::from("/nonexistent-dir/audit.log")));
        sink.record(&event()).await;
    }
}
