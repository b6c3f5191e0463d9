//! 批量分发模块
//!
//! 按请求顺序在每个目标数据库上执行同一条语句，
//! 每个目标（包括 panic）都恰好折叠为一个 `TargetOutcome`。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tracing::{info, warn};

use common::errors::{AppResult, TargetError};
use common::models::{ConnectionConfig, QueryClassification, QueryRequest, TargetOutcome};
use common::utils::{is_valid_identifier, ResultSanitizer, SafetyPolicy};

use crate::audit::{AuditSink, DropAudit};
use crate::executor::{Execution, TargetExecutor};

/// 负责一次批量请求的安全策略、审计与逐库执行
#[derive(Clone)]
pub struct DatabaseDispatcher {
    executor: Arc<dyn TargetExecutor>,
    audit: Arc<dyn AuditSink>,
}

impl DatabaseDispatcher {
    pub fn new(executor: Arc<dyn TargetExecutor>, audit: Arc<dyn AuditSink>) -> Self {
        Self { executor, audit }
    }

    /// 执行已校验的批量请求
    ///
    /// # Errors
    /// 仅返回安全策略的 `SafetyViolation`；单个目标的失败写入对应结果。
    pub async fn dispatch(
        &self,
        request: &QueryRequest,
        config: &ConnectionConfig,
        caller: &str,
    ) -> AppResult<Vec<TargetOutcome>> {
        let decision = match SafetyPolicy::evaluate(request) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(caller = %caller, reason = %e, "批量请求被安全策略拦截");
                return Err(e);
            }
        };

        if decision.audit_required {
            let event = DropAudit::new(request.query(), request.databases(), caller);
            self.audit.record(&event).await;
        }

        info!(
            targets = request.databases().len(),
            classification = %decision.classification,
            "开始分发批量请求"
        );

        let mut outcomes = Vec::with_capacity(request.databases().len());
        for target in request.databases() {
            let outcome = self
                .run_target(target, request.query(), decision.classification, config)
                .await;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn run_target(
        &self,
        target: &str,
        statement: &str,
        classification: QueryClassification,
        config: &ConnectionConfig,
    ) -> TargetOutcome {
        let started = Instant::now();

        if !is_valid_identifier(target) {
            let error = TargetError::InvalidIdentifier(target.to_string());
            warn!(database = %target, "目标库名不合法，跳过");
            return TargetOutcome::failed(target, &error, 0);
        }

        let attempt = AssertUnwindSafe(self.executor.execute(
            target,
            statement,
            classification,
            config,
        ))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(TargetError::Panicked(panic_message(payload.as_ref()))));

        let elapsed = started.elapsed().as_millis() as u64;
        match attempt {
            Ok(Execution::Rows { columns, rows }) => {
                let rows = ResultSanitizer::sanitize_rows(rows);
                info!(database = %target, rows = rows.len(), elapsed_ms = elapsed, "目标执行成功");
                TargetOutcome::selected(target, columns, rows, elapsed)
            }
            Ok(Execution::Affected {
                affected_rows,
                last_insert_id,
            }) => {
                info!(database = %target, affected_rows, elapsed_ms = elapsed, "目标执行成功");
                TargetOutcome::affected(target, affected_rows, last_insert_id, elapsed)
            }
            Err(error) => {
                warn!(
                    database = %target,
                    error_type = error.error_type(),
                    error = %error,
                    "目标执行失败"
                );
                TargetOutcome::failed(target, &error, elapsed)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
