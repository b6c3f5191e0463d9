//! 请求体解析模块

use common::errors::{AppError, AppResult};
use common::models::query::{QueryRequest, QueryRequestBody};
use validator::Validate;

/// 多个字段同时校验失败时的报告顺序
const FIELD_ORDER: [&str; 2] = ["query", "databases"];

/// 将 `POST /api/query` 的原始请求体转换为 `QueryRequest`
pub struct RequestValidator;

impl RequestValidator {
    /// 解析并校验请求体
    ///
    /// 这里不检查目标库名，非法库名只在分发时使对应目标失败。
    ///
    /// # Errors
    /// JSON 格式错误、字段未知或类型错误、语句为空、目标列表为空时返回
    /// `AppError::Validation`。
    pub fn parse(body: &[u8]) -> AppResult<QueryRequest> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(AppError::Validation("Request body is required".to_string()));
        }

        let body: QueryRequestBody = serde_json::from_slice(body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))?;
        body.validate()
            .map_err(|e| AppError::from_validation(&e, &FIELD_ORDER))?;

        Ok(QueryRequest::from(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejection(body: &str) -> String {
        match RequestValidator::parse(body.as_bytes()) {
            Err(AppError::Validation(msg)) => msg,
            other => panic!("expected validation error for {body:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_body() {
        let request = RequestValidator::parse(
            br#"{"query":" SELECT 1 ","databases":["db_a","db_b"],"confirm_drop":true}"#,
        )
        .unwrap();
        assert_eq!(request.query(), "SELECT 1");
        assert_eq!(request.databases(), ["db_a", "db_b"]);
        assert!(request.confirm_drop());
    }

    #[test]
    fn test_invalid_target_names_are_left_to_dispatch() {
        let request =
            RequestValidator::parse(br#"{"query":"SELECT 1","databases":["bad-name"]}"#).unwrap();
        assert_eq!(request.databases(), ["bad-name"]);
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(rejection(""), "Request body is required");
        assert_eq!(rejection("  \n"), "Request body is required");
    }

    #[test]
    fn test_malformed_json() {
        assert!(rejection("{not json").starts_with("Invalid request body"));
        assert!(rejection("[]").starts_with("Invalid request body"));
    }

    #[test]
    fn test_missing_or_mistyped_targets() {
        assert!(rejection(r#"{"query":"SELECT 1"}"#).contains("databases"));
        assert!(rejection(r#"{"query":"SELECT 1","databases":"db_a"}"#)
            .starts_with("Invalid request body"));
    }

    #[test]
    fn test_blank_query_and_empty_targets() {
        assert_eq!(
            rejection(r#"{"query":"   ","databases":["a"]}"#),
            "SQL query is required"
        );
        assert_eq!(
            rejection(r#"{"query":"SELECT 1","databases":[]}"#),
            "Select at least one database"
        );
    }

    #[test]
    fn test_blank_query_reported_before_empty_targets() {
        for _ in 0..16 {
            assert_eq!(
                rejection(r#"{"query":"","databases":[]}"#),
                "SQL query is required"
            );
        }
    }
}
