//! 分级降级的响应编码模块
//!
//! 优先完整编码批量结果；失败时每个目标只保留摘要（库名、状态、消息、计数、列名）；
//! 仍然失败时发送固定的最小失败对象。请求中任何位置的 panic 由 panic 捕获层
//! 转换为致命错误载荷，响应体始终是可解析的 JSON。

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use serde_json::{json, Value};
use tracing::{error, warn};

use common::errors::AppError;
use common::models::TargetOutcome;

/// 所有响应的 Content-Type
pub const JSON_UTF8: &str = "application/json; charset=utf-8";

/// 最后兜底的响应体，本身即为合法 JSON
const STATIC_MINIMAL: &[u8] =
    br#"{"success":false,"message":"Error processing the response data","error_type":"json_encoding"}"#;

/// 产生响应体的降级层级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStage {
    Full,
    Degraded,
    Minimal,
}

/// 将 JSON 值序列化为字节
pub trait PayloadWriter: Send + Sync {
    fn write(&self, stage: EncodeStage, value: &Value) -> Result<Vec<u8>, serde_json::Error>;
}

/// 基于 `serde_json` 的写入器，非 ASCII 字符原样输出
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonWriter;

impl PayloadWriter for JsonWriter {
    fn write(&self, _stage: EncodeStage, value: &Value) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(value)
    }
}

/// 编码批量结果与拒绝响应
#[derive(Clone)]
pub struct ResponseEncoder {
    writer: Arc<dyn PayloadWriter>,
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self::new(Arc::new(JsonWriter))
    }
}

impl ResponseEncoder {
    pub fn new(writer: Arc<dyn PayloadWriter>) -> Self {
        Self { writer }
    }

    /// 编码逐库结果，必要时逐级降级
    pub fn encode_batch(&self, outcomes: &[TargetOutcome]) -> (EncodeStage, Vec<u8>) {
        let full = serde_json::to_value(outcomes)
            .and_then(|value| self.writer.write(EncodeStage::Full, &value));
        let full_error = match full {
            Ok(bytes) => return (EncodeStage::Full, bytes),
            Err(e) => e,
        };
        warn!(error = %full_error, "完整编码失败，改为发送摘要");

        let degraded = Value::Array(outcomes.iter().map(degraded_entry).collect());
        match self.writer.write(EncodeStage::Degraded, &degraded) {
            Ok(bytes) => (EncodeStage::Degraded, bytes),
            Err(e) => {
                error!(error = %e, "摘要编码失败，改为发送最小载荷");
                (EncodeStage::Minimal, self.minimal(&full_error.to_string()))
            }
        }
    }

    /// 将批量级拒绝编码为单个失败对象
    pub fn encode_rejection(&self, err: &AppError) -> (EncodeStage, Vec<u8>) {
        let body = serde_json::to_value(err.to_body()).unwrap_or_else(|_| {
            json!({"success": false, "message": err.to_string(), "error_type": err.error_type()})
        });
        match self.writer.write(EncodeStage::Full, &body) {
            Ok(bytes) => (EncodeStage::Full, bytes),
            Err(e) => (EncodeStage::Minimal, self.minimal(&e.to_string())),
        }
    }

    /// 构建批量结果的 HTTP 响应
    pub fn batch_response(&self, outcomes: &[TargetOutcome]) -> Response {
        let (stage, bytes) = self.encode_batch(outcomes);
        let status = match stage {
            EncodeStage::Minimal => StatusCode::INTERNAL_SERVER_ERROR,
            EncodeStage::Full | EncodeStage::Degraded => StatusCode::OK,
        };
        json_response(status, bytes)
    }

    /// 构建被拒绝请求的 HTTP 响应
    pub fn rejection_response(&self, err: &AppError) -> Response {
        let (_, bytes) = self.encode_rejection(err);
        json_response(err.status_code(), bytes)
    }

    fn minimal(&self, detail: &str) -> Vec<u8> {
        let body = json!({
            "success": false,
            "message": "Error processing the response data. Some characters may not be supported.",
            "error_type": "json_encoding",
            "detail": detail,
        });
        self.writer
            .write(EncodeStage::Minimal, &body)
            .unwrap_or_else(|_| STATIC_MINIMAL.to_vec())
    }
}

fn degraded_entry(outcome: &TargetOutcome) -> Value {
    let mut entry = json!({
        "database": outcome.database,
        "success": outcome.success,
        "message": outcome.message,
        "total_rows": outcome.row_count.unwrap_or(0),
    });
    if outcome.success && outcome.rows.is_some() {
        entry["data_available"] = json!(true);
        entry["columns"] = json!(outcome.column_names());
        entry["row_count"] = json!(outcome.row_count.unwrap_or(0));
        entry["message"] =
            json!("Data is available but contains characters that could not be encoded. Query executed successfully.");
    }
    entry
}

/// 未被处理的 panic 对应的致命错误响应
pub fn fatal_response(detail: &str) -> Response {
    let body = json!({
        "success": false,
        "message": "Fatal server error",
        "error_type": "fatal",
        "detail": detail,
    });
    let bytes = serde_json::to_vec(&body).unwrap_or_else(|_| STATIC_MINIMAL.to_vec());
    json_response(StatusCode::INTERNAL_SERVER_ERROR, bytes)
}

fn json_response(status: StatusCode, bytes: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::Row;
    use serde::ser::Error as _;

    /// 在指定层级失败的写入器
    struct FailingWriter(Vec<EncodeStage>);

    impl PayloadWriter for FailingWriter {
        fn write(&self, stage: EncodeStage, value: &Value) -> Result<Vec<u8>, serde_json::Error> {
            if self.0.contains(&stage) {
                Err(serde_json::Error::custom("unencodable value"))
            } else {
                serde_json::to_vec(value)
            }
        }
    }

    fn encoder(failing: &[EncodeStage]) -> ResponseEncoder {
        ResponseEncoder::new(Arc::new(FailingWriter(failing.to_vec())))
    }

    fn outcomes() -> Vec<TargetOutcome> {
        let mut row = Row::new();
        row.insert("id".into(), json!(1));
        row.insert("name".into(), json!("Zoë"));
        vec![
            TargetOutcome::selected("db_a", vec!["id".into(), "name".into()], vec![row], 2),
            TargetOutcome::affected("db_b", 3, None, 1),
        ]
    }

    fn parse(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).expect("body must be valid JSON")
    }

    #[test]
    fn test_full_encoding() {
        let (stage, bytes) = ResponseEncoder::default().encode_batch(&outcomes());
        assert_eq!(stage, EncodeStage::Full);
        let value = parse(&bytes);
        assert_eq!(value[0]["rows"][0]["name"], "Zoë");
        assert_eq!(value[1]["affected_rows"], 3);
    }

    #[test]
    fn test_non_ascii_is_not_escaped() {
        let (_, bytes) = ResponseEncoder::default().encode_batch(&outcomes());
        assert!(String::from_utf8(bytes).unwrap().contains("Zoë"));
    }

    #[test]
    fn test_degraded_payload_when_full_fails() {
        let (stage, bytes) = encoder(&[EncodeStage::Full]).encode_batch(&outcomes());
        assert_eq!(stage, EncodeStage::Degraded);

        let value = parse(&bytes);
        let entries = value.as_array().unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0]["database"], "db_a");
        assert_eq!(entries[0]["success"], true);
        assert_eq!(entries[0]["row_count"], 1);
        assert_eq!(entries[0]["columns"], json!(["id", "name"]));
        assert_eq!(entries[0]["data_available"], true);
        assert!(entries[0].get("rows").is_none());

        assert_eq!(entries[1]["database"], "db_b");
        assert!(entries[1].get("data_available").is_none());
    }

    #[test]
    fn test_minimal_payload_when_degraded_fails() {
        let (stage, bytes) =
            encoder(&[EncodeStage::Full, EncodeStage::Degraded]).encode_batch(&outcomes());
        assert_eq!(stage, EncodeStage::Minimal);
        let value = parse(&bytes);
        assert_eq!(value["success"], false);
        assert_eq!(value["error_type"], "json_encoding");
        assert!(value["detail"].as_str().unwrap().contains("unencodable"));
    }

    #[test]
    fn test_static_fallback_when_every_stage_fails() {
        let all = [EncodeStage::Full, EncodeStage::Degraded, EncodeStage::Minimal];
        let (stage, bytes) = encoder(&all).encode_batch(&outcomes());
        assert_eq!(stage, EncodeStage::Minimal);
        assert_eq!(parse(&bytes)["error_type"], "json_encoding");
    }

    #[test]
    fn test_rejection_is_flat_object() {
        let err = AppError::SafetyViolation("DROP DATABASE requires explicit confirmation".into());
        let (_, bytes) = ResponseEncoder::default().encode_rejection(&err);
        let value = parse(&bytes);
        assert_eq!(value["success"], false);
        assert_eq!(value["error_type"], "safety");
        assert_eq!(value["message"], "DROP DATABASE requires explicit confirmation");
    }

    #[test]
    fn test_responses_carry_utf8_content_type() {
        let response = ResponseEncoder::default().batch_response(&outcomes());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], JSON_UTF8);

        let response = fatal_response("boom");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONTENT_TYPE], JSON_UTF8);
    }

    #[test]
    fn test_minimal_batch_is_server_error() {
        let all = [EncodeStage::Full, EncodeStage::Degraded];
        let response = encoder(&all).batch_response(&outcomes());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
