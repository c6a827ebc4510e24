//! Logging hook for Gemini client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows callers to
//! capture every API exchange passing through the [`Gemini`](crate::Gemini)
//! client, and [`JsonlLogger`], which appends one JSON record per event to a
//! file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::types::{GenerateContentRequest, GenerateContentResponse};

/// A trait for logging Gemini client operations.
///
/// Implementations must not fail the request; errors while logging are
/// swallowed by the implementation.
pub trait ClientLogger: Send + Sync {
    /// Log an outbound request, after sanitization and pruning.
    fn log_request(&self, request: &GenerateContentRequest);

    /// Log a successfully parsed response body.
    fn log_response(&self, response: &GenerateContentResponse);

    /// Log a failed request.
    fn log_error(&self, error: &Error);
}

#[derive(Serialize)]
struct LogRecord<'a> {
    #[serde(with = "crate::utils::time")]
    timestamp: OffsetDateTime,
    event: &'a str,
    body: Value,
}

/// A [`ClientLogger`] that appends JSON lines to a file.
pub struct JsonlLogger {
    file: Mutex<File>,
}

impl JsonlLogger {
    /// Opens `path` for appending, creating it if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .map_err(|err| Error::io("failed to open log file", err))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn write_record(&self, event: &str, body: Value) {
        let record = LogRecord {
            timestamp: OffsetDateTime::now_utc(),
            event,
            body,
        };
        let Ok(mut line) = serde_json::to_string(&record) else {
            return;
        };
        line.push('\n');
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
        }
    }
}

impl ClientLogger for JsonlLogger {
    fn log_request(&self, request: &GenerateContentRequest) {
        let body = serde_json::to_value(request).unwrap_or(Value::Null);
        self.write_record("request", body);
    }

    fn log_response(&self, response: &GenerateContentResponse) {
        self.write_record("response", response.as_json().clone());
    }

    fn log_error(&self, error: &Error) {
        let body = serde_json::json!({
            "message": error.to_string(),
            "status_code": error.status_code(),
        });
        self.write_record("error", body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use serde_json::json;

    #[test]
    fn jsonl_logger_appends_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchange.log");

        let logger = JsonlLogger::open(&path).unwrap();
        let request = GenerateContentRequest::from_history(&[Message::user("ping")]);
        logger.log_request(&request);
        logger.log_response(&GenerateContentResponse::new(json!({"candidates": []})));
        logger.log_error(&Error::rate_limit("quota", None));
        drop(logger);

        // A second logger on the same file keeps appending.
        let logger = JsonlLogger::open(&path).unwrap();
        logger.log_error(&Error::timeout("slow", Some(std::time::Duration::from_secs(45))));

        let content = std::fs::read_to_string(&path).unwrap();
        let records: Vec<Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0]["event"], "request");
        assert_eq!(
            records[0]["body"],
            json!({"contents": [{"role": "user", "parts": [{"text": "ping"}]}]})
        );
        assert_eq!(records[1]["event"], "response");
        assert_eq!(records[2]["event"], "error");
        assert_eq!(records[2]["body"]["status_code"], 429);
        assert_eq!(records[3]["body"]["status_code"], Value::Null);
        assert!(records[0]["timestamp"].as_str().unwrap().contains('T'));
    }
}
