//! IPC protocol types and validation for winget-cnf-daemon.
//!
//! This crate is shared by the daemon and the hook CLI to prevent schema
//! drift. The daemon remains the authority on validation, but clients reuse
//! the same types to construct valid requests.
//!
//! Framing: one JSON request per connection, terminated by `\n`; the daemon
//! answers with one JSON response line.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024; // 1MB
pub const DEFAULT_DAEMON_ADDR: &str = "127.0.0.1:47613";
pub const DAEMON_ADDR_ENV: &str = "WINGET_CNF_DAEMON_ADDR";

const MAX_TARGET_CHARS: usize = 256;
const MAX_INPUT_CHARS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    Feedback,
    Predict,
    CommandAccepted,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

/// A command the shell could not find.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FeedbackParams {
    pub target: String,
    #[serde(default)]
    pub command_line: Option<String>,
    /// RFC3339 send time; the daemon logs request latency from it.
    #[serde(default)]
    pub sent_at: Option<String>,
}

/// Partial input typed so far.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PredictParams {
    pub input: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CommandAcceptedParams {
    #[serde(default)]
    pub command_line: String,
    #[serde(default)]
    pub history: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PredictResult {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct HealthResult {
    pub status: String,
    /// False when the package manager was not found at startup.
    pub registered: bool,
    /// `disabled`, `pending`, `ready` or `failed`.
    pub warmup: String,
}

impl FeedbackParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        let target = self.target.trim();
        if target.is_empty() {
            return Err(ErrorInfo::new("missing_field", "target is required"));
        }
        if target.chars().count() > MAX_TARGET_CHARS {
            return Err(ErrorInfo::new(
                "invalid_target",
                format!("target must be {} characters or fewer", MAX_TARGET_CHARS),
            ));
        }
        if target.chars().any(char::is_whitespace) {
            return Err(ErrorInfo::new(
                "invalid_target",
                "target must be a single command token",
            ));
        }
        if let Some(sent_at) = &self.sent_at {
            if DateTime::parse_from_rfc3339(sent_at).is_err() {
                return Err(ErrorInfo::new("invalid_timestamp", "sent_at must be RFC3339"));
            }
        }
        Ok(())
    }
}

impl PredictParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.input.chars().count() > MAX_INPUT_CHARS {
            return Err(ErrorInfo::new(
                "invalid_input",
                format!("input must be {} characters or fewer", MAX_INPUT_CHARS),
            ));
        }
        Ok(())
    }
}

pub fn parse_feedback(params: Option<Value>) -> Result<FeedbackParams, ErrorInfo> {
    let parsed: FeedbackParams = parse_params(params, "feedback")?;
    parsed.validate()?;
    Ok(parsed)
}

pub fn parse_predict(params: Option<Value>) -> Result<PredictParams, ErrorInfo> {
    let parsed: PredictParams = parse_params(params, "predict")?;
    parsed.validate()?;
    Ok(parsed)
}

/// Missing params are accepted; the event carries no required data.
pub fn parse_command_accepted(params: Option<Value>) -> Result<CommandAcceptedParams, ErrorInfo> {
    match params {
        None => Ok(CommandAcceptedParams {
            command_line: String::new(),
            history: Vec::new(),
        }),
        Some(_) => parse_params(params, "command_accepted"),
    }
}

fn parse_params<T: for<'de> Deserialize<'de>>(
    params: Option<Value>,
    label: &str,
) -> Result<T, ErrorInfo> {
    let params = params.ok_or_else(|| {
        ErrorInfo::new("missing_params", format!("{} requires params", label))
    })?;
    serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("{} payload is invalid JSON: {}", label, err),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_feedback_params() {
        let params = parse_feedback(Some(json!({ "target": "gti" }))).expect("params");
        assert_eq!(params.target, "gti");
        assert!(params.command_line.is_none());
    }

    #[test]
    fn feedback_requires_target() {
        let err = parse_feedback(Some(json!({ "target": "  " }))).unwrap_err();
        assert_eq!(err.code, "missing_field");
        let err = parse_feedback(None).unwrap_err();
        assert_eq!(err.code, "missing_params");
    }

    #[test]
    fn feedback_rejects_multi_token_target() {
        let err = parse_feedback(Some(json!({ "target": "git status" }))).unwrap_err();
        assert_eq!(err.code, "invalid_target");
    }

    #[test]
    fn feedback_rejects_bad_timestamp() {
        let err = parse_feedback(Some(json!({ "target": "gti", "sent_at": "yesterday" })))
            .unwrap_err();
        assert_eq!(err.code, "invalid_timestamp");
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = parse_predict(Some(json!({ "input": "w", "extra": 1 }))).unwrap_err();
        assert_eq!(err.code, "invalid_params");
    }

    #[test]
    fn predict_rejects_oversized_input() {
        let err = parse_predict(Some(json!({ "input": "a".repeat(5000) }))).unwrap_err();
        assert_eq!(err.code, "invalid_input");
    }

    #[test]
    fn command_accepted_params_are_optional() {
        let params = parse_command_accepted(None).expect("params");
        assert!(params.command_line.is_empty());
        let params =
            parse_command_accepted(Some(json!({ "command_line": "git status" }))).expect("params");
        assert_eq!(params.command_line, "git status");
    }

    #[test]
    fn method_names_are_snake_case() {
        let request = Request {
            protocol_version: PROTOCOL_VERSION,
            method: Method::CommandAccepted,
            id: None,
            params: None,
        };
        let encoded = serde_json::to_value(&request).expect("encode");
        assert_eq!(encoded["method"], "command_accepted");
    }
}
