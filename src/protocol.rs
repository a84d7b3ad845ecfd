//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.
//!
//! `code` and `tests` arrive as raw JSON values so that shape errors
//! ("Code must be a string", "Tests must be an array") can be reported
//! precisely instead of as a generic deserialization failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Badge, EvaluationResult, SubmitReport, TestResult};
use crate::predicate::Check;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Execute(ExecuteIn),
    Submit(SubmitIn),
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Evaluation {
        result: EvaluationResult,
    },
    Submission {
        report: SubmitReport,
    },
    Error {
        message: String,
    },
}

/// One test as sent by a client. Without `check` the description is looked
/// up in the keyword library.
#[derive(Debug, Clone, Deserialize)]
pub struct TestIn {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub check: Option<Check>,
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteIn {
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub tests: Option<Value>,
    #[serde(default)]
    pub module_id: Option<String>,
    #[serde(default)]
    pub lesson_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitIn {
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub tests: Option<Value>,
    #[serde(default)]
    pub module_id: Option<String>,
    #[serde(default)]
    pub lesson_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Seconds spent on the challenge.
    #[serde(default)]
    pub time_spent: Option<f64>,
}

/// Body returned for input-shape errors.
#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
    pub success: bool,
    pub results: Vec<TestResult>,
    pub message: String,
    pub points: u32,
    pub badges: Vec<Badge>,
}

impl ErrorOut {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            success: false,
            results: Vec::new(),
            message: message.into(),
            points: 0,
            badges: Vec::new(),
        }
    }
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
