//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Validating the shape of execute/submit payloads
//!   - Converting wire DTOs into `Submission`s
//!   - Handing them to the shared `Grader`

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{EvaluationResult, Submission, SubmitReport, TestDescriptor, ANONYMOUS_USER};
use crate::protocol::{ExecuteIn, SubmitIn, TestIn};
use crate::state::AppState;
use crate::util::trunc_for_log;

/// Description used for tests that arrive without one.
const UNNAMED_TEST: &str = "Test";

/// Upper bound on pattern text a single client check may carry.
pub const MAX_CHECK_PATTERN_CHARS: usize = 4_096;

#[derive(Debug, Error)]
pub enum InputError {
  #[error("Code must be a string")]
  Code,
  #[error("Tests must be an array")]
  Tests,
  #[error("Invalid test at index {index}: {reason}")]
  Test { index: usize, reason: String },
  #[error("Missing required fields")]
  MissingFields,
  #[error("Invalid request body: {0}")]
  Body(String),
}

impl InputError {
  /// Short label for the `error` field of error bodies.
  pub fn label(&self) -> &'static str {
    match self {
      InputError::Code => "Invalid code input",
      InputError::Tests | InputError::Test { .. } => "Invalid tests input",
      InputError::MissingFields => "Missing required fields",
      InputError::Body(_) => "Invalid request body",
    }
  }
}

fn code_from(value: Option<Value>) -> Result<String, InputError> {
  match value {
    Some(Value::String(code)) => Ok(code),
    _ => Err(InputError::Code),
  }
}

fn tests_from(value: Option<Value>) -> Result<Vec<TestDescriptor>, InputError> {
  let Some(Value::Array(items)) = value else {
    return Err(InputError::Tests);
  };
  items
    .into_iter()
    .enumerate()
    .map(|(index, item)| {
      let test: TestIn =
        serde_json::from_value(item).map_err(|e| InputError::Test { index, reason: e.to_string() })?;
      if let Some(check) = &test.check {
        let chars = check.pattern_chars();
        if chars > MAX_CHECK_PATTERN_CHARS {
          return Err(InputError::Test {
            index,
            reason: format!("patterns total {chars} characters, limit is {MAX_CHECK_PATTERN_CHARS}"),
          });
        }
      }
      let description = test.description.unwrap_or_else(|| UNNAMED_TEST.to_string());
      Ok(match test.check {
        Some(check) => TestDescriptor::with_check(description, check),
        None => TestDescriptor::fallback(description),
      })
    })
    .collect()
}

/// Zero, negative, NaN or overflowing values are treated as "not reported".
fn time_spent_from(seconds: Option<f64>) -> Option<Duration> {
  seconds.filter(|s| *s > 0.0).and_then(|s| Duration::try_from_secs_f64(s).ok())
}

pub fn submission_from_execute(body: ExecuteIn) -> Result<Submission, InputError> {
  let code = code_from(body.code)?;
  let tests = tests_from(body.tests)?;
  Ok(
    Submission::new(code, tests)
      .in_lesson(body.module_id, body.lesson_id)
      .by_user(body.user_id.unwrap_or_else(|| ANONYMOUS_USER.to_string())),
  )
}

pub fn submission_from_submit(body: SubmitIn) -> Result<Submission, InputError> {
  let (Some(user_id), Some(module_id), Some(lesson_id)) = (body.user_id, body.module_id, body.lesson_id) else {
    return Err(InputError::MissingFields);
  };
  if body.code.is_none() || body.tests.is_none() {
    return Err(InputError::MissingFields);
  }
  let code = code_from(body.code)?;
  let tests = tests_from(body.tests)?;
  Ok(
    Submission::new(code, tests)
      .in_lesson(Some(module_id), Some(lesson_id))
      .by_user(user_id)
      .with_time_spent(time_spent_from(body.time_spent)),
  )
}

#[instrument(level = "info", skip(state, body), fields(request_id = %Uuid::new_v4()))]
pub fn execute_submission(state: &AppState, body: ExecuteIn) -> Result<EvaluationResult, InputError> {
  let submission = submission_from_execute(body).inspect_err(|e| {
    warn!(target: "devforge_backend", error = %e, "Rejected execute payload");
  })?;
  debug!(target: "devforge_backend", code = %trunc_for_log(&submission.code, 200), "Execute payload accepted");

  let result = state.grader.evaluate(&submission);
  info!(
    target: "devforge_backend",
    user = %submission.user_id,
    success = result.success,
    final_points = result.final_points,
    failure = ?result.failure,
    "Execute evaluated"
  );
  Ok(result)
}

#[instrument(level = "info", skip(state, body), fields(request_id = %Uuid::new_v4()))]
pub fn submit_submission(state: &AppState, body: SubmitIn) -> Result<SubmitReport, InputError> {
  let submission = submission_from_submit(body).inspect_err(|e| {
    warn!(target: "devforge_backend", error = %e, "Rejected submit payload");
  })?;
  debug!(target: "devforge_backend", code = %trunc_for_log(&submission.code, 200), "Submit payload accepted");

  let report = state.grader.submit(&submission);
  info!(
    target: "devforge_backend",
    user = %submission.user_id,
    success = report.evaluation.success,
    final_points = report.evaluation.final_points,
    accuracy = report.performance.accuracy,
    "Submission recorded"
  );
  Ok(report)
}
