//! Domain models used by the grader: submissions, test descriptors, and the
//! result records handed back to the transport.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::predicate::{Check, Predicate};

/// Attribution used when a submission names no user.
pub const ANONYMOUS_USER: &str = "anonymous";

/// How a test decides pass/fail.
#[derive(Clone, Debug)]
pub enum TestCheck {
  /// Caller-supplied predicate; always wins over the library.
  Explicit(Predicate),
  /// Look the description up in the keyword predicate library.
  Fallback,
}

#[derive(Clone, Debug)]
pub struct TestDescriptor {
  pub description: String,
  pub check: TestCheck,
}

impl TestDescriptor {
  pub fn fallback(description: impl Into<String>) -> Self {
    Self { description: description.into(), check: TestCheck::Fallback }
  }

  pub fn explicit(description: impl Into<String>, predicate: Predicate) -> Self {
    Self { description: description.into(), check: TestCheck::Explicit(predicate) }
  }

  pub fn with_check(description: impl Into<String>, check: Check) -> Self {
    Self::explicit(description, Predicate::from_check(check))
  }
}

/// One unit of grading work. The grader only ever borrows it.
#[derive(Clone, Debug)]
pub struct Submission {
  pub code: String,
  pub tests: Vec<TestDescriptor>,
  pub module_id: Option<String>,
  pub lesson_id: Option<String>,
  pub user_id: String,
  pub time_spent: Option<Duration>,
}

impl Submission {
  pub fn new(code: impl Into<String>, tests: Vec<TestDescriptor>) -> Self {
    Self {
      code: code.into(),
      tests,
      module_id: None,
      lesson_id: None,
      user_id: ANONYMOUS_USER.to_string(),
      time_spent: None,
    }
  }

  pub fn in_lesson(mut self, module_id: Option<String>, lesson_id: Option<String>) -> Self {
    self.module_id = module_id;
    self.lesson_id = lesson_id;
    self
  }

  pub fn by_user(mut self, user_id: impl Into<String>) -> Self {
    self.user_id = user_id.into();
    self
  }

  pub fn with_time_spent(mut self, time_spent: Option<Duration>) -> Self {
    self.time_spent = time_spent;
    self
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
  pub description: String,
  pub passed: bool,
  pub points: u32,
  pub message: String,
  pub feedback: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Badge {
  pub name: String,
  pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelInfo {
  pub level: u8,
  pub name: String,
  /// Percentage travelled through the current band (100 for the top band).
  pub progress_within_level: f64,
}

impl Default for LevelInfo {
  fn default() -> Self {
    Self { level: 1, name: String::new(), progress_within_level: 0.0 }
  }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
  pub percentage: u32,
  pub passed_count: usize,
  pub total_count: usize,
  pub remaining: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct NextChallenge {
  pub module_id: String,
  pub lesson_id: String,
  pub title: String,
}

/// Why a submission produced no test results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Failure {
  Security,
  Syntax,
  Internal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
  pub success: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub failure: Option<Failure>,
  pub results: Vec<TestResult>,
  pub total_points: u32,
  pub bonus_points: u32,
  pub final_points: u32,
  pub badges: Vec<Badge>,
  pub level: LevelInfo,
  pub progress: Progress,
  pub feedback: String,
  pub next_challenge: Option<NextChallenge>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
  pub accuracy: u32,
  pub efficiency: f64,
  pub quality: u32,
  pub total_points: u32,
}

/// Result of the "submit and record progress" path.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReport {
  #[serde(flatten)]
  pub evaluation: EvaluationResult,
  pub performance: Performance,
}
