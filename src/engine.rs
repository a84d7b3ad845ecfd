//! Evaluation orchestrator.
//!
//! Flow for one submission:
//!   1) Security gate (first denylist hit rejects)
//!   2) Syntax gate (structural scan rejects)
//!   3) Every test evaluated, in order, never short-circuiting
//!   4) Per-test points, aggregate bonus
//!   5) Badges, level, progress, next challenge, feedback
//!
//! `Grader::evaluate` and `Grader::submit` always return a well-formed
//! record. Rule-check errors and panics (including panics inside
//! caller-supplied predicates) are converted into failure results here.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ConfigError, Rules};
use crate::domain::{
  EvaluationResult, Failure, Performance, Progress, Submission, SubmitReport, TestCheck, TestDescriptor, TestResult,
};
use crate::gates::check_syntax;
use crate::predicate::{Predicate, PredicateError};
use crate::progression::progress_for;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("rule check failed: {0}")]
  Rule(#[from] PredicateError),
}

/// Stateless grader over an immutable rule set. Share it behind an `Arc`.
#[derive(Debug)]
pub struct Grader {
  rules: Rules,
}

impl Grader {
  pub fn new(rules: Rules) -> Result<Self, ConfigError> {
    rules.validate()?;
    Ok(Self { rules })
  }

  pub fn rules(&self) -> &Rules {
    &self.rules
  }

  #[instrument(level = "info", skip(self, submission), fields(user = %submission.user_id, module = ?submission.module_id, code_len = submission.code.len(), tests = submission.tests.len()))]
  pub fn evaluate(&self, submission: &Submission) -> EvaluationResult {
    match guarded(|| self.try_evaluate(submission)) {
      Ok(result) => result,
      Err(reason) => self.rejected(Failure::Internal, format!("Server error: {reason}")),
    }
  }

  /// Grade like `evaluate`, then attach the performance record.
  #[instrument(level = "info", skip(self, submission), fields(user = %submission.user_id, module = ?submission.module_id, code_len = submission.code.len(), tests = submission.tests.len()))]
  pub fn submit(&self, submission: &Submission) -> SubmitReport {
    match guarded(|| self.try_submit(submission)) {
      Ok(report) => report,
      Err(reason) => SubmitReport {
        evaluation: self.rejected(Failure::Internal, format!("Server error: {reason}")),
        performance: Performance::default(),
      },
    }
  }

  /// Run every test against `code`. `results.len() == tests.len()` always.
  pub fn run_tests(&self, tests: &[TestDescriptor], code: &str) -> Result<Vec<TestResult>, EngineError> {
    tests.iter().map(|test| self.run_test(test, code)).collect()
  }

  fn run_test(&self, test: &TestDescriptor, code: &str) -> Result<TestResult, EngineError> {
    let outcome = match &test.check {
      TestCheck::Explicit(predicate) => call_predicate(predicate, code),
      TestCheck::Fallback => self.rules.library.resolve(&test.description).eval(code),
    };

    let passed = match outcome {
      Ok(passed) => passed,
      Err(e) => {
        warn!(target: "grader", description = %test.description, error = %e, "Test predicate failed");
        return Ok(TestResult {
          description: test.description.clone(),
          passed: false,
          points: 0,
          message: format!("Test error: {e}"),
          feedback: self.rules.feedback.test_errored.clone(),
        });
      }
    };

    let points = self.rules.scoring.points_for(&test.description, passed, code)?;
    debug!(target: "grader", description = %test.description, passed, points, "Test evaluated");
    Ok(TestResult {
      description: test.description.clone(),
      passed,
      points,
      message: if passed { "Passed ✅".into() } else { "Failed ❌".into() },
      feedback: self.rules.feedback.test_feedback(&test.description, passed),
    })
  }

  fn try_evaluate(&self, submission: &Submission) -> Result<EvaluationResult, EngineError> {
    let code = submission.code.as_str();
    let module_id = submission.module_id.as_deref();

    let security = self.rules.security.check(code)?;
    if !security.safe {
      warn!(target: "grader", user = %submission.user_id, reason = %security.message, "Submission rejected by security gate");
      return Ok(self.rejected(Failure::Security, security.message));
    }

    let syntax = check_syntax(code);
    if !syntax.valid {
      let reason = syntax.error.unwrap_or_default();
      info!(target: "grader", user = %submission.user_id, %reason, "Submission rejected by syntax gate");
      return Ok(self.rejected(Failure::Syntax, format!("Syntax Error: {reason}")));
    }

    let results = self.run_tests(&submission.tests, code)?;
    let all_passed = results.iter().all(|r| r.passed);
    let total_points = results.iter().fold(0u32, |acc, r| acc.saturating_add(r.points));
    let bonus_points = self.rules.bonus.bonus_for(code, &results, module_id)?;
    let final_points = total_points.saturating_add(bonus_points);

    let badges = self.rules.badges.badges_for(&results, total_points, module_id);
    let level = self.rules.levels.level_for(final_points);
    let progress = progress_for(&results);
    let feedback = self.rules.feedback.overall_feedback(final_points);
    let next_challenge =
      self.rules.next_challenges.next_challenge_for(module_id, submission.lesson_id.as_deref(), all_passed);
    let message = if all_passed { &self.rules.feedback.all_passed } else { &self.rules.feedback.some_failed };

    info!(
      target: "grader",
      user = %submission.user_id,
      passed = progress.passed_count,
      total = progress.total_count,
      total_points,
      bonus_points,
      level = level.level,
      "Submission graded"
    );

    Ok(EvaluationResult {
      success: all_passed,
      message: message.clone(),
      failure: None,
      results,
      total_points,
      bonus_points,
      final_points,
      badges,
      level,
      progress,
      feedback,
      next_challenge,
    })
  }

  fn try_submit(&self, submission: &Submission) -> Result<SubmitReport, EngineError> {
    let mut evaluation = self.try_evaluate(submission)?;
    if evaluation.failure.is_none() {
      evaluation.message = if evaluation.success {
        self.rules.feedback.submit_completed.clone()
      } else {
        self.rules.feedback.submit_incomplete.clone()
      };
    }

    let efficiency = match submission.time_spent {
      Some(spent) => (100.0 - spent.as_secs_f64() / 60.0).max(0.0),
      None => self.rules.performance.default_efficiency,
    };
    let performance = Performance {
      accuracy: evaluation.progress.percentage,
      efficiency,
      quality: self.rules.quality.quality_score(&submission.code)?,
      total_points: evaluation.final_points,
    };
    Ok(SubmitReport { evaluation, performance })
  }

  /// Terminal result for a submission that never reached the tests.
  fn rejected(&self, failure: Failure, message: String) -> EvaluationResult {
    EvaluationResult {
      success: false,
      message,
      failure: Some(failure),
      results: Vec::new(),
      total_points: 0,
      bonus_points: 0,
      final_points: 0,
      badges: Vec::new(),
      level: self.rules.levels.level_for(0),
      progress: Progress::default(),
      feedback: self.rules.feedback.overall_feedback(0),
      next_challenge: None,
    }
  }
}

fn call_predicate(predicate: &Predicate, code: &str) -> Result<bool, PredicateError> {
  panic::catch_unwind(AssertUnwindSafe(|| predicate.call(code)))
    .unwrap_or_else(|payload| Err(PredicateError::Panicked(panic_message(payload.as_ref()))))
}

/// Run `f`, mapping both errors and panics to a printable reason.
fn guarded<T>(f: impl FnOnce() -> Result<T, EngineError>) -> Result<T, String> {
  match panic::catch_unwind(AssertUnwindSafe(f)) {
    Ok(Ok(value)) => Ok(value),
    Ok(Err(e)) => {
      error!(target: "grader", error = %e, "Evaluation failed");
      Err(e.to_string())
    }
    Err(payload) => {
      let reason = panic_message(payload.as_ref());
      error!(target: "grader", %reason, "Evaluation panicked");
      Err(reason)
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}
