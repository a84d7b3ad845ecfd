//! Points, code-quality score and aggregate bonus.
//!
//! All three are flat, additive rule tables. Stacked bonuses are not capped;
//! only the quality score is clamped.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::TestResult;
use crate::predicate::{Check, PredicateError};

/// Bonus awarded when the test description contains `keyword`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeywordBonus {
  pub keyword: String,
  pub points: u32,
}

/// Bonus awarded when the submitted code satisfies `check`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CodeBonus {
  pub check: Check,
  pub points: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
  pub base_points: u32,
  pub category_bonuses: Vec<KeywordBonus>,
  pub quality_bonuses: Vec<CodeBonus>,
}

impl Default for ScoringRules {
  fn default() -> Self {
    crate::seeds::scoring_rules()
  }
}

impl ScoringRules {
  /// Points for one test: 0 when failed, otherwise base plus every matching
  /// category and code-quality bonus.
  pub fn points_for(&self, description: &str, passed: bool, code: &str) -> Result<u32, PredicateError> {
    if !passed {
      return Ok(0);
    }
    let mut points = self.base_points;
    for bonus in &self.category_bonuses {
      if description.contains(bonus.keyword.as_str()) {
        points = points.saturating_add(bonus.points);
      }
    }
    for bonus in &self.quality_bonuses {
      if bonus.check.eval(code)? {
        points = points.saturating_add(bonus.points);
      }
    }
    Ok(points)
  }
}

/// Signed adjustment applied to the quality score when `check` holds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CodeAdjustment {
  pub check: Check,
  pub delta: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityRules {
  pub baseline: i32,
  pub adjustments: Vec<CodeAdjustment>,
}

impl Default for QualityRules {
  fn default() -> Self {
    crate::seeds::quality_rules()
  }
}

impl QualityRules {
  pub fn quality_score(&self, code: &str) -> Result<u32, PredicateError> {
    let mut score = i64::from(self.baseline);
    for adj in &self.adjustments {
      if adj.check.eval(code)? {
        score += i64::from(adj.delta);
      }
    }
    Ok(score.clamp(0, 100) as u32)
  }
}

/// One row of the aggregate bonus table. Every present condition must hold.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BonusRule {
  pub label: String,
  pub points: u32,
  #[serde(default)]
  pub module: Option<String>,
  #[serde(default)]
  pub requires_all_passed: bool,
  #[serde(default)]
  pub code: Option<Check>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BonusRules {
  pub rules: Vec<BonusRule>,
}

impl Default for BonusRules {
  fn default() -> Self {
    crate::seeds::bonus_rules()
  }
}

impl BonusRule {
  fn applies(&self, code: &str, all_passed: bool, module_id: Option<&str>) -> Result<bool, PredicateError> {
    if let Some(module) = &self.module {
      if module_id != Some(module.as_str()) {
        return Ok(false);
      }
    }
    if self.requires_all_passed && !all_passed {
      return Ok(false);
    }
    match &self.code {
      Some(check) => check.eval(code),
      None => Ok(true),
    }
  }
}

impl BonusRules {
  pub fn bonus_for(&self, code: &str, results: &[TestResult], module_id: Option<&str>) -> Result<u32, PredicateError> {
    let all_passed = results.iter().all(|r| r.passed);
    let mut bonus = 0u32;
    for rule in &self.rules {
      if rule.applies(code, all_passed, module_id)? {
        debug!(target: "grader", label = %rule.label, points = rule.points, "Bonus rule applied");
        bonus = bonus.saturating_add(rule.points);
      }
    }
    Ok(bonus)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn result(passed: bool) -> TestResult {
    TestResult {
      description: "t".into(),
      passed,
      points: 0,
      message: String::new(),
      feedback: String::new(),
    }
  }

  #[test]
  fn failed_tests_earn_nothing() {
    let rules = ScoringRules::default();
    assert_eq!(rules.points_for("Should use authentication middleware", false, "const a = 1").unwrap(), 0);
  }

  #[test]
  fn passed_test_earns_at_least_base() {
    let rules = ScoringRules::default();
    assert_eq!(rules.points_for("Should have a GET route", true, "app.get('/')").unwrap(), rules.base_points);
  }

  #[test]
  fn category_bonuses_stack_independently() {
    let rules = ScoringRules::default();
    // middleware +5, authentication +10
    assert_eq!(rules.points_for("authentication middleware", true, "x").unwrap(), 25);
    // database +10, error handling +5, plus const +2 and try/catch +3
    let code = "const db = open(); try { db.q() } catch (e) {}";
    assert_eq!(rules.points_for("database error handling", true, code).unwrap(), 30);
  }

  #[test]
  fn async_await_quality_bonus() {
    let rules = ScoringRules::default();
    let code = "app.get('/', async (req, res) => { const u = await load(); })";
    // base 10 + const 2 + async/await 5
    assert_eq!(rules.points_for("GET route", true, code).unwrap(), 17);
  }

  #[test]
  fn quality_score_rewards_and_penalises() {
    let rules = QualityRules::default();
    assert_eq!(rules.quality_score("x = 1").unwrap(), 50);
    assert_eq!(rules.quality_score("var x = 1; console.log(x)").unwrap(), 42);
    assert_eq!(rules.quality_score("var x = 1; // note\nconsole.log(x)").unwrap(), 50);
  }

  #[test]
  fn quality_score_is_clamped_with_every_idiom_present() {
    let rules = QualityRules::default();
    let code = "// all of them\nconst a = 1; let b; var c; try { await f() } catch (e) {} async function g() {} console.log(a)";
    let score = rules.quality_score(code).unwrap();
    assert!(score <= 100);
    assert_eq!(score, 85);

    let heavy = QualityRules {
      baseline: 90,
      adjustments: vec![CodeAdjustment { check: Check::contains("a"), delta: 40 }],
    };
    assert_eq!(heavy.quality_score("a").unwrap(), 100);
    let harsh = QualityRules {
      baseline: 10,
      adjustments: vec![CodeAdjustment { check: Check::contains("a"), delta: -40 }],
    };
    assert_eq!(harsh.quality_score("a").unwrap(), 0);
  }

  #[test]
  fn perfect_submission_bonus_requires_every_test() {
    let rules = BonusRules::default();
    assert_eq!(rules.bonus_for("x", &[result(true), result(true)], None).unwrap(), 25);
    assert_eq!(rules.bonus_for("x", &[result(true), result(false)], None).unwrap(), 0);
  }

  #[test]
  fn code_idiom_bonuses() {
    let rules = BonusRules::default();
    let code = "// login\nconst a = 1; let b = async () => await a;";
    // comments 5 + const/let 3 + async/await 5
    assert_eq!(rules.bonus_for(code, &[result(false)], None).unwrap(), 13);
  }

  #[test]
  fn module_bonuses_need_module_and_keywords() {
    let rules = BonusRules::default();
    let code = "jwt.sign(payload); bcrypt.hash(pw)";
    assert_eq!(rules.bonus_for(code, &[result(false)], Some("module-5")).unwrap(), 10);
    assert_eq!(rules.bonus_for(code, &[result(false)], Some("module-3")).unwrap(), 0);
    assert_eq!(rules.bonus_for("jwt.sign(payload)", &[result(false)], Some("module-5")).unwrap(), 0);
    assert_eq!(rules.bonus_for("try { q() } catch (e) {}", &[result(false)], Some("module-4")).unwrap(), 10);
  }
}
