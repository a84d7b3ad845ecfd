//! Progression: badges, levels, completion, next challenge and feedback text.
//! Everything here is a pure function of aggregate points and results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Badge, LevelInfo, NextChallenge, Progress, TestResult};
use crate::util::percentage;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BadgeRule {
  pub name: String,
  pub description: String,
  #[serde(default)]
  pub min_points: Option<u32>,
  #[serde(default)]
  pub requires_all_passed: bool,
  #[serde(default)]
  pub module: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BadgeRules {
  pub rules: Vec<BadgeRule>,
}

impl Default for BadgeRules {
  fn default() -> Self {
    crate::seeds::badge_rules()
  }
}

impl BadgeRules {
  /// Badges in rule order. `total_points` excludes the aggregate bonus.
  pub fn badges_for(&self, results: &[TestResult], total_points: u32, module_id: Option<&str>) -> Vec<Badge> {
    let all_passed = results.iter().all(|r| r.passed);
    self
      .rules
      .iter()
      .filter(|rule| rule.min_points.map_or(true, |min| total_points >= min))
      .filter(|rule| !rule.requires_all_passed || all_passed)
      .filter(|rule| rule.module.as_deref().map_or(true, |m| module_id == Some(m)))
      .map(|rule| Badge { name: rule.name.clone(), description: rule.description.clone() })
      .collect()
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelBand {
  pub name: String,
  pub floor: u32,
}

/// Point bands; band `n` (1-based) spans `[floor_n, floor_{n+1})`, the last
/// band has no ceiling.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelRules {
  pub bands: Vec<LevelBand>,
}

impl Default for LevelRules {
  fn default() -> Self {
    crate::seeds::level_rules()
  }
}

impl LevelRules {
  pub fn level_for(&self, final_points: u32) -> LevelInfo {
    let Some(idx) = self.bands.iter().rposition(|b| final_points >= b.floor) else {
      return LevelInfo::default();
    };
    let band = &self.bands[idx];
    let progress_within_level = match self.bands.get(idx + 1) {
      Some(next) => f64::from(final_points - band.floor) / f64::from(next.floor - band.floor) * 100.0,
      None => 100.0,
    };
    LevelInfo { level: (idx + 1) as u8, name: band.name.clone(), progress_within_level }
  }

  /// Floors must start at zero and strictly increase.
  pub fn is_well_formed(&self) -> bool {
    self.bands.first().is_some_and(|b| b.floor == 0) && self.bands.windows(2).all(|w| w[0].floor < w[1].floor)
  }
}

/// Completion over a batch; an empty batch is 0%.
pub fn progress_for(results: &[TestResult]) -> Progress {
  let total_count = results.len();
  let passed_count = results.iter().filter(|r| r.passed).count();
  Progress {
    percentage: percentage(passed_count, total_count),
    passed_count,
    total_count,
    remaining: total_count - passed_count,
  }
}

/// Forward links from a module to the lesson that follows it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NextChallengeTable {
  pub links: BTreeMap<String, NextChallenge>,
}

impl Default for NextChallengeTable {
  fn default() -> Self {
    crate::seeds::next_challenges()
  }
}

impl NextChallengeTable {
  pub fn next_challenge_for(&self, module_id: Option<&str>, _lesson_id: Option<&str>, all_passed: bool) -> Option<NextChallenge> {
    if !all_passed {
      return None;
    }
    self.links.get(module_id?).cloned()
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedbackTier {
  pub min_points: u32,
  pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestHint {
  pub keyword: String,
  pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackRules {
  /// Checked in order; the first tier whose floor is reached wins.
  pub tiers: Vec<FeedbackTier>,
  pub test_passed: String,
  pub test_errored: String,
  pub test_hints: Vec<TestHint>,
  pub test_default_hint: String,
  pub all_passed: String,
  pub some_failed: String,
  pub submit_completed: String,
  pub submit_incomplete: String,
}

impl Default for FeedbackRules {
  fn default() -> Self {
    crate::seeds::feedback_rules()
  }
}

impl FeedbackRules {
  pub fn overall_feedback(&self, final_points: u32) -> String {
    self
      .tiers
      .iter()
      .find(|t| final_points >= t.min_points)
      .or(self.tiers.last())
      .map(|t| t.message.clone())
      .unwrap_or_default()
  }

  pub fn test_feedback(&self, description: &str, passed: bool) -> String {
    if passed {
      return self.test_passed.clone();
    }
    self
      .test_hints
      .iter()
      .find(|h| description.contains(h.keyword.as_str()))
      .map(|h| h.message.clone())
      .unwrap_or_else(|| self.test_default_hint.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn results(passed: usize, failed: usize) -> Vec<TestResult> {
    (0..passed + failed)
      .map(|i| TestResult {
        description: format!("test {i}"),
        passed: i < passed,
        points: 0,
        message: String::new(),
        feedback: String::new(),
      })
      .collect()
  }

  fn names(badges: &[Badge]) -> Vec<&str> {
    badges.iter().map(|b| b.name.as_str()).collect()
  }

  #[test]
  fn badge_thresholds() {
    let rules = BadgeRules::default();
    assert!(rules.badges_for(&results(1, 1), 99, None).is_empty());
    assert_eq!(names(&rules.badges_for(&results(1, 1), 100, None)), vec!["🚀 Speed Demon"]);
    assert_eq!(
      names(&rules.badges_for(&results(2, 0), 250, None)),
      vec!["🚀 Speed Demon", "💎 Diamond Coder", "🎯 Perfect Score"]
    );
  }

  #[test]
  fn module_badges_need_module_and_points() {
    let rules = BadgeRules::default();
    assert_eq!(names(&rules.badges_for(&results(0, 1), 50, Some("module-5"))), vec!["🔐 Security Expert"]);
    assert!(rules.badges_for(&results(0, 1), 49, Some("module-5")).is_empty());
    assert_eq!(names(&rules.badges_for(&results(0, 1), 60, Some("module-4"))), vec!["🗄️ Database Guru"]);
    assert!(rules.badges_for(&results(0, 1), 60, Some("module-1")).is_empty());
  }

  #[test]
  fn levels_cover_every_band() {
    let rules = LevelRules::default();
    let l = rules.level_for(0);
    assert_eq!((l.level, l.name.as_str(), l.progress_within_level), (1, "🌱 Beginner", 0.0));
    let l = rules.level_for(25);
    assert_eq!((l.level, l.progress_within_level), (1, 50.0));
    let l = rules.level_for(50);
    assert_eq!((l.level, l.name.as_str(), l.progress_within_level), (2, "📚 Student", 0.0));
    let l = rules.level_for(225);
    assert_eq!((l.level, l.progress_within_level), (3, 50.0));
    let l = rules.level_for(450);
    assert_eq!((l.level, l.name.as_str(), l.progress_within_level), (4, "🚀 Expert", 75.0));
    let l = rules.level_for(10_000);
    assert_eq!((l.level, l.name.as_str(), l.progress_within_level), (5, "🏆 Master", 100.0));
  }

  #[test]
  fn level_band_validation() {
    assert!(LevelRules::default().is_well_formed());
    let unordered = LevelRules {
      bands: vec![
        LevelBand { name: "a".into(), floor: 0 },
        LevelBand { name: "b".into(), floor: 10 },
        LevelBand { name: "c".into(), floor: 10 },
      ],
    };
    assert!(!unordered.is_well_formed());
    assert!(!LevelRules { bands: vec![] }.is_well_formed());
  }

  #[test]
  fn progress_handles_empty_batch() {
    let p = progress_for(&[]);
    assert_eq!((p.percentage, p.passed_count, p.total_count, p.remaining), (0, 0, 0, 0));
  }

  #[test]
  fn progress_rounds_half_up() {
    let p = progress_for(&results(3, 2));
    assert_eq!((p.percentage, p.passed_count, p.total_count, p.remaining), (60, 3, 5, 2));
    assert_eq!(progress_for(&results(1, 2)).percentage, 33);
    assert_eq!(progress_for(&results(2, 1)).percentage, 67);
    assert_eq!(progress_for(&results(1, 7)).percentage, 13);
  }

  #[test]
  fn next_challenge_follows_the_module_chain() {
    let table = NextChallengeTable::default();
    let next = table.next_challenge_for(Some("module-1"), Some("lesson-1-1"), true).unwrap();
    assert_eq!(next.module_id, "module-2");
    assert_eq!(next.lesson_id, "lesson-2-1");
    assert_eq!(next.title, "Middleware & Request Processing");
    assert!(table.next_challenge_for(Some("module-1"), None, false).is_none());
    assert!(table.next_challenge_for(Some("module-5"), None, true).is_none());
    assert!(table.next_challenge_for(None, None, true).is_none());
  }

  #[test]
  fn overall_feedback_tiers() {
    let rules = FeedbackRules::default();
    assert!(rules.overall_feedback(100).starts_with("🎉 Outstanding work!"));
    assert!(rules.overall_feedback(50).starts_with("👍 Good progress!"));
    assert!(rules.overall_feedback(49).starts_with("💪 Keep going!"));
  }

  #[test]
  fn test_feedback_hints_by_keyword() {
    let rules = FeedbackRules::default();
    assert_eq!(rules.test_feedback("Should have a GET route", true), "Great job! Your code meets all requirements.");
    assert_eq!(
      rules.test_feedback("Should have a GET route", false),
      "Make sure you have app.get(\"/\", ...) in your code."
    );
    assert_eq!(
      rules.test_feedback("Should add input validation", false),
      "Add proper validation checks for your input data."
    );
    assert_eq!(rules.test_feedback("Should compile", false), "Review the requirements and try again.");
  }
}
