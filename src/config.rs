//! Loading grader rule tables from TOML.
//!
//! Every top-level table is optional; whatever the file leaves out comes from
//! `crate::seeds`. Example overriding the level bands and one denylist entry:
//!
//! ```toml
//! [security]
//! deny = [{ pattern = 'process\.exit', message = "Exiting the process is not allowed" }]
//!
//! [[levels.bands]]
//! name = "Novice"
//! floor = 0
//!
//! [[levels.bands]]
//! name = "Pro"
//! floor = 100
//! ```

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use crate::gates::SecurityGate;
use crate::pattern::Pattern;
use crate::predicate::{Check, PredicateError, PredicateLibrary};
use crate::progression::{BadgeRules, FeedbackRules, LevelRules, NextChallengeTable};
use crate::scoring::{BonusRules, QualityRules, ScoringRules};

pub const RULES_PATH_ENV: &str = "GRADER_RULES_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read rules file {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse rules TOML: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("invalid check in {table}: {source}")]
  Check {
    table: &'static str,
    #[source]
    source: PredicateError,
  },
  #[error("empty keyword in {0}")]
  EmptyKeyword(&'static str),
  #[error("level bands must start at 0 and have strictly increasing floors")]
  LevelBands,
  #[error("feedback tiers must not be empty")]
  NoFeedbackTiers,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PerformanceRules {
  /// Efficiency reported when a submission carries no time spent.
  pub default_efficiency: f64,
}

impl Default for PerformanceRules {
  fn default() -> Self {
    crate::seeds::performance_rules()
  }
}

/// Every table the grader consults. Immutable once built.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Rules {
  pub security: SecurityGate,
  pub library: PredicateLibrary,
  pub scoring: ScoringRules,
  pub quality: QualityRules,
  pub bonus: BonusRules,
  pub badges: BadgeRules,
  pub levels: LevelRules,
  pub next_challenges: NextChallengeTable,
  pub feedback: FeedbackRules,
  pub performance: PerformanceRules,
}

impl Rules {
  pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
    let rules: Rules = toml::from_str(s)?;
    rules.validate()?;
    Ok(rules)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    for rule in &self.security.deny {
      Pattern::parse(&rule.pattern).map_err(|source| ConfigError::Check {
        table: "security",
        source: PredicateError::InvalidPattern { pattern: rule.pattern.clone(), source },
      })?;
    }

    if self.library.entries.iter().any(|e| e.keyword.is_empty()) {
      return Err(ConfigError::EmptyKeyword("library"));
    }
    let library_checks = self.library.entries.iter().map(|e| &e.check).chain([&self.library.default]);
    validate_checks("library", library_checks)?;

    if self.scoring.category_bonuses.iter().any(|b| b.keyword.is_empty()) {
      return Err(ConfigError::EmptyKeyword("scoring"));
    }
    validate_checks("scoring", self.scoring.quality_bonuses.iter().map(|b| &b.check))?;
    validate_checks("quality", self.quality.adjustments.iter().map(|a| &a.check))?;
    validate_checks("bonus", self.bonus.rules.iter().filter_map(|r| r.code.as_ref()))?;

    if !self.levels.is_well_formed() {
      return Err(ConfigError::LevelBands);
    }
    if self.feedback.tiers.is_empty() {
      return Err(ConfigError::NoFeedbackTiers);
    }
    Ok(())
  }
}

fn validate_checks<'a>(table: &'static str, checks: impl IntoIterator<Item = &'a Check>) -> Result<(), ConfigError> {
  for check in checks {
    check.validate().map_err(|source| ConfigError::Check { table, source })?;
  }
  Ok(())
}

pub fn load_rules_file(path: &str) -> Result<Rules, ConfigError> {
  let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_string(), source })?;
  Rules::from_toml_str(&s)
}

/// Attempt to load `Rules` from GRADER_RULES_PATH. Unset, unreadable or
/// invalid files yield None (the caller falls back to the built-in tables).
pub fn load_rules_from_env() -> Option<Rules> {
  let path = std::env::var(RULES_PATH_ENV).ok()?;
  match load_rules_file(&path) {
    Ok(rules) => {
      info!(target: "devforge_backend", %path, "Loaded grader rules (TOML)");
      Some(rules)
    }
    Err(e) => {
      error!(target: "devforge_backend", %path, error = %e, "Failed to load grader rules; using built-in tables");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn built_in_rules_are_valid() {
    Rules::default().validate().unwrap();
  }

  #[test]
  fn empty_file_yields_defaults() {
    let rules = Rules::from_toml_str("").unwrap();
    assert_eq!(rules.security.deny.len(), 9);
    assert_eq!(rules.library.entries.len(), 14);
    assert_eq!(rules.levels.bands.len(), 5);
    assert_eq!(rules.scoring.base_points, 10);
  }

  #[test]
  fn partial_tables_override_only_what_they_name() {
    let toml = r#"
      [scoring]
      base_points = 20

      [security]
      deny = [{ pattern = 'alert\s*\(', message = "alert() is not allowed" }]

      [[library.entries]]
      keyword = "uses map"
      check = { kind = "matches", pattern = '\.map\s*\(' }

      [next_challenges.links.module-5]
      module_id = "module-6"
      lesson_id = "lesson-6-1"
      title = "Deployment"
    "#;
    let rules = Rules::from_toml_str(toml).unwrap();
    assert_eq!(rules.scoring.base_points, 20);
    assert_eq!(rules.scoring.category_bonuses.len(), 5);
    assert_eq!(rules.security.deny.len(), 1);
    assert_eq!(rules.security.passed_message, "Code passed security checks");
    assert_eq!(rules.library.entries.len(), 1);
    assert!(rules.library.resolve("uses map").eval("xs.map(f)").unwrap());
    assert_eq!(rules.next_challenges.links["module-5"].module_id, "module-6");
    assert_eq!(rules.feedback.all_passed, "🎉 Excellent! All tests passed!");
  }

  #[test]
  fn invalid_pattern_is_rejected() {
    let toml = r#"
      [security]
      deny = [{ pattern = '(unclosed', message = "x" }]
    "#;
    let err = Rules::from_toml_str(toml).unwrap_err();
    assert!(matches!(err, ConfigError::Check { table: "security", .. }), "{err}");
  }

  #[test]
  fn invalid_level_bands_are_rejected() {
    let toml = r#"
      [[levels.bands]]
      name = "a"
      floor = 10
    "#;
    assert!(matches!(Rules::from_toml_str(toml), Err(ConfigError::LevelBands)));
  }

  #[test]
  fn empty_keyword_is_rejected() {
    let toml = r#"
      [[library.entries]]
      keyword = ""
      check = { kind = "contains", text = "x" }
    "#;
    assert!(matches!(Rules::from_toml_str(toml), Err(ConfigError::EmptyKeyword("library"))));
  }

  #[test]
  fn malformed_toml_is_a_parse_error() {
    assert!(matches!(Rules::from_toml_str("[scoring\nbase_points = 1"), Err(ConfigError::Parse(_))));
  }

  #[test]
  fn missing_file_is_an_io_error() {
    let err = load_rules_file("/definitely/not/here.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
  }
}
