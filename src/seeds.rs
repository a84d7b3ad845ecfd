//! Built-in rule tables. These are the stock Node.js/Express lessons and
//! guarantee the grader is useful without any external configuration.

use std::collections::BTreeMap;

use crate::config::PerformanceRules;
use crate::domain::NextChallenge;
use crate::gates::{DenyRule, SecurityGate};
use crate::predicate::{Check, LibraryEntry, PredicateLibrary};
use crate::progression::{
  BadgeRule, BadgeRules, FeedbackRules, FeedbackTier, LevelBand, LevelRules, NextChallengeTable, TestHint,
};
use crate::scoring::{BonusRule, BonusRules, CodeAdjustment, CodeBonus, KeywordBonus, QualityRules, ScoringRules};

fn m(pattern: &str) -> Check {
  Check::matches(pattern)
}

fn has(text: &str) -> Check {
  Check::contains(text)
}

fn both(a: Check, b: Check) -> Check {
  Check::all_of([a, b])
}

fn either(a: Check, b: Check) -> Check {
  Check::any_of([a, b])
}

pub fn security_gate() -> SecurityGate {
  let deny = [
    (r"process\.exit", "process.exit() is not allowed"),
    (r#"require\s*\(\s*['"]fs['"]"#, "File system access is not allowed"),
    (r#"require\s*\(\s*['"]child_process['"]"#, "Child process execution is not allowed"),
    (r#"require\s*\(\s*['"]http['"]"#, "HTTP module is not allowed"),
    (r#"require\s*\(\s*['"]https['"]"#, "HTTPS module is not allowed"),
    (r"eval\s*\(", "eval() is not allowed"),
    (r"Function\s*\(", "Function constructor is not allowed"),
    (r"setTimeout\s*\(", "setTimeout is not allowed"),
    (r"setInterval\s*\(", "setInterval is not allowed"),
  ];
  SecurityGate {
    deny: deny
      .iter()
      .map(|(pattern, message)| DenyRule { pattern: pattern.to_string(), message: message.to_string() })
      .collect(),
    passed_message: "Code passed security checks".into(),
  }
}

/// Keyword table for tests without an explicit predicate. Order matters.
pub fn predicate_library() -> PredicateLibrary {
  let entries = vec![
    ("GET route", m(r#"app\.get\s*\(\s*['"]/['"]"#)),
    ("Hello DevForge", m(r"Hello DevForge!?")),
    ("start without errors", both(m(r"app\.listen"), m(r"express\s*\(\s*\)"))),
    ("middleware function", both(m(r"app\.use\s*\("), m(r"next\s*\(\s*\)"))),
    ("timestamp and method", both(m(r"new Date\s*\(\s*\)"), m(r"req\.method"))),
    ("validate email exists", either(m(r"!email"), m(r"email\s*===?\s*undefined"))),
    ("validate password length", both(m(r"password\.length"), m(r"<\s*6"))),
    ("return 400", both(m("400"), m("error"))),
    ("return users array", m(r"res\.json\s*\(\s*users\s*\)")),
    ("try-catch block", both(m(r"try\s*\{"), m(r"catch\s*\("))),
    ("handle errors properly", both(m("500"), m("error"))),
    ("validate credentials exist", either(m(r"!email"), m(r"!password"))),
    ("return token on success", both(m("token"), m(r"res\.json"))),
    ("return 401", both(m("401"), m("Invalid credentials"))),
  ];
  PredicateLibrary {
    entries: entries
      .into_iter()
      .map(|(keyword, check)| LibraryEntry { keyword: keyword.to_string(), check })
      .collect(),
    default: both(m(r"express\s*\(\s*\)"), m(r"app\.listen")),
  }
}

pub fn scoring_rules() -> ScoringRules {
  let categories = [("middleware", 5), ("validation", 5), ("error handling", 5), ("authentication", 10), ("database", 10)];
  ScoringRules {
    base_points: 10,
    category_bonuses: categories
      .iter()
      .map(|(keyword, points)| KeywordBonus { keyword: keyword.to_string(), points: *points })
      .collect(),
    quality_bonuses: vec![
      CodeBonus { check: both(has("try"), has("catch")), points: 3 },
      CodeBonus { check: either(has("const"), has("let")), points: 2 },
      CodeBonus { check: both(has("async"), has("await")), points: 5 },
    ],
  }
}

pub fn quality_rules() -> QualityRules {
  QualityRules {
    baseline: 50,
    adjustments: vec![
      CodeAdjustment { check: either(has("const"), has("let")), delta: 10 },
      CodeAdjustment { check: either(has("//"), has("/*")), delta: 5 },
      CodeAdjustment { check: both(has("try"), has("catch")), delta: 15 },
      CodeAdjustment { check: both(has("async"), has("await")), delta: 10 },
      CodeAdjustment { check: has("var"), delta: -5 },
      // debug prints only count against code that carries no comments at all
      CodeAdjustment { check: both(has("console.log"), Check::negated(has("//"))), delta: -3 },
    ],
  }
}

pub fn bonus_rules() -> BonusRules {
  let rule = |label: &str, points: u32| BonusRule {
    label: label.to_string(),
    points,
    module: None,
    requires_all_passed: false,
    code: None,
  };
  BonusRules {
    rules: vec![
      BonusRule { requires_all_passed: true, ..rule("perfect submission", 25) },
      BonusRule { code: Some(either(has("//"), has("/*"))), ..rule("comments", 5) },
      BonusRule { code: Some(both(has("const"), has("let"))), ..rule("block-scoped declarations", 3) },
      BonusRule { code: Some(both(has("async"), has("await"))), ..rule("async/await", 5) },
      BonusRule {
        module: Some("module-5".into()),
        code: Some(both(has("jwt"), has("bcrypt"))),
        ..rule("token signing with password hashing", 10)
      },
      BonusRule {
        module: Some("module-4".into()),
        code: Some(both(has("try"), has("catch"))),
        ..rule("guarded database access", 10)
      },
    ],
  }
}

pub fn badge_rules() -> BadgeRules {
  let badge = |name: &str, description: &str| BadgeRule {
    name: name.to_string(),
    description: description.to_string(),
    min_points: None,
    requires_all_passed: false,
    module: None,
  };
  BadgeRules {
    rules: vec![
      BadgeRule { min_points: Some(100), ..badge("🚀 Speed Demon", "Fast learner!") },
      BadgeRule { min_points: Some(200), ..badge("💎 Diamond Coder", "Exceptional skills!") },
      BadgeRule { requires_all_passed: true, ..badge("🎯 Perfect Score", "Flawless execution!") },
      BadgeRule {
        min_points: Some(50),
        module: Some("module-5".into()),
        ..badge("🔐 Security Expert", "Security master!")
      },
      BadgeRule {
        min_points: Some(50),
        module: Some("module-4".into()),
        ..badge("🗄️ Database Guru", "Database wizard!")
      },
    ],
  }
}

pub fn level_rules() -> LevelRules {
  let bands = [("🌱 Beginner", 0), ("📚 Student", 50), ("💻 Developer", 150), ("🚀 Expert", 300), ("🏆 Master", 500)];
  LevelRules {
    bands: bands
      .iter()
      .map(|(name, floor)| LevelBand { name: name.to_string(), floor: *floor })
      .collect(),
  }
}

pub fn next_challenges() -> NextChallengeTable {
  let links = [
    ("module-1", "module-2", "lesson-2-1", "Middleware & Request Processing"),
    ("module-2", "module-3", "lesson-3-1", "API Design & Validation"),
    ("module-3", "module-4", "lesson-4-1", "Database Integration"),
    ("module-4", "module-5", "lesson-5-1", "Authentication & Security"),
  ];
  NextChallengeTable {
    links: links
      .iter()
      .map(|(from, module_id, lesson_id, title)| {
        let next = NextChallenge {
          module_id: module_id.to_string(),
          lesson_id: lesson_id.to_string(),
          title: title.to_string(),
        };
        (from.to_string(), next)
      })
      .collect::<BTreeMap<_, _>>(),
  }
}

pub fn feedback_rules() -> FeedbackRules {
  let hints = [
    ("GET route", "Make sure you have app.get(\"/\", ...) in your code."),
    ("Hello DevForge", "Check that your response sends \"Hello DevForge!\" exactly."),
    ("middleware", "Remember to use app.use() and call next() in your middleware."),
    ("validation", "Add proper validation checks for your input data."),
    ("error handling", "Include try-catch blocks and proper error responses."),
  ];
  FeedbackRules {
    tiers: vec![
      FeedbackTier {
        min_points: 100,
        message: "🎉 Outstanding work! You're mastering Node.js concepts quickly!".into(),
      },
      FeedbackTier {
        min_points: 50,
        message: "👍 Good progress! Keep practicing to improve your skills.".into(),
      },
      FeedbackTier {
        min_points: 0,
        message: "💪 Keep going! Every attempt brings you closer to mastery.".into(),
      },
    ],
    test_passed: "Great job! Your code meets all requirements.".into(),
    test_errored: "An error occurred while running this test".into(),
    test_hints: hints
      .iter()
      .map(|(keyword, message)| TestHint { keyword: keyword.to_string(), message: message.to_string() })
      .collect(),
    test_default_hint: "Review the requirements and try again.".into(),
    all_passed: "🎉 Excellent! All tests passed!".into(),
    some_failed: "💪 Keep trying! Some tests failed.".into(),
    submit_completed: "🎉 Challenge completed successfully!".into(),
    submit_incomplete: "💪 Keep practicing!".into(),
  }
}

pub fn performance_rules() -> PerformanceRules {
  PerformanceRules { default_efficiency: 50.0 }
}
