//! Predicates over submission text.
//!
//! Two flavours exist:
//!   - `Check`: declarative, serde-ready predicate trees. Used by the rule
//!     tables and by clients that attach a check to a test over HTTP/WS.
//!   - `Predicate`: an opaque callable. Any `Check` converts into one, and
//!     Rust callers can wrap arbitrary closures.
//!
//! `PredicateLibrary` is the ordered keyword table consulted when a test
//! carries no explicit predicate. Resolution is first-match in table order.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pattern::{Pattern, PatternError};

#[derive(Debug, Error)]
pub enum PredicateError {
  #[error("invalid pattern '{pattern}': {source}")]
  InvalidPattern {
    pattern: String,
    #[source]
    source: PatternError,
  },
  #[error("{0}")]
  Failed(String),
  #[error("predicate panicked: {0}")]
  Panicked(String),
}

/// Declarative predicate over code text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Check {
  /// Plain substring test.
  Contains { text: String },
  /// Pattern search, see `crate::pattern` for the supported syntax.
  Matches { pattern: String },
  AllOf { checks: Vec<Check> },
  AnyOf { checks: Vec<Check> },
  Not { check: Box<Check> },
}

impl Check {
  pub fn contains(text: impl Into<String>) -> Self {
    Check::Contains { text: text.into() }
  }

  pub fn matches(pattern: impl Into<String>) -> Self {
    Check::Matches { pattern: pattern.into() }
  }

  pub fn all_of(checks: impl IntoIterator<Item = Check>) -> Self {
    Check::AllOf { checks: checks.into_iter().collect() }
  }

  pub fn any_of(checks: impl IntoIterator<Item = Check>) -> Self {
    Check::AnyOf { checks: checks.into_iter().collect() }
  }

  pub fn negated(check: Check) -> Self {
    Check::Not { check: Box::new(check) }
  }

  /// Evaluate against `code`. `all_of` / `any_of` short-circuit left to right.
  pub fn eval(&self, code: &str) -> Result<bool, PredicateError> {
    match self {
      Check::Contains { text } => Ok(code.contains(text.as_str())),
      Check::Matches { pattern } => Ok(compile(pattern)?.is_match(code)),
      Check::AllOf { checks } => {
        for check in checks {
          if !check.eval(code)? {
            return Ok(false);
          }
        }
        Ok(true)
      }
      Check::AnyOf { checks } => {
        for check in checks {
          if check.eval(code)? {
            return Ok(true);
          }
        }
        Ok(false)
      }
      Check::Not { check } => Ok(!check.eval(code)?),
    }
  }

  /// Total characters across every pattern in the tree.
  pub fn pattern_chars(&self) -> usize {
    match self {
      Check::Contains { .. } => 0,
      Check::Matches { pattern } => pattern.chars().count(),
      Check::AllOf { checks } | Check::AnyOf { checks } => checks.iter().map(Check::pattern_chars).sum(),
      Check::Not { check } => check.pattern_chars(),
    }
  }

  /// Compile every pattern in the tree without evaluating anything.
  pub fn validate(&self) -> Result<(), PredicateError> {
    match self {
      Check::Contains { .. } => Ok(()),
      Check::Matches { pattern } => compile(pattern).map(|_| ()),
      Check::AllOf { checks } | Check::AnyOf { checks } => checks.iter().try_for_each(Check::validate),
      Check::Not { check } => check.validate(),
    }
  }
}

fn compile(pattern: &str) -> Result<Pattern, PredicateError> {
  Pattern::parse(pattern).map_err(|source| PredicateError::InvalidPattern { pattern: pattern.to_string(), source })
}

pub type PredicateFn = dyn Fn(&str) -> Result<bool, PredicateError> + Send + Sync;

/// Executable predicate attached to a test descriptor.
#[derive(Clone)]
pub struct Predicate(Arc<PredicateFn>);

impl Predicate {
  pub fn new<F>(f: F) -> Self
  where
    F: Fn(&str) -> Result<bool, PredicateError> + Send + Sync + 'static,
  {
    Self(Arc::new(f))
  }

  pub fn from_check(check: Check) -> Self {
    Self::new(move |code| check.eval(code))
  }

  pub fn call(&self, code: &str) -> Result<bool, PredicateError> {
    (self.0)(code)
  }
}

impl fmt::Debug for Predicate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Predicate(..)")
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LibraryEntry {
  pub keyword: String,
  pub check: Check,
}

/// Keyword → predicate table used for tests without an explicit predicate.
///
/// Entry order is a compatibility contract: overlapping keywords resolve to
/// whichever entry is listed first.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PredicateLibrary {
  pub entries: Vec<LibraryEntry>,
  /// Used when no keyword matches: "did the submission start a runnable service".
  pub default: Check,
}

impl Default for PredicateLibrary {
  fn default() -> Self {
    crate::seeds::predicate_library()
  }
}

impl PredicateLibrary {
  pub fn resolve(&self, description: &str) -> &Check {
    self
      .entries
      .iter()
      .find(|e| description.contains(e.keyword.as_str()))
      .map(|e| &e.check)
      .unwrap_or(&self.default)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn combinators_follow_boolean_logic() {
    let code = "try { run() } catch (e) {}";
    assert!(Check::all_of([Check::contains("try"), Check::contains("catch")]).eval(code).unwrap());
    assert!(!Check::all_of([Check::contains("try"), Check::contains("finally")]).eval(code).unwrap());
    assert!(Check::any_of([Check::contains("finally"), Check::contains("catch")]).eval(code).unwrap());
    assert!(Check::negated(Check::contains("var")).eval(code).unwrap());
    assert!(Check::AllOf { checks: vec![] }.eval(code).unwrap());
    assert!(!Check::AnyOf { checks: vec![] }.eval(code).unwrap());
  }

  #[test]
  fn invalid_pattern_is_reported_not_panicked() {
    let err = Check::matches("(oops").eval("anything").unwrap_err();
    assert!(matches!(err, PredicateError::InvalidPattern { .. }));
    assert!(err.to_string().contains("(oops"));
    assert!(Check::any_of([Check::matches("a|b")]).validate().is_err());
  }

  #[test]
  fn check_deserializes_from_tagged_json() {
    let json = r#"{"kind":"all_of","checks":[{"kind":"contains","text":"jwt"},{"kind":"not","check":{"kind":"matches","pattern":"var\\s"}}]}"#;
    let check: Check = serde_json::from_str(json).unwrap();
    assert_eq!(
      check,
      Check::all_of([Check::contains("jwt"), Check::negated(Check::matches("var\\s"))])
    );
    assert!(check.eval("const t = jwt.sign(p)").unwrap());
    assert!(!check.eval("var t = jwt.sign(p)").unwrap());
  }

  #[test]
  fn pattern_chars_sums_the_whole_tree() {
    let check = Check::all_of([
      Check::matches("ab"),
      Check::contains("ignored"),
      Check::negated(Check::any_of([Check::matches("🎉x")])),
    ]);
    assert_eq!(check.pattern_chars(), 4);
  }

  #[test]
  fn closure_predicates_surface_their_errors() {
    let p = Predicate::new(|code| {
      if code.is_empty() {
        Err(PredicateError::Failed("no code".into()))
      } else {
        Ok(code.contains("app.get"))
      }
    });
    assert!(p.call("app.get('/')").unwrap());
    assert_eq!(p.call("").unwrap_err().to_string(), "no code");
  }

  #[test]
  fn library_resolution_is_first_match() {
    let library = PredicateLibrary {
      entries: vec![
        LibraryEntry { keyword: "route".into(), check: Check::contains("first") },
        LibraryEntry { keyword: "GET route".into(), check: Check::contains("second") },
      ],
      default: Check::contains("fallback"),
    };
    assert_eq!(library.resolve("Should have a GET route"), &Check::contains("first"));
    assert_eq!(library.resolve("Should compile"), &Check::contains("fallback"));
  }

  #[test]
  fn stock_library_keeps_its_order() {
    let library = PredicateLibrary::default();
    let keywords: Vec<&str> = library.entries.iter().map(|e| e.keyword.as_str()).collect();
    assert_eq!(
      keywords,
      vec![
        "GET route",
        "Hello DevForge",
        "start without errors",
        "middleware function",
        "timestamp and method",
        "validate email exists",
        "validate password length",
        "return 400",
        "return users array",
        "try-catch block",
        "handle errors properly",
        "validate credentials exist",
        "return token on success",
        "return 401",
      ]
    );
  }

  #[test]
  fn stock_library_predicates_behave() {
    let library = PredicateLibrary::default();
    let server = "const express = require('express');\nconst app = express();\napp.get('/', (req, res) => res.send('Hello DevForge!'));\napp.listen(3000);";

    assert!(library.resolve("Should have a GET route for /").eval(server).unwrap());
    assert!(library.resolve("Should respond with Hello DevForge").eval(server).unwrap());
    assert!(library.resolve("Server should start without errors").eval(server).unwrap());
    assert!(!library.resolve("Should have middleware function").eval(server).unwrap());
    assert!(library.resolve("anything unknown").eval(server).unwrap());
    assert!(!library.resolve("anything unknown").eval("console.log(1)").unwrap());

    let login = "if (!email || !password) { return res.status(401).json({ error: 'Invalid credentials' }) }";
    assert!(library.resolve("Should validate credentials exist").eval(login).unwrap());
    assert!(library.resolve("Should return 401 for bad login").eval(login).unwrap());
    assert!(!library.resolve("Should return 400 on bad input").eval("return 401").unwrap());
  }
}
