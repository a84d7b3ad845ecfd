//! Pre-evaluation gates: the textual security denylist and the structural
//! syntax check. Failing either gate short-circuits grading.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pattern::Pattern;
use crate::predicate::PredicateError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DenyRule {
  pub pattern: String,
  pub message: String,
}

/// Ordered denylist. A textual heuristic, not a sandbox: obfuscated code
/// (string concatenation, bracket property access, ...) gets through.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityGate {
  pub deny: Vec<DenyRule>,
  pub passed_message: String,
}

impl Default for SecurityGate {
  fn default() -> Self {
    crate::seeds::security_gate()
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SecurityVerdict {
  pub safe: bool,
  pub message: String,
}

impl SecurityGate {
  /// First matching rule wins; later rules are not consulted.
  pub fn check(&self, code: &str) -> Result<SecurityVerdict, PredicateError> {
    for rule in &self.deny {
      let pattern = Pattern::parse(&rule.pattern)
        .map_err(|source| PredicateError::InvalidPattern { pattern: rule.pattern.clone(), source })?;
      if pattern.is_match(code) {
        return Ok(SecurityVerdict { safe: false, message: rule.message.clone() });
      }
    }
    Ok(SecurityVerdict { safe: true, message: self.passed_message.clone() })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyntaxError {
  #[error("Unexpected end of input")]
  UnexpectedEnd,
  #[error("Unexpected token '{0}'")]
  UnexpectedToken(char),
  #[error("Invalid or unexpected token")]
  InvalidToken,
  #[error("Unterminated template literal")]
  UnterminatedTemplate,
  #[error("Invalid regular expression: missing /")]
  UnterminatedRegex,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyntaxVerdict {
  pub valid: bool,
  pub error: Option<String>,
}

/// Structural check of a JavaScript function body.
///
/// Nothing is executed or fully parsed. The scan guarantees that string,
/// template, comment and regex literals terminate and that `()`, `[]`, `{}`
/// and `${}` nest correctly. Statement-level grammar (`const = 5;`) is not
/// checked.
pub fn check_syntax(code: &str) -> SyntaxVerdict {
  match scan(code) {
    Ok(()) => SyntaxVerdict { valid: true, error: None },
    Err(e) => SyntaxVerdict { valid: false, error: Some(e.to_string()) },
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
  Paren,
  Bracket,
  Brace,
  Interpolation,
}

impl Frame {
  fn closer(self) -> char {
    match self {
      Frame::Paren => ')',
      Frame::Bracket => ']',
      Frame::Brace | Frame::Interpolation => '}',
    }
  }
}

// After these words a `/` starts a regex literal rather than a division.
const EXPRESSION_KEYWORDS: &[&str] = &[
  "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do", "else", "yield",
  "await",
];

fn scan(code: &str) -> Result<(), SyntaxError> {
  if code.trim().is_empty() {
    return Err(SyntaxError::UnexpectedEnd);
  }

  let chars: Vec<char> = code.chars().collect();
  let mut stack: Vec<Frame> = Vec::new();
  let mut regex_allowed = true;
  let mut i = 0usize;

  while i < chars.len() {
    let c = chars[i];
    let next = chars.get(i + 1).copied();
    match c {
      _ if c.is_whitespace() => i += 1,
      '/' if next == Some('/') => {
        while i < chars.len() && chars[i] != '\n' {
          i += 1;
        }
      }
      '/' if next == Some('*') => {
        i = skip_block_comment(&chars, i)?;
      }
      '/' if regex_allowed => {
        i = skip_regex(&chars, i)?;
        regex_allowed = false;
      }
      '\'' | '"' => {
        i = skip_string(&chars, i)?;
        regex_allowed = false;
      }
      '`' => {
        i = skip_template(&chars, i + 1, &mut stack)?;
        regex_allowed = false;
      }
      '(' | '[' | '{' => {
        stack.push(match c {
          '(' => Frame::Paren,
          '[' => Frame::Bracket,
          _ => Frame::Brace,
        });
        regex_allowed = true;
        i += 1;
      }
      ')' | ']' | '}' => {
        match stack.pop() {
          Some(Frame::Interpolation) if c == '}' => {
            i = skip_template(&chars, i + 1, &mut stack)?;
            regex_allowed = false;
            continue;
          }
          Some(frame) if frame.closer() == c => {}
          _ => return Err(SyntaxError::UnexpectedToken(c)),
        }
        regex_allowed = c == '}';
        i += 1;
      }
      _ if c.is_alphabetic() || c == '_' || c == '$' => {
        let start = i;
        while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
          i += 1;
        }
        let word: String = chars[start..i].iter().collect();
        regex_allowed = EXPRESSION_KEYWORDS.contains(&word.as_str());
      }
      _ if c.is_ascii_digit() => {
        while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_') {
          i += 1;
        }
        regex_allowed = false;
      }
      // Postfix `++` / `--` right after an operand still ends the expression.
      '+' | '-' if next == Some(c) && !regex_allowed => i += 2,
      _ => {
        regex_allowed = true;
        i += 1;
      }
    }
  }

  if stack.is_empty() {
    Ok(())
  } else {
    Err(SyntaxError::UnexpectedEnd)
  }
}

fn skip_block_comment(chars: &[char], open: usize) -> Result<usize, SyntaxError> {
  let mut i = open + 2;
  while i + 1 < chars.len() {
    if chars[i] == '*' && chars[i + 1] == '/' {
      return Ok(i + 2);
    }
    i += 1;
  }
  Err(SyntaxError::InvalidToken)
}

fn skip_string(chars: &[char], open: usize) -> Result<usize, SyntaxError> {
  let quote = chars[open];
  let mut i = open + 1;
  while i < chars.len() {
    match chars[i] {
      '\\' => i += 2,
      '\n' => return Err(SyntaxError::InvalidToken),
      c if c == quote => return Ok(i + 1),
      _ => i += 1,
    }
  }
  Err(SyntaxError::InvalidToken)
}

/// Scan template text starting just after a backtick or a closing `}` of an
/// interpolation. Returns the index after the closing backtick, or after `${`
/// (with an `Interpolation` frame pushed).
fn skip_template(chars: &[char], from: usize, stack: &mut Vec<Frame>) -> Result<usize, SyntaxError> {
  let mut i = from;
  while i < chars.len() {
    match chars[i] {
      '\\' => i += 2,
      '`' => return Ok(i + 1),
      '$' if chars.get(i + 1) == Some(&'{') => {
        stack.push(Frame::Interpolation);
        return Ok(i + 2);
      }
      _ => i += 1,
    }
  }
  Err(SyntaxError::UnterminatedTemplate)
}

fn skip_regex(chars: &[char], open: usize) -> Result<usize, SyntaxError> {
  let mut i = open + 1;
  let mut in_class = false;
  while i < chars.len() {
    match chars[i] {
      '\n' => break,
      '\\' => i += 2,
      '[' => {
        in_class = true;
        i += 1;
      }
      ']' => {
        in_class = false;
        i += 1;
      }
      '/' if !in_class => {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_alphabetic() {
          i += 1;
        }
        return Ok(i);
      }
      _ => i += 1,
    }
  }
  Err(SyntaxError::UnterminatedRegex)
}
