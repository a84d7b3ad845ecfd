//! Tiny regular-expression subset used by every textual rule.
//!
//! Supported syntax:
//!   - literal characters, `.` for any character
//!   - escapes `\s \S \d \D \w \W`, `\n`, `\t` and escaped metacharacters (`\.`, `\(`, `\{`, ...)
//!   - bracket classes: `[abc]`, `[a-z]`, `[^'"]`, shorthand escapes inside classes
//!   - quantifiers `*`, `+`, `?`
//!   - optional `^` / `$` anchors
//!
//! Groups and alternation are rejected. Rule tables express alternation with
//! `any_of` checks instead, which keeps every pattern a flat sequence.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
  #[error("quantifier '{0}' at offset {1} has nothing to repeat")]
  DanglingQuantifier(char, usize),
  #[error("unterminated character class starting at offset {0}")]
  UnterminatedClass(usize),
  #[error("pattern ends with a lone backslash")]
  TrailingEscape,
  #[error("unsupported pattern syntax '{0}' at offset {1}")]
  Unsupported(char, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shorthand {
  Space,
  NotSpace,
  Digit,
  NotDigit,
  Word,
  NotWord,
}

impl Shorthand {
  fn from_escape(c: char) -> Option<Self> {
    match c {
      's' => Some(Shorthand::Space),
      'S' => Some(Shorthand::NotSpace),
      'd' => Some(Shorthand::Digit),
      'D' => Some(Shorthand::NotDigit),
      'w' => Some(Shorthand::Word),
      'W' => Some(Shorthand::NotWord),
      _ => None,
    }
  }

  fn matches(self, c: char) -> bool {
    let is_word = c.is_ascii_alphanumeric() || c == '_';
    match self {
      Shorthand::Space => c.is_whitespace(),
      Shorthand::NotSpace => !c.is_whitespace(),
      Shorthand::Digit => c.is_ascii_digit(),
      Shorthand::NotDigit => !c.is_ascii_digit(),
      Shorthand::Word => is_word,
      Shorthand::NotWord => !is_word,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ClassItem {
  Char(char),
  Range(char, char),
  Shorthand(Shorthand),
}

impl ClassItem {
  fn matches(&self, c: char) -> bool {
    match self {
      ClassItem::Char(x) => *x == c,
      ClassItem::Range(lo, hi) => (*lo..=*hi).contains(&c),
      ClassItem::Shorthand(s) => s.matches(c),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Atom {
  Literal(char),
  Any,
  Shorthand(Shorthand),
  Class { negated: bool, items: Vec<ClassItem> },
}

impl Atom {
  fn matches(&self, c: char) -> bool {
    match self {
      Atom::Literal(x) => *x == c,
      Atom::Any => c != '\n',
      Atom::Shorthand(s) => s.matches(c),
      Atom::Class { negated, items } => items.iter().any(|i| i.matches(c)) != *negated,
    }
  }
}

/// `+` is compiled as one mandatory node followed by a `*` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repeat {
  One,
  ZeroOrOne,
  ZeroOrMore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
  atom: Atom,
  repeat: Repeat,
}

/// A compiled pattern. Cheap to clone, matches against any `&str`.
///
/// Matching simulates every alternative at once (one pass over the text, a
/// set of live nodes), so time is bounded by `text × pattern` and nothing
/// recurses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
  nodes: Vec<Node>,
  anchored_start: bool,
  anchored_end: bool,
}

impl Pattern {
  pub fn parse(source: &str) -> Result<Self, PatternError> {
    let chars: Vec<char> = source.chars().collect();
    let mut start = 0usize;
    let mut end = chars.len();

    let anchored_start = chars.first() == Some(&'^');
    if anchored_start {
      start = 1;
    }
    // `$` anchors only when it is not itself escaped (odd run of backslashes).
    let anchored_end = end > start && chars[end - 1] == '$' && {
      let slashes = chars[start..end - 1].iter().rev().take_while(|c| **c == '\\').count();
      slashes % 2 == 0
    };
    if anchored_end {
      end -= 1;
    }

    let mut nodes = Vec::new();
    let mut i = start;
    while i < end {
      let c = chars[i];
      let atom = match c {
        '\\' => {
          let escaped = *chars.get(i + 1).filter(|_| i + 1 < end).ok_or(PatternError::TrailingEscape)?;
          i += 2;
          match Shorthand::from_escape(escaped) {
            Some(s) => Atom::Shorthand(s),
            None => Atom::Literal(escape_literal(escaped)),
          }
        }
        '.' => {
          i += 1;
          Atom::Any
        }
        '[' => {
          let (atom, next) = parse_class(&chars, i, end)?;
          i = next;
          atom
        }
        '*' | '+' | '?' => return Err(PatternError::DanglingQuantifier(c, i)),
        '(' | ')' | '|' => return Err(PatternError::Unsupported(c, i)),
        _ => {
          i += 1;
          Atom::Literal(c)
        }
      };

      match chars.get(i).filter(|_| i < end) {
        Some('*') => {
          i += 1;
          nodes.push(Node { atom, repeat: Repeat::ZeroOrMore });
        }
        Some('+') => {
          i += 1;
          nodes.push(Node { atom: atom.clone(), repeat: Repeat::One });
          nodes.push(Node { atom, repeat: Repeat::ZeroOrMore });
        }
        Some('?') => {
          i += 1;
          nodes.push(Node { atom, repeat: Repeat::ZeroOrOne });
        }
        _ => nodes.push(Node { atom, repeat: Repeat::One }),
      }
    }

    Ok(Self { nodes, anchored_start, anchored_end })
  }

  /// True if the pattern matches anywhere in `text` (honouring anchors).
  pub fn is_match(&self, text: &str) -> bool {
    let accept = self.nodes.len();
    let mut live = LiveSet::new(accept + 1);
    let mut current = Vec::new();
    let mut next = Vec::new();

    live.begin();
    self.enter(0, &mut current, &mut live);

    for c in text.chars() {
      if live.contains(accept) && !self.anchored_end {
        return true;
      }
      live.begin();
      next.clear();
      for &idx in &current {
        let Some(node) = self.nodes.get(idx) else { continue };
        if node.atom.matches(c) {
          let to = if node.repeat == Repeat::ZeroOrMore { idx } else { idx + 1 };
          self.enter(to, &mut next, &mut live);
        }
      }
      if !self.anchored_start {
        self.enter(0, &mut next, &mut live);
      }
      std::mem::swap(&mut current, &mut next);
      if current.is_empty() {
        return false;
      }
    }
    live.contains(accept)
  }

  /// Add `idx` and every node reachable from it without consuming input.
  fn enter(&self, mut idx: usize, list: &mut Vec<usize>, live: &mut LiveSet) {
    while live.insert(idx) {
      list.push(idx);
      match self.nodes.get(idx) {
        Some(node) if node.repeat != Repeat::One => idx += 1,
        _ => break,
      }
    }
  }
}

/// Node membership for one step of the simulation. Stamps avoid clearing.
struct LiveSet {
  stamps: Vec<usize>,
  step: usize,
}

impl LiveSet {
  fn new(len: usize) -> Self {
    Self { stamps: vec![0; len], step: 0 }
  }

  fn begin(&mut self) {
    self.step += 1;
  }

  fn insert(&mut self, idx: usize) -> bool {
    if self.stamps[idx] == self.step {
      return false;
    }
    self.stamps[idx] = self.step;
    true
  }

  fn contains(&self, idx: usize) -> bool {
    self.stamps[idx] == self.step
  }
}

fn escape_literal(c: char) -> char {
  match c {
    'n' => '\n',
    't' => '\t',
    'r' => '\r',
    other => other,
  }
}

fn parse_class(chars: &[char], open: usize, end: usize) -> Result<(Atom, usize), PatternError> {
  let mut i = open + 1;
  let negated = chars.get(i) == Some(&'^') && i < end;
  if negated {
    i += 1;
  }

  let mut items = Vec::new();
  loop {
    if i >= end {
      return Err(PatternError::UnterminatedClass(open));
    }
    let c = chars[i];
    match c {
      ']' => return Ok((Atom::Class { negated, items }, i + 1)),
      '\\' => {
        if i + 1 >= end {
          return Err(PatternError::UnterminatedClass(open));
        }
        let escaped = chars[i + 1];
        items.push(match Shorthand::from_escape(escaped) {
          Some(s) => ClassItem::Shorthand(s),
          None => ClassItem::Char(escape_literal(escaped)),
        });
        i += 2;
      }
      _ => {
        if i + 2 < end && chars[i + 1] == '-' && chars[i + 2] != ']' {
          items.push(ClassItem::Range(c, chars[i + 2]));
          i += 3;
        } else {
          items.push(ClassItem::Char(c));
          i += 1;
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn is_match(pattern: &str, text: &str) -> bool {
    Pattern::parse(pattern).expect("pattern").is_match(text)
  }

  #[test]
  fn literal_search_is_unanchored() {
    assert!(is_match("app\\.listen", "const x = 1; app.listen(3000)"));
    assert!(!is_match("app\\.listen", "applisten"));
  }

  #[test]
  fn optional_whitespace_and_quote_classes() {
    let p = r#"app\.get\s*\(\s*['"]/['"]"#;
    assert!(is_match(p, "app.get('/', handler)"));
    assert!(is_match(p, "app.get (  \"/\" , handler)"));
    assert!(!is_match(p, "app.get('/users', handler)"));
  }

  #[test]
  fn optional_character_and_repeated_equals() {
    assert!(is_match("Hello DevForge!?", "res.send('Hello DevForge')"));
    assert!(is_match("email\\s*===?\\s*undefined", "if (email === undefined)"));
    assert!(is_match("email\\s*===?\\s*undefined", "if (email == undefined)"));
    assert!(!is_match("email\\s*===?\\s*undefined", "if (email = undefined)"));
  }

  #[test]
  fn greedy_runs_give_characters_back() {
    assert!(is_match("a.*b", "a---b---"));
    assert!(is_match("^\\d+0$", "1200"));
    assert!(!is_match("^\\d+0$", "1201"));
  }

  #[test]
  fn anchors_are_respected() {
    assert!(is_match("^const", "const a = 1"));
    assert!(!is_match("^const", "let a; const b"));
    assert!(is_match("\\$$", "price$"));
    assert!(is_match("a\\$", "a$b"));
  }

  #[test]
  fn negated_class_and_ranges() {
    assert!(is_match("[^a-z]x", "Ax"));
    assert!(!is_match("^[^a-z]x", "ax"));
    assert!(is_match("[0-9][0-9][0-9]", "status 404"));
  }

  #[test]
  fn escaped_braces_match_literally() {
    assert!(is_match("try\\s*\\{", "try {"));
    assert!(is_match("catch\\s*\\(", "} catch (err) {"));
  }

  #[test]
  fn rejects_groups_alternation_and_dangling_quantifiers() {
    assert_eq!(Pattern::parse("(a)"), Err(PatternError::Unsupported('(', 0)));
    assert_eq!(Pattern::parse("a|b"), Err(PatternError::Unsupported('|', 1)));
    assert_eq!(Pattern::parse("*a"), Err(PatternError::DanglingQuantifier('*', 0)));
    assert_eq!(Pattern::parse("a**"), Err(PatternError::DanglingQuantifier('*', 2)));
    assert_eq!(Pattern::parse("[abc"), Err(PatternError::UnterminatedClass(0)));
    assert_eq!(Pattern::parse("abc\\"), Err(PatternError::TrailingEscape));
  }

  #[test]
  fn empty_pattern_matches_everything() {
    assert!(is_match("", ""));
    assert!(is_match("", "anything"));
  }

  #[test]
  fn very_long_patterns_do_not_exhaust_the_stack() {
    let long = "a".repeat(100_000);
    assert!(is_match(&format!("^{long}$"), &long));
    assert!(!is_match(&long, "aaa"));
    assert!(!is_match(&format!("^{long}b"), &long));
  }

  #[test]
  fn stacked_quantifiers_stay_linear() {
    let started = std::time::Instant::now();
    let text = format!("const s = '{}';", "a".repeat(10_000));
    assert!(!is_match("a*a*a*a*a*a*a*a*a*a*b", &text));
    assert!(is_match("a*a*a*a*a*a*a*a*a*a*;", &text));
    assert!(started.elapsed() < std::time::Duration::from_secs(2));
  }

  #[test]
  fn plus_requires_one_occurrence() {
    assert!(is_match("^x+$", "xxx"));
    assert!(!is_match("^x+$", ""));
    assert!(is_match("\\d+", "\\ddd"));
  }

  #[test]
  fn non_ascii_text_is_handled_per_character() {
    assert!(is_match("🎉.ok", "🎉 ok"));
  }
}
