//! Small utility helpers used across modules.

/// `round(100 * part / whole)` with halves rounded up; 0 when `whole` is 0.
pub fn percentage(part: usize, whole: usize) -> u32 {
  if whole == 0 {
    return 0;
  }
  ((200 * part + whole) / (2 * whole)) as u32
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with whole submissions; cuts on a char boundary.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn percentage_rounds_and_guards_zero() {
    assert_eq!(percentage(0, 0), 0);
    assert_eq!(percentage(3, 5), 60);
    assert_eq!(percentage(1, 8), 13);
    assert_eq!(percentage(5, 5), 100);
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    assert_eq!(trunc_for_log("short", 10), "short");
    let s = "ab🎉cd";
    // byte 3 falls inside the emoji
    assert_eq!(trunc_for_log(s, 3), format!("ab… ({} bytes total)", s.len()));
  }
}
