//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Collapse every whitespace run into a single underscore ("Odd One Out" -> "Odd_One_Out").
pub fn underscore_whitespace(s: &str) -> String {
  s.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Log-safe truncation for large strings (SVG payloads get big quickly).
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let cut = s.char_indices().map(|(i, _)| i).take_while(|i| *i <= max).last().unwrap_or(0);
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_repeated_placeholders() {
    let out = fill_template("{a}-{b}-{a}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x-y-x");
  }

  #[test]
  fn underscores_whitespace_runs() {
    assert_eq!(underscore_whitespace("Codes  and\tGrids"), "Codes_and_Grids");
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    let s = "ééééé";
    let t = trunc_for_log(s, 3);
    assert!(t.starts_with("é…"));
    assert_eq!(trunc_for_log("short", 10), "short");
  }
}
