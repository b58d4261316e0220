use crate::error::XPathError;
use regex::{Regex, RegexBuilder};

/// Compiles `pattern` with the XPath flag letters `s`, `m`, `i`, `x` and `q`.
pub fn compile_regex(pattern: &str, flags: &str) -> Result<Regex, XPathError> {
    let mut dot_all = false;
    let mut multi_line = false;
    let mut case_insensitive = false;
    let mut extended = false;
    let mut literal = false;

    for flag in flags.chars() {
        match flag {
            's' => dot_all = true,
            'm' => multi_line = true,
            'i' => case_insensitive = true,
            'x' => extended = true,
            'q' => literal = true,
            other => {
                return Err(XPathError::dynamic(
                    "FORX0001",
                    format!("Invalid character '{}' in regular expression flags", other),
                ));
            }
        }
    }

    let builder_pattern = if literal {
        regex::escape(pattern)
    } else if extended {
        strip_whitespace(pattern)
    } else {
        pattern.to_string()
    };

    RegexBuilder::new(&builder_pattern)
        .dot_matches_new_line(dot_all)
        .multi_line(multi_line)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| {
            XPathError::dynamic(
                "FORX0002",
                format!("Invalid regular expression '{}': {}", pattern, e),
            )
        })
}

/// Removes whitespace outside character classes. Unlike the `regex` crate's
/// verbose mode, `#` keeps its literal meaning.
fn strip_whitespace(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut class_depth = 0usize;
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '[' => {
                class_depth += 1;
                out.push(c);
            }
            ']' if class_depth > 0 => {
                class_depth -= 1;
                out.push(c);
            }
            ' ' | '\t' | '\n' | '\r' if class_depth == 0 => {}
            _ => out.push(c),
        }
    }
    out
}

/// True if the regex matches the empty string, which `analyze-string` forbids.
pub fn matches_empty_string(regex: &Regex) -> bool {
    regex.is_match("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_flags() {
        assert!(compile_regex("ABC", "i").unwrap().is_match("xabcx"));
        assert!(compile_regex("a.c", "q").unwrap().is_match("a.c"));
        assert!(!compile_regex("a.c", "q").unwrap().is_match("abc"));
        assert!(compile_regex("a b c", "x").unwrap().is_match("abc"));
    }

    #[test]
    fn extended_flag_only_strips_whitespace() {
        let regex = compile_regex("a # b", "x").unwrap();
        assert!(regex.is_match("a#b"));
        assert!(!regex.is_match("a"));
        assert!(compile_regex("[ ]x", "x").unwrap().is_match(" x"));
    }

    #[test]
    fn rejects_bad_flags_and_patterns() {
        assert_eq!(compile_regex("a", "z").unwrap_err().code(), "FORX0001");
        assert_eq!(compile_regex("(a", "").unwrap_err().code(), "FORX0002");
    }

    #[test]
    fn detects_patterns_matching_empty_string() {
        assert!(matches_empty_string(&compile_regex("a*", "").unwrap()));
        assert!(!matches_empty_string(&compile_regex("a+", "").unwrap()));
    }
}
