//! Acceptance rules for candidate methods.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::config::{HarvestConfig, DEFAULT_MAX_LINES, DEFAULT_MIN_LINES};
use crate::errors::{HarvestError, HarvestResult};
use crate::extract::tokenizer::tokenize;
use crate::models::CandidateRecord;

/// How the length of a method is measured against the line bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineCountMode {
    /// `end_line - start_line + 1`.
    #[default]
    Span,
    /// Non-blank lines once comments are removed.
    CodeLines,
}

impl FromStr for LineCountMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "span" => Ok(LineCountMode::Span),
            "code-lines" => Ok(LineCountMode::CodeLines),
            other => Err(format!("unknown line count mode: {other}")),
        }
    }
}

impl fmt::Display for LineCountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LineCountMode::Span => "span",
            LineCountMode::CodeLines => "code-lines",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    TooShort { lines: usize },
    TooLong { lines: usize },
    EmptyBody,
    Unparsed,
}

// Text blocks, string and char literals are matched so that comment markers
// inside them survive; only the comment alternatives are replaced. Text
// blocks come first or `"""` would read as an empty string and a quote.
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)"""(?:\\.|[^\\])*?"""|"(?:\\.|[^"\\\n])*"|'(?:\\.|[^'\\\n])*'|//[^\n]*|/\*.*?\*/"#,
    )
    .unwrap()
});

/// Remove `//` and `/* */` comments, keeping the newlines of block comments.
pub fn strip_comments(code: &str) -> String {
    COMMENT_RE
        .replace_all(code, |caps: &Captures| {
            let m = &caps[0];
            if m.starts_with('"') || m.starts_with('\'') {
                m.to_string()
            } else {
                m.chars().filter(|&c| c == '\n').collect()
            }
        })
        .into_owned()
}

pub fn code_line_count(code: &str) -> usize {
    strip_comments(code)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .count()
}

/// True when the body holds a token other than its braces and bare `;`.
/// The body opens at the first `{` outside parentheses, which skips
/// array initializers inside annotation arguments. Only for free-standing
/// method text: extracted candidates carry the parser's answer in
/// `body_has_code`, which is not fooled by code sharing the first line.
pub fn has_body_code(code: &str) -> bool {
    let mut tokens = tokenize(code);
    let mut paren_depth = 0i32;
    loop {
        let Some(token) = tokens.next() else {
            return false;
        };
        match token.text {
            "(" => paren_depth += 1,
            ")" => paren_depth -= 1,
            "{" if paren_depth <= 0 => break,
            _ => {}
        }
    }
    let mut rest: Vec<&str> = tokens.map(|t| t.text).collect();
    if rest.last() == Some(&"}") {
        rest.pop();
    }
    rest.iter().any(|t| *t != ";")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MethodFilter {
    pub min_lines: usize,
    pub max_lines: usize,
    pub mode: LineCountMode,
}

impl Default for MethodFilter {
    fn default() -> Self {
        Self {
            min_lines: DEFAULT_MIN_LINES,
            max_lines: DEFAULT_MAX_LINES,
            mode: LineCountMode::Span,
        }
    }
}

impl MethodFilter {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            min_lines: config.min_lines,
            max_lines: config.max_lines,
            mode: config.line_count_mode,
        }
    }

    pub fn line_count(&self, record: &CandidateRecord) -> usize {
        match self.mode {
            LineCountMode::Span => record.line_count(),
            LineCountMode::CodeLines => code_line_count(&record.original_code),
        }
    }

    pub fn evaluate(&self, record: &CandidateRecord) -> Result<(), Rejection> {
        if !record.well_formed {
            return Err(Rejection::Unparsed);
        }
        let lines = self.line_count(record);
        if lines < self.min_lines {
            return Err(Rejection::TooShort { lines });
        }
        if lines > self.max_lines {
            return Err(Rejection::TooLong { lines });
        }
        if !record.body_has_code {
            return Err(Rejection::EmptyBody);
        }
        Ok(())
    }

    pub fn accept(&self, record: &CandidateRecord) -> bool {
        self.evaluate(record).is_ok()
    }
}

/// Default-rule acceptance: 3 to 100 lines, non-empty body, clean parse.
pub fn accept(record: &CandidateRecord) -> bool {
    MethodFilter::default().accept(record)
}

/// Reject spans that cannot be sliced: zero start or end before start.
pub fn check_span(record: &CandidateRecord, path: &str) -> HarvestResult<()> {
    if record.start_line == 0 || record.end_line < record.start_line {
        return Err(HarvestError::MalformedRecord {
            path: path.to_string(),
            method_name: record.method_name.clone(),
            start_line: record.start_line,
            end_line: record.end_line,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::methods::extract;
    use crate::extract::parser::CallableKind;

    fn extracted(src: &str, name: &str) -> CandidateRecord {
        extract(src)
            .unwrap()
            .into_iter()
            .find(|c| c.method_name == name)
            .unwrap()
    }

    /// A method spanning exactly `lines` lines, starting at line 10.
    fn method_with_lines(lines: usize) -> CandidateRecord {
        assert!(lines >= 2);
        let mut code = vec!["  void f() { step();".to_string()];
        for i in 0..lines - 2 {
            code.push(format!("    step{i}();"));
        }
        code.push("  }".to_string());
        CandidateRecord {
            method_name: "f".into(),
            kind: CallableKind::Method,
            start_line: 10,
            end_line: 10 + lines - 1,
            signature: "void f()".into(),
            original_code: code.join("\n"),
            code_tokens: Vec::new(),
            body_has_code: true,
            well_formed: true,
        }
    }

    fn with_code(code: &str) -> CandidateRecord {
        let lines = code.lines().count();
        CandidateRecord {
            original_code: code.to_string(),
            end_line: 10 + lines - 1,
            body_has_code: has_body_code(code),
            ..method_with_lines(3)
        }
    }

    #[test]
    fn line_bounds_are_inclusive() {
        assert!(accept(&method_with_lines(3)));
        assert!(accept(&method_with_lines(100)));
        assert_eq!(
            MethodFilter::default().evaluate(&method_with_lines(2)),
            Err(Rejection::TooShort { lines: 2 })
        );
        assert_eq!(
            MethodFilter::default().evaluate(&method_with_lines(101)),
            Err(Rejection::TooLong { lines: 101 })
        );
    }

    #[test]
    fn comment_only_body_is_rejected() {
        let record = with_code("  void f() {\n    // nothing here\n    /* still\n       nothing */\n  }");
        assert_eq!(
            MethodFilter::default().evaluate(&record),
            Err(Rejection::EmptyBody)
        );
    }

    #[test]
    fn blank_body_is_rejected_regardless_of_length() {
        let mut code = vec!["  void f() {"];
        code.extend(std::iter::repeat("").take(20));
        code.push("  }");
        let record = with_code(&code.join("\n"));
        assert_eq!(record.line_count(), 22);
        assert!(!accept(&record));
    }

    #[test]
    fn unparsed_records_are_rejected() {
        let record = CandidateRecord {
            well_formed: false,
            ..method_with_lines(5)
        };
        assert_eq!(
            MethodFilter::default().evaluate(&record),
            Err(Rejection::Unparsed)
        );
    }

    #[test]
    fn braces_in_annotation_arguments_are_not_the_body() {
        assert!(!has_body_code("@Tags({\"a\"}) void f() { }"));
        assert!(has_body_code("@Tags({\"a\"}) void f() { go(); }"));
        assert!(!has_body_code("void f() { ; ; }"));
        assert!(!has_body_code("void f();"));
    }

    #[test]
    fn empty_body_opened_on_the_class_line_is_rejected() {
        let f = extracted("class A { void f() {\n    // nothing\n  }\n}\n", "f");
        assert_eq!(f.start_line, 1);
        assert!(f.original_code.starts_with("class A {"));
        assert!(!f.body_has_code);
        assert_eq!(MethodFilter::default().evaluate(&f), Err(Rejection::EmptyBody));
    }

    #[test]
    fn anonymous_class_method_sharing_a_call_line_is_accepted() {
        let src = "\
class A {
  void run(List<String> xs) {
    xs.forEach(new Consumer<String>() { public void accept(String s) {
      work(s);
      more(s);
    }});
  }
}
";
        let accept_fn = extracted(src, "accept");
        assert_eq!((accept_fn.start_line, accept_fn.end_line), (3, 6));
        assert!(accept_fn.body_has_code);
        assert_eq!(MethodFilter::default().evaluate(&accept_fn), Ok(()));
    }

    #[test]
    fn parsed_bodies_of_only_semicolons_are_empty() {
        let f = extracted("class A {\n  void f() {\n    ;\n  }\n}\n", "f");
        assert!(!f.body_has_code);
        let g = extracted("class A {\n  void g() {\n    { }\n  }\n}\n", "g");
        assert!(g.body_has_code);
    }

    #[test]
    fn text_block_contents_are_not_comments() {
        let code = "  String f() {\n    return \"\"\"\n      http://a // b\n      \"\"\";\n  }";
        assert_eq!(strip_comments(code), code);
        assert_eq!(code_line_count(code), 5);
        assert_eq!(
            strip_comments("x = \"\"\"\n  /* kept */\n  \"\"\"; // gone"),
            "x = \"\"\"\n  /* kept */\n  \"\"\"; "
        );
    }

    #[test]
    fn code_lines_mode_ignores_comments_and_blank_lines() {
        let record = with_code(
            "  void f() {\n    // a\n\n    /* b\n       c */\n    go(\"//not a comment\");\n  }",
        );
        assert_eq!(record.line_count(), 7);
        let filter = MethodFilter {
            mode: LineCountMode::CodeLines,
            ..MethodFilter::default()
        };
        assert_eq!(filter.line_count(&record), 3);
        assert!(filter.accept(&record));

        let strict = MethodFilter {
            min_lines: 4,
            ..filter
        };
        assert_eq!(
            strict.evaluate(&record),
            Err(Rejection::TooShort { lines: 3 })
        );
    }

    #[test]
    fn strip_comments_keeps_string_contents() {
        assert_eq!(
            strip_comments("a(\"http://x\"); // tail\nb('/'); /* c */"),
            "a(\"http://x\"); \nb('/'); "
        );
    }

    #[test]
    fn check_span_flags_inverted_ranges() {
        let mut record = method_with_lines(3);
        assert!(check_span(&record, "A.java").is_ok());
        record.end_line = record.start_line - 1;
        let err = check_span(&record, "A.java").unwrap_err();
        assert!(matches!(err, HarvestError::MalformedRecord { .. }));
    }

    #[test]
    fn line_count_mode_parses_from_strings() {
        assert_eq!("span".parse::<LineCountMode>(), Ok(LineCountMode::Span));
        assert_eq!("code_lines".parse::<LineCountMode>(), Ok(LineCountMode::CodeLines));
        assert!("words".parse::<LineCountMode>().is_err());
        assert_eq!(LineCountMode::CodeLines.to_string(), "code-lines");
    }
}
