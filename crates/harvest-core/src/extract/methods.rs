//! Method extraction: parsed declarations to candidate records.

use crate::errors::HarvestResult;
use crate::extract::parser::{parse_java, CallableKind};
use crate::extract::tokenizer::token_texts;
use crate::models::CandidateRecord;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    pub include_constructors: bool,
}

/// Extract candidate methods from one Java file.
///
/// Records come out in declaration pre-order. A record spans from the first
/// non-annotation line of its declaration to the line holding the body's
/// closing brace; whole lines are sliced, so code sharing either boundary
/// line is included. Bodiless declarations are skipped.
pub fn extract_methods(
    source: &str,
    path: &str,
    options: ExtractOptions,
) -> HarvestResult<Vec<CandidateRecord>> {
    let unit = parse_java(source, path)?;
    let lines: Vec<&str> = source.lines().collect();

    let records = unit
        .callables()
        .into_iter()
        .filter(|(kind, _)| options.include_constructors || *kind == CallableKind::Method)
        .filter_map(|(kind, decl)| {
            let body = decl.body?;
            let start_line = decl.span.start_line;
            let end_line = body.end_line;
            let original_code = slice_lines(&lines, start_line, end_line);
            Some(CandidateRecord {
                method_name: decl.name.clone(),
                kind,
                start_line,
                end_line,
                signature: decl.signature(),
                code_tokens: token_texts(&original_code),
                original_code,
                body_has_code: decl.body_has_code,
                well_formed: decl.well_formed,
            })
        })
        .collect();
    Ok(records)
}

/// [`extract_methods`] with default options, for callers without a path.
pub fn extract(source: &str) -> HarvestResult<Vec<CandidateRecord>> {
    extract_methods(source, "<memory>", ExtractOptions::default())
}

/// Lines `start..=end` (1-based) joined with `\n`; empty for an inverted span.
pub fn slice_lines(lines: &[&str], start: usize, end: usize) -> String {
    if start == 0 || end < start {
        return String::new();
    }
    let end = end.min(lines.len());
    lines
        .get(start - 1..end)
        .map(|slice| slice.join("\n"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HarvestError;

    #[test]
    fn extracts_single_method_example() {
        let src = "\
public class Foo {
  public int bar(int x) {
    return x + 1;
  }
}
";
        let records = extract(src).unwrap();
        assert_eq!(records.len(), 1);
        let bar = &records[0];
        assert_eq!(bar.method_name, "bar");
        assert_eq!(bar.start_line, 2);
        assert_eq!(bar.end_line, 4);
        assert!(bar.signature.contains("public int bar(int x)"));
        assert_eq!(
            bar.original_code,
            "  public int bar(int x) {\n    return x + 1;\n  }"
        );
        assert_eq!(
            bar.code_tokens,
            vec!["public", "int", "bar", "(", "int", "x", ")", "{", "return", "x", "+", "1", ";", "}"]
        );
        assert!(bar.well_formed);
    }

    #[test]
    fn closing_brace_line_is_taken_whole() {
        let src = "class A {\n  void f() {\n    g();\n  } int trailing = 1;\n}\n";
        let records = extract(src).unwrap();
        assert_eq!(records[0].end_line, 4);
        assert!(records[0].original_code.ends_with("} int trailing = 1;"));
    }

    #[test]
    fn one_line_method_spans_a_single_line() {
        let src = "class A {\n  int one() { return 1; }\n}\n";
        let records = extract(src).unwrap();
        assert_eq!((records[0].start_line, records[0].end_line), (2, 2));
        assert_eq!(records[0].original_code, "  int one() { return 1; }");
    }

    #[test]
    fn constructors_only_when_enabled() {
        let src = "class A {\n  A() {\n    init();\n  }\n  void f() {\n    g();\n  }\n}\n";
        let default = extract(src).unwrap();
        assert_eq!(default.len(), 1);
        assert_eq!(default[0].method_name, "f");

        let with_ctor = extract_methods(
            src,
            "A.java",
            ExtractOptions {
                include_constructors: true,
            },
        )
        .unwrap();
        assert_eq!(with_ctor.len(), 2);
        assert_eq!(with_ctor[0].method_name, "A");
        assert_eq!(with_ctor[0].kind, CallableKind::Constructor);
        assert_eq!(with_ctor[0].signature, "A()");
    }

    #[test]
    fn bodiless_methods_are_skipped() {
        let src = "interface I {\n  void a();\n  default void b() {\n    a();\n  }\n}\n";
        let records = extract(src).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].method_name, "b");
        assert_eq!(records[0].signature, "default void b()");
    }

    #[test]
    fn crlf_line_endings_do_not_leak_into_code() {
        let src = "class A {\r\n  void f() {\r\n    g();\r\n  }\r\n}\r\n";
        let records = extract(src).unwrap();
        assert_eq!(records[0].original_code, "  void f() {\n    g();\n  }");
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let err = extract_methods("class {", "Bad.java", ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, HarvestError::Parse { .. }));
    }

    #[test]
    fn slice_lines_handles_out_of_range_spans() {
        let lines = vec!["a", "b", "c"];
        assert_eq!(slice_lines(&lines, 2, 3), "b\nc");
        assert_eq!(slice_lines(&lines, 2, 9), "b\nc");
        assert_eq!(slice_lines(&lines, 3, 2), "");
        assert_eq!(slice_lines(&lines, 0, 2), "");
        assert_eq!(slice_lines(&lines, 5, 6), "");
    }
}
