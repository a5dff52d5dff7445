use crate::config::Severity;
use crate::rules::RuleId;
use crate::scan::ScanResult;
use log::warn;
use serde_json::json;
use std::io::Write;
use std::path::Path;

/// One output line: a diagnostic or a per-file failure.
struct Row<'a> {
    path: &'a Path,
    line: usize,
    col: usize,
    /// Rule name, or the failure kind.
    name: &'a str,
    severity: &'a str,
    message: String,
    fix: Option<&'a str>,
    failure: bool,
}

/// Diagnostics and failures merged, sorted by path; within a file
/// diagnostics keep their reported order and come before a failure.
fn rows(result: &ScanResult) -> Vec<Row<'_>> {
    let mut rows: Vec<Row> = result
        .diagnostics()
        .map(|(path, d)| Row {
            path,
            line: d.start.line,
            col: d.start.column,
            name: d.rule.name(),
            severity: d.severity.as_str(),
            message: d.message.clone(),
            fix: d.fix.as_ref().map(|f| f.replacement.as_str()),
            failure: false,
        })
        .collect();
    rows.extend(result.failures.iter().map(|f| {
        let position = f.error.position();
        Row {
            path: &f.path,
            line: position.line,
            col: position.column,
            name: f.error.kind(),
            severity: Severity::Error.as_str(),
            message: f.error.to_string(),
            fix: None,
            failure: true,
        }
    }));
    rows.sort_by(|a, b| a.path.cmp(b.path));
    rows
}

/// Print one line per diagnostic to stdout and a summary to stderr.
pub fn print_text(result: &ScanResult) {
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    write_text(result, &mut stdout, &mut stderr);
}

fn write_text(result: &ScanResult, out: &mut dyn Write, err: &mut dyn Write) {
    for row in rows(result) {
        if row.failure {
            let _ = writeln!(
                out,
                "{}:{}:{}: error: [{}] {}",
                row.path.display(),
                row.line,
                row.col,
                row.name,
                row.message
            );
        } else {
            let _ = writeln!(
                out,
                "{}:{}:{}: [{}] {}",
                row.path.display(),
                row.line,
                row.col,
                row.name,
                row.message
            );
        }
    }

    write_summary_stderr(result, err);
}

/// Print a JSON array to stdout and a summary to stderr.
pub fn print_json(result: &ScanResult) {
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    write_json(result, &mut stdout, &mut stderr);
}

fn write_json(result: &ScanResult, out: &mut dyn Write, err: &mut dyn Write) {
    let entries: Vec<_> = rows(result)
        .into_iter()
        .map(|row| {
            let mut entry = json!({
                "path": row.path.display().to_string(),
                "line": row.line,
                "col": row.col,
                "ruleName": row.name,
                "message": row.message,
                "severity": row.severity,
            });
            if let Some(fix) = row.fix {
                entry["suggestedFix"] = json!(fix);
            }
            entry
        })
        .collect();

    if let Err(e) = serde_json::to_writer_pretty(&mut *out, &entries) {
        warn!("failed to write JSON output: {}", e);
        return;
    }
    let _ = writeln!(out);

    write_summary_stderr(result, err);
}

fn plural(count: usize, one: &str, many: &str) -> String {
    format!("{} {}", count, if count == 1 { one } else { many })
}

fn write_summary_stderr(result: &ScanResult, err: &mut dyn Write) {
    let count = |severity: Severity| {
        result
            .diagnostics()
            .filter(|(_, d)| d.severity == severity)
            .count()
    };
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);
    let infos = count(Severity::Info);
    let failures = result.failures.len();

    let mut parts = Vec::new();
    if errors > 0 {
        parts.push(plural(errors, "error", "errors"));
    }
    if warnings > 0 {
        parts.push(plural(warnings, "warning", "warnings"));
    }
    if infos > 0 {
        parts.push(plural(infos, "note", "notes"));
    }
    if failures > 0 {
        parts.push(format!("{} failed", plural(failures, "file", "files")));
    }
    let fixes = result.fixes_applied();
    if fixes > 0 {
        parts.push(format!("{} applied", plural(fixes, "fix", "fixes")));
    }

    let headline = if parts.is_empty() {
        "No issues found".to_string()
    } else {
        parts.join(", ")
    };
    let _ = writeln!(
        err,
        "{} ({} scanned, {} loaded)",
        headline,
        plural(result.files_scanned, "file", "files"),
        plural(result.rules_loaded, "rule", "rules")
    );
}

/// Print every rule with its default severity and description.
pub fn print_rule_list() {
    let mut stdout = std::io::stdout();
    write_rule_list(&mut stdout);
}

fn write_rule_list(out: &mut dyn Write) {
    for rule in RuleId::ALL {
        let _ = writeln!(
            out,
            "{:<30} {:<8} {}",
            rule.name(),
            rule.default_severity().as_str(),
            rule.description()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Diagnostic;
    use crate::rules::Fix;
    use crate::scan::{FileError, FileFailure, FileReport};
    use crate::syntax::span::{Position, Span};
    use crate::syntax::ParseError;
    use std::path::PathBuf;
    use std::time::Duration;

    fn make_result(reports: Vec<FileReport>, failures: Vec<FileFailure>) -> ScanResult {
        ScanResult {
            reports,
            failures,
            files_scanned: 3,
            rules_loaded: 5,
        }
    }

    fn make_diagnostic(rule: RuleId, line: usize, col: usize, fix: Option<&str>) -> Diagnostic {
        Diagnostic {
            rule,
            severity: rule.default_severity(),
            span: Span::new(0, 1),
            start: Position { line, column: col },
            end: Position { line, column: col + 1 },
            message: format!("{} message", rule.name()),
            suggestion: None,
            fix: fix.map(|r| Fix {
                span: Span::new(0, 1),
                replacement: r.to_string(),
            }),
        }
    }

    fn report(path: &str, diagnostics: Vec<Diagnostic>) -> FileReport {
        FileReport {
            path: PathBuf::from(path),
            diagnostics,
            fixes_applied: 0,
        }
    }

    fn parse_failure(path: &str) -> FileFailure {
        FileFailure {
            path: PathBuf::from(path),
            error: FileError::Parse(ParseError {
                message: "'end' expected near end of file".into(),
                offset: 10,
                position: Position { line: 2, column: 1 },
            }),
        }
    }

    #[test]
    fn text_single_diagnostic() {
        let result = make_result(
            vec![report(
                "scripts/main.lua",
                vec![make_diagnostic(RuleId::TernaryOpportunity, 12, 3, None)],
            )],
            vec![],
        );
        let mut out = Vec::new();
        let mut err = Vec::new();
        write_text(&result, &mut out, &mut err);

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "scripts/main.lua:12:3: [ternary-opportunity] ternary-opportunity message\n"
        );
        assert_eq!(
            String::from_utf8(err).unwrap(),
            "1 warning (3 files scanned, 5 rules loaded)\n"
        );
    }

    #[test]
    fn text_failures_are_tagged_and_sorted() {
        let result = make_result(
            vec![report(
                "b.lua",
                vec![make_diagnostic(RuleId::AssumeAndRefute, 4, 1, None)],
            )],
            vec![
                parse_failure("a.lua"),
                FileFailure {
                    path: PathBuf::from("c.lua"),
                    error: FileError::Timeout(Duration::from_millis(50)),
                },
            ],
        );
        let mut out = Vec::new();
        let mut err = Vec::new();
        write_text(&result, &mut out, &mut err);

        let stdout = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = stdout.lines().collect();
        assert_eq!(
            lines,
            vec![
                "a.lua:2:1: error: [parse-error] 'end' expected near end of file",
                "b.lua:4:1: [assume-and-refute] assume-and-refute message",
                "c.lua:1:1: error: [timeout] analysis exceeded the 50ms budget",
            ]
        );
        let stderr = String::from_utf8(err).unwrap();
        assert!(stderr.starts_with("1 note, 2 files failed"));
    }

    #[test]
    fn text_no_diagnostics() {
        let result = make_result(vec![report("a.lua", vec![])], vec![]);
        let mut out = Vec::new();
        let mut err = Vec::new();
        write_text(&result, &mut out, &mut err);
        assert!(out.is_empty());
        assert_eq!(
            String::from_utf8(err).unwrap(),
            "No issues found (3 files scanned, 5 rules loaded)\n"
        );
    }

    #[test]
    fn json_entries() {
        let result = make_result(
            vec![report(
                "a.lua",
                vec![
                    make_diagnostic(
                        RuleId::RedundantBranchToBoolean,
                        1,
                        1,
                        Some("y.Boolean = x.Boolean"),
                    ),
                    make_diagnostic(RuleId::TernaryOpportunity, 3, 5, None),
                ],
            )],
            vec![parse_failure("b.lua")],
        );
        let mut out = Vec::new();
        let mut err = Vec::new();
        write_json(&result, &mut out, &mut err);

        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let entries = parsed.as_array().unwrap();
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0]["path"], "a.lua");
        assert_eq!(entries[0]["line"], 1);
        assert_eq!(entries[0]["col"], 1);
        assert_eq!(entries[0]["ruleName"], "redundant-branch-to-boolean");
        assert_eq!(entries[0]["severity"], "warning");
        assert_eq!(entries[0]["suggestedFix"], "y.Boolean = x.Boolean");

        assert!(entries[1].get("suggestedFix").is_none());
        assert_eq!(entries[1]["col"], 5);

        assert_eq!(entries[2]["ruleName"], "parse-error");
        assert_eq!(entries[2]["severity"], "error");
        assert_eq!(entries[2]["line"], 2);
    }

    #[test]
    fn json_empty_is_empty_array() {
        let result = make_result(vec![], vec![]);
        let mut out = Vec::new();
        let mut err = Vec::new();
        write_json(&result, &mut out, &mut err);
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, json!([]));
    }

    #[test]
    fn summary_counts_fixes() {
        let mut fixed = report("a.lua", vec![]);
        fixed.fixes_applied = 2;
        let result = make_result(vec![fixed], vec![]);
        let mut err = Vec::new();
        write_summary_stderr(&result, &mut err);
        assert_eq!(
            String::from_utf8(err).unwrap(),
            "2 fixes applied (3 files scanned, 5 rules loaded)\n"
        );
    }

    #[test]
    fn summary_singular_forms() {
        let result = ScanResult {
            reports: vec![report(
                "a.lua",
                vec![make_diagnostic(RuleId::MissingStartupInvocation, 1, 1, None)],
            )],
            failures: vec![],
            files_scanned: 1,
            rules_loaded: 1,
        };
        let mut err = Vec::new();
        write_summary_stderr(&result, &mut err);
        assert_eq!(
            String::from_utf8(err).unwrap(),
            "1 warning (1 file scanned, 1 rule loaded)\n"
        );
    }

    #[test]
    fn rule_list_names_every_rule() {
        let mut out = Vec::new();
        write_rule_list(&mut out);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), RuleId::ALL.len());
        for rule in RuleId::ALL {
            assert!(text.contains(rule.name()));
        }
        assert!(text.contains("assume-and-refute              info"));
    }
}
