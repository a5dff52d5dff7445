//! Applying suggested rewrites to source text.

use crate::rules::Fix;
use log::debug;

/// Result of applying a batch of fixes to one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub text: String,
    pub applied: usize,
    /// Fixes left out because they overlapped one that was applied.
    pub skipped: usize,
}

/// Apply every non-overlapping fix to `text`.
///
/// Fixes are applied back to front so earlier spans stay valid. When two
/// fixes overlap, the one starting later wins and the other is skipped; a
/// later pass over the rewritten text can pick it up again.
pub fn apply_fixes(text: &str, fixes: &[&Fix]) -> Rewrite {
    let mut ordered: Vec<&Fix> = fixes.to_vec();
    ordered.sort_by(|a, b| (b.span.start, b.span.end).cmp(&(a.span.start, a.span.end)));
    ordered.dedup();

    let mut out = text.to_string();
    let mut applied = 0;
    let mut skipped = 0;
    let mut floor = text.len();

    for fix in ordered {
        let in_bounds = fix.span.start <= fix.span.end
            && fix.span.end <= floor
            && text.is_char_boundary(fix.span.start)
            && text.is_char_boundary(fix.span.end);
        if !in_bounds {
            debug!(
                "skipping fix at {}..{}: out of range or overlapping",
                fix.span.start, fix.span.end
            );
            skipped += 1;
            continue;
        }
        out.replace_range(fix.span.start..fix.span.end, &fix.replacement);
        floor = fix.span.start;
        applied += 1;
    }

    Rewrite {
        text: out,
        applied,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::span::Span;

    fn fix(start: usize, end: usize, replacement: &str) -> Fix {
        Fix {
            span: Span::new(start, end),
            replacement: replacement.to_string(),
        }
    }

    #[test]
    fn applies_back_to_front() {
        let text = "aaa bbb ccc";
        let a = fix(0, 3, "x");
        let c = fix(8, 11, "zzzz");
        let rewrite = apply_fixes(text, &[&a, &c]);
        assert_eq!(rewrite.text, "x bbb zzzz");
        assert_eq!(rewrite.applied, 2);
        assert_eq!(rewrite.skipped, 0);
    }

    #[test]
    fn overlapping_fix_is_skipped() {
        let text = "0123456789";
        let outer = fix(2, 8, "_");
        let inner = fix(4, 6, "-");
        let rewrite = apply_fixes(text, &[&outer, &inner]);
        assert_eq!(rewrite.text, "0123-6789");
        assert_eq!(rewrite.applied, 1);
        assert_eq!(rewrite.skipped, 1);
    }

    #[test]
    fn insertion_at_end_of_replacement() {
        let text = "a = 1";
        let replace = fix(0, 5, "a = 2");
        let insert = fix(5, 5, "\nf(a)");
        let rewrite = apply_fixes(text, &[&insert, &replace]);
        assert_eq!(rewrite.text, "a = 2\nf(a)");
    }

    #[test]
    fn duplicate_fixes_apply_once() {
        let text = "x";
        let one = fix(1, 1, "!");
        let rewrite = apply_fixes(text, &[&one, &one.clone()]);
        assert_eq!(rewrite.text, "x!");
        assert_eq!(rewrite.applied, 1);
    }

    #[test]
    fn out_of_range_fix_is_ignored() {
        let rewrite = apply_fixes("abc", &[&fix(2, 9, "?")]);
        assert_eq!(rewrite.text, "abc");
        assert_eq!(rewrite.skipped, 1);
    }
}
