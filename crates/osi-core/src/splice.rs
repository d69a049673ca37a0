//! Target splicing: merge captured regions into a target file

use tracing::{debug, warn};

use crate::error::{Phase, Result, SpliceError};
use crate::lines;
use crate::matcher::{advance_all, MatchState, RegionMatcher, Step};
use crate::rule::RuleKind;
use crate::scan::ScannedRuleSet;

/// Merge the captured regions of `scanned` into `target`
///
/// - A whole-file rule ignores the target and returns the template.
/// - A chunk replaces everything from its start line up to its end line;
///   the end line is kept.
/// - A class replaces its old declaration up to and including the two blank
///   lines that close it, followed by exactly one blank line.
/// - A class still open when the target ends is dropped there; its text is
///   not emitted.
/// - A class absent from the target is appended after a blank-line separator.
///   Separators follow the target's line ending (`\r\n` or `\n`).
/// - A chunk absent from the target, or never closed there, is fatal.
///
/// Nothing is returned unless the whole target was merged.
pub fn splice(scanned: &ScannedRuleSet<'_>, target: &str) -> Result<String> {
    let rule_set = scanned.rule_set();

    if rule_set.is_whole_file() {
        debug!(path = rule_set.path(), "whole-file replacement, target ignored");
        let (_, text) = scanned
            .iter()
            .next()
            .ok_or_else(|| SpliceError::InvalidRuleSet {
                path: rule_set.path().to_string(),
                reason: "no rules".to_string(),
            })?;
        return Ok(text.to_string());
    }

    let captured: Vec<&str> = scanned.iter().map(|(_, text)| text).collect();
    let mut matchers: Vec<RegionMatcher<'_>> =
        rule_set.rules().iter().map(RegionMatcher::new).collect();
    let eol = line_ending(target);
    let mut output = String::with_capacity(target.len());

    for (idx, line) in lines(target).enumerate() {
        let steps = advance_all(&mut matchers, Phase::Target, idx + 1, line)?;

        for (i, step) in steps.iter().enumerate() {
            if let Step::Close { .. } = step {
                let rule = matchers[i].rule();
                debug!(rule = rule.name(), line = idx + 1, "region replaced");
                output.push_str(captured[i]);
                if rule.kind() == RuleKind::ClassRegion {
                    output.push_str(eol);
                }
            }
        }

        if !steps.iter().any(Step::claims) {
            output.push_str(line);
        }
    }

    for matcher in &matchers {
        let rule = matcher.rule();
        if rule.kind() == RuleKind::ChunkRegion && matcher.state() != MatchState::Done {
            return Err(SpliceError::Unresolved {
                rule: rule.name().to_string(),
            });
        }
    }

    for matcher in matchers.iter_mut() {
        if matcher.state() == MatchState::InProgress {
            warn!(
                rule = matcher.rule().name(),
                opened_at = matcher.opened_at().unwrap_or_default(),
                "class region ran to end of target, dropped without emission"
            );
            matcher.finish();
        }
    }

    for (i, matcher) in matchers.iter().enumerate() {
        if matcher.state() == MatchState::NotStarted {
            warn!(rule = matcher.rule().name(), "class not found in target, appending");
            if !output.is_empty() && !output.ends_with('\n') {
                output.push_str(eol);
            }
            output.push_str(eol);
            output.push_str(eol);
            output.push_str(captured[i]);
        }
    }

    Ok(output)
}

/// `\r\n` when the target's first line ends that way, `\n` otherwise
fn line_ending(target: &str) -> &'static str {
    match target.find('\n') {
        Some(i) if target[..i].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{ExtractionRule, Pattern, RuleSet};
    use crate::scan::scan;

    fn merge(rules: Vec<ExtractionRule>, template: &str, target: &str) -> Result<String> {
        let set = RuleSet::new("test", "file.py", rules).unwrap();
        let scanned = scan(&set, template)?;
        splice(&scanned, target)
    }

    fn chunk() -> ExtractionRule {
        ExtractionRule::chunk("c", Pattern::literal("START"), Pattern::literal("END"))
    }

    #[test]
    fn test_chunk_replaces_span_keeps_surroundings() {
        let out = merge(
            vec![chunk()],
            "START\nA\nB\nEND\n",
            "head\nSTART\nC\nEND\ntail\n",
        )
        .unwrap();
        assert_eq!(out, "head\nSTART\nA\nB\nEND\ntail\n");
    }

    #[test]
    fn test_chunk_missing_from_target() {
        let err = merge(vec![chunk()], "START\nA\nEND\n", "nothing here\n").unwrap_err();
        assert_eq!(
            err,
            SpliceError::Unresolved {
                rule: "c".to_string()
            }
        );
    }

    #[test]
    fn test_chunk_never_closed_in_target() {
        let err = merge(vec![chunk()], "START\nA\nEND\n", "START\nC\n").unwrap_err();
        assert!(matches!(err, SpliceError::Unresolved { .. }));
    }

    #[test]
    fn test_class_replaced_in_place() {
        let out = merge(
            vec![ExtractionRule::class("Foo")],
            "class Foo:\n    new = 1\n",
            "import os\n\n\nclass Foo:\n    old = 1\n\n\ndef f():\n    pass\n",
        )
        .unwrap();
        assert_eq!(
            out,
            "import os\n\n\nclass Foo:\n    new = 1\n\ndef f():\n    pass\n"
        );
    }

    #[test]
    fn test_class_running_to_end_of_target() {
        let out = merge(
            vec![ExtractionRule::class("Foo")],
            "class Foo:\n    new = 1\n",
            "x = 1\n\n\nclass Foo:\n    old = 1\n",
        )
        .unwrap();
        assert_eq!(out, "x = 1\n\n\n");
    }

    #[test]
    fn test_class_appended_to_target_without_final_newline() {
        let out = merge(
            vec![ExtractionRule::class("Foo")],
            "class Foo:\n    pass\n",
            "x = 1",
        )
        .unwrap();
        assert_eq!(out, "x = 1\n\n\nclass Foo:\n    pass\n");
    }

    #[test]
    fn test_separators_follow_crlf_target() {
        let out = merge(
            vec![ExtractionRule::class("Foo")],
            "class Foo:\n    pass\n",
            "x = 1\r\ny = 2\r\n",
        )
        .unwrap();
        assert_eq!(out, "x = 1\r\ny = 2\r\n\r\n\r\nclass Foo:\n    pass\n");
    }

    #[test]
    fn test_line_ending() {
        assert_eq!(line_ending("a\r\nb\n"), "\r\n");
        assert_eq!(line_ending("a\nb\r\n"), "\n");
        assert_eq!(line_ending("no newline"), "\n");
    }

    #[test]
    fn test_appended_classes_keep_rule_order() {
        let out = merge(
            vec![ExtractionRule::class("A"), ExtractionRule::class("B")],
            "class A:\n    a\n\n\nclass B:\n    b\n",
            "x = 1\n",
        )
        .unwrap();
        assert_eq!(out, "x = 1\n\n\nclass A:\n    a\n\n\nclass B:\n    b\n");
    }

    #[test]
    fn test_mixed_rules() {
        let template = "class Err:\n    pass\n\n\nSTART\nnew\nEND\n";
        let target = "START\nold\nEND\nrest\n";
        let out = merge(vec![ExtractionRule::class("Err"), chunk()], template, target).unwrap();
        assert_eq!(out, "START\nnew\nEND\nrest\n\n\nclass Err:\n    pass\n");
    }

    #[test]
    fn test_duplicate_class_in_target() {
        let err = merge(
            vec![ExtractionRule::class("Foo")],
            "class Foo:\n    pass\n",
            "class Foo:\n    a\n\n\nclass Foo:\n    b\n",
        )
        .unwrap_err();
        assert_eq!(
            err,
            SpliceError::Duplicate {
                phase: Phase::Target,
                rule: "Foo".to_string(),
                line: 5,
                first_line: 1,
            }
        );
    }

    #[test]
    fn test_whole_file_ignores_target() {
        let out = merge(
            vec![ExtractionRule::whole_file("driver")],
            "new driver\n",
            "old driver\n",
        )
        .unwrap();
        assert_eq!(out, "new driver\n");
    }

    #[test]
    fn test_empty_target_gets_appended_class() {
        let out = merge(vec![ExtractionRule::class("Foo")], "class Foo:\n    pass\n", "").unwrap();
        assert_eq!(out, "\n\nclass Foo:\n    pass\n");
    }
}
