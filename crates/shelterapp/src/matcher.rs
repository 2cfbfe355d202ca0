//! # Storage Matcher
//!
//! Decides whether a stored object belongs to a badge. Storage holds files that
//! were uploaded by hand, renamed, or placed under legacy folder layouts, so a
//! plain prefix check is not enough.
//!
//! Rules are evaluated in order and the first one that fires wins:
//!
//! 1. [`MatchRule::Segment`]: a path segment equals the badge, ignoring case.
//! 2. [`MatchRule::Bounded`]: the badge appears in the file name or path with
//!    no digit directly before or after it.
//! 3. [`MatchRule::BoundedStripped`]: rule 2 with leading zeros removed from the
//!    badge. Only tried when that changes the badge.
//! 4. [`MatchRule::SegmentExact`]: a segment equals the badge or its
//!    zero-stripped form, case-sensitive.
//! 5. [`MatchRule::DigitRun`]: a maximal run of digits in the path equals the
//!    badge once both sides lose their leading zeros.
//! 6. [`MatchRule::WeakSuffix`]: some digit run ends in the same three
//!    characters as the badge. Can be switched off.
//!
//! The digit guard in rule 2 keeps badge `12` from claiming `IN/5123_X/a.pdf`.
//! Rule 6 has no such guard and is the one most likely to misfire; keep it off
//! where badges are short or dense.

use crate::model::StoredObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    Segment,
    Bounded,
    BoundedStripped,
    SegmentExact,
    DigitRun,
    WeakSuffix,
}

struct Candidate<'a> {
    path: &'a str,
    file_name: &'a str,
}

type Predicate = fn(&Candidate<'_>, &str) -> bool;

const RULES: &[(MatchRule, Predicate)] = &[
    (MatchRule::Segment, segment_match),
    (MatchRule::Bounded, bounded_match),
    (MatchRule::BoundedStripped, bounded_stripped_match),
    (MatchRule::SegmentExact, segment_exact_match),
    (MatchRule::DigitRun, digit_run_match),
    (MatchRule::WeakSuffix, weak_suffix_match),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matcher {
    weak_suffix: bool,
}

impl Default for Matcher {
    fn default() -> Self {
        Self { weak_suffix: true }
    }
}

impl Matcher {
    pub fn new(weak_suffix: bool) -> Self {
        Self { weak_suffix }
    }

    pub fn weak_suffix_enabled(&self) -> bool {
        self.weak_suffix
    }

    pub fn matches(&self, object: &StoredObject, badge: &str) -> bool {
        self.matching_rule(&object.path, badge).is_some()
    }

    /// The first rule that associates `path` with `badge`, if any.
    pub fn matching_rule(&self, path: &str, badge: &str) -> Option<MatchRule> {
        let badge = badge.trim();
        if badge.is_empty() {
            return None;
        }
        let candidate = Candidate {
            path,
            file_name: path.rsplit('/').next().unwrap_or(path),
        };
        RULES
            .iter()
            .filter(|(rule, _)| self.weak_suffix || *rule != MatchRule::WeakSuffix)
            .find(|(_, predicate)| predicate(&candidate, badge))
            .map(|(rule, _)| *rule)
    }
}

fn strip_zeros(s: &str) -> &str {
    let stripped = s.trim_start_matches('0');
    if stripped.is_empty() && !s.is_empty() {
        "0"
    } else {
        stripped
    }
}

fn segments<'a>(c: &Candidate<'a>) -> impl Iterator<Item = &'a str> {
    c.path.split('/').filter(|s| !s.is_empty())
}

fn digit_runs(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| !c.is_ascii_digit()).filter(|r| !r.is_empty())
}

fn contains_bounded(haystack: &str, needle: &str) -> bool {
    let haystack = haystack.to_ascii_lowercase();
    let needle = needle.to_ascii_lowercase();
    let bytes = haystack.as_bytes();
    haystack.match_indices(&needle).any(|(start, m)| {
        let end = start + m.len();
        let before_ok = start == 0 || !bytes[start - 1].is_ascii_digit();
        let after_ok = end == bytes.len() || !bytes[end].is_ascii_digit();
        before_ok && after_ok
    })
}

fn segment_match(c: &Candidate<'_>, badge: &str) -> bool {
    segments(c).any(|seg| seg.eq_ignore_ascii_case(badge))
}

fn bounded_match(c: &Candidate<'_>, badge: &str) -> bool {
    contains_bounded(c.file_name, badge) || contains_bounded(c.path, badge)
}

fn bounded_stripped_match(c: &Candidate<'_>, badge: &str) -> bool {
    let stripped = strip_zeros(badge);
    stripped != badge && bounded_match(c, stripped)
}

fn segment_exact_match(c: &Candidate<'_>, badge: &str) -> bool {
    let stripped = strip_zeros(badge);
    segments(c).any(|seg| seg == badge || seg == stripped)
}

fn digit_run_match(c: &Candidate<'_>, badge: &str) -> bool {
    let target = strip_zeros(badge);
    digit_runs(c.path).any(|run| strip_zeros(run) == target)
}

fn weak_suffix_match(c: &Candidate<'_>, badge: &str) -> bool {
    let chars: Vec<char> = badge.chars().collect();
    if chars.len() < 3 {
        return false;
    }
    let suffix: String = chars[chars.len() - 3..].iter().collect();
    digit_runs(c.path).any(|run| run.len() >= 3 && run.ends_with(&suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(path: &str, badge: &str) -> Option<MatchRule> {
        Matcher::default().matching_rule(path, badge)
    }

    fn cand(path: &str) -> Candidate<'_> {
        Candidate {
            path,
            file_name: path.rsplit('/').next().unwrap_or(path),
        }
    }

    #[test]
    fn test_segment_rule() {
        assert!(segment_match(&cand("IN/AB12/x.pdf"), "ab12"));
        assert!(!segment_match(&cand("IN/AB123/x.pdf"), "ab12"));
    }

    #[test]
    fn test_bounded_rule_guards_digits() {
        assert!(bounded_match(&cand("IN/24191_John/a.pdf"), "24191"));
        assert!(bounded_match(&cand("IN/misc/scan-24191-front.jpg"), "24191"));
        assert!(!bounded_match(&cand("IN/5123_X/a.pdf"), "12"));
        assert!(!bounded_match(&cand("IN/misc/241910.pdf"), "24191"));
    }

    #[test]
    fn test_bounded_stripped_rule() {
        assert!(bounded_stripped_match(&cand("IN/742_Lee/a.pdf"), "00742"));
        assert!(!bounded_stripped_match(&cand("IN/742_Lee/a.pdf"), "742"));
    }

    #[test]
    fn test_segment_exact_rule() {
        assert!(segment_exact_match(&cand("legacy/742/a.pdf"), "0742"));
        assert!(!segment_exact_match(&cand("legacy/abc/a.pdf"), "ABC"));
    }

    #[test]
    fn test_digit_run_rule() {
        assert!(digit_run_match(&cand("x/file0742a.pdf"), "742"));
        assert!(digit_run_match(&cand("x/file742.pdf"), "000742"));
        assert!(!digit_run_match(&cand("x/file17420.pdf"), "742"));
    }

    #[test]
    fn test_weak_suffix_rule() {
        assert!(weak_suffix_match(&cand("x/scan99191.pdf"), "24191"));
        assert!(!weak_suffix_match(&cand("x/scan99192.pdf"), "24191"));
        assert!(!weak_suffix_match(&cand("x/scan191.pdf"), "91"));
    }

    #[test]
    fn test_rules_are_ordered() {
        assert_eq!(rule("IN/24191/a.pdf", "24191"), Some(MatchRule::Segment));
        assert_eq!(rule("IN/24191_John/a.pdf", "24191"), Some(MatchRule::Bounded));
        assert_eq!(rule("IN/742_Lee/a.pdf", "0742"), Some(MatchRule::BoundedStripped));
        assert_eq!(rule("x/scan99191.pdf", "24191"), Some(MatchRule::WeakSuffix));
        assert_eq!(rule("x/other.pdf", "24191"), None);
    }

    #[test]
    fn test_tolerance_with_and_without_weak_fallback() {
        let lenient = Matcher::new(true);
        let strict = Matcher::new(false);
        let canonical = StoredObject::new("IN/24191_John_ODoe/passport.pdf");
        let loose = StoredObject::new("IN/24191-passport.pdf");
        let unrelated = StoredObject::new("IN/99999_Other/passport.pdf");
        let suffix_only = StoredObject::new("IN/scan_00191.pdf");

        for m in [lenient, strict] {
            assert!(m.matches(&canonical, "24191"));
            assert!(m.matches(&loose, "24191"));
            assert!(!m.matches(&unrelated, "24191"));
        }
        assert!(lenient.matches(&suffix_only, "24191"));
        assert!(!strict.matches(&suffix_only, "24191"));
    }

    #[test]
    fn test_short_badge_does_not_claim_longer_number() {
        let m = Matcher::new(false);
        assert!(!m.matches(&StoredObject::new("IN/5123_X/a.pdf"), "12"));
        assert!(m.matches(&StoredObject::new("IN/12_X/a.pdf"), "12"));
    }

    #[test]
    fn test_zero_padded_folder_falls_through_to_digit_run() {
        // Digit before the badge defeats the bounded rules; only the run
        // comparison sees through the padding.
        let path = "IN/001234_resident/file.pdf";
        assert_eq!(
            Matcher::new(false).matching_rule(path, "1234"),
            Some(MatchRule::DigitRun)
        );
        assert_eq!(
            Matcher::new(true).matching_rule(path, "1234"),
            Some(MatchRule::DigitRun)
        );
    }

    #[test]
    fn test_suffix_inside_longer_number_needs_weak_fallback() {
        let path = "5551234";
        assert_eq!(Matcher::new(false).matching_rule(path, "234"), None);
        assert_eq!(
            Matcher::new(true).matching_rule(path, "234"),
            Some(MatchRule::WeakSuffix)
        );
        assert!(!Matcher::new(false).weak_suffix_enabled());
    }

    #[test]
    fn test_empty_badge_matches_nothing() {
        assert_eq!(rule("IN/1_A/a.pdf", "  "), None);
    }
}
