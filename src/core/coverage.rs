//! Hard-tag distribution enforcer.
//!
//! Guarantees that a minimum number of lines in the batch contain every
//! hard tag literally (case-insensitive substring). Injection is
//! position-aware — the strategy rotates with the line index so the
//! batch does not read as four copies of the same edit — and never
//! touches more lines than needed.

use tracing::warn;

use crate::core::normalize::{contains_substring_ci, strip_filler_suffixes, Normalizer};
use crate::schema::line::CandidateLine;

/// Words that read as verbs for the mid-sentence insertion point.
const VERB_HINTS: &[&str] = &[
    "went", "got", "said", "made", "took", "did", "was", "is", "are", "kept", "broke", "fell",
    "tried", "saw", "found",
];

/// Default minimum number of fully covered lines per batch.
pub const DEFAULT_MIN_COVERED: usize = 3;

#[derive(Debug, Clone)]
pub struct CoverageEnforcer {
    min_covered: usize,
}

impl Default for CoverageEnforcer {
    fn default() -> Self {
        Self {
            min_covered: DEFAULT_MIN_COVERED,
        }
    }
}

impl CoverageEnforcer {
    pub fn new(min_covered: usize) -> Self {
        Self { min_covered }
    }

    pub fn min_covered(&self) -> usize {
        self.min_covered
    }

    /// True if the line contains every hard tag.
    pub fn covers(text: &str, hard_tags: &[String]) -> bool {
        hard_tags.iter().all(|t| contains_substring_ci(text, t))
    }

    /// Count of fully covered lines.
    pub fn covered_count(lines: &[CandidateLine], hard_tags: &[String]) -> usize {
        lines
            .iter()
            .filter(|l| Self::covers(&l.text, hard_tags))
            .count()
    }

    /// Bring the batch up to the coverage minimum, re-normalizing after
    /// every injection. Returns batch-level reasons when coverage stays
    /// short even after repair.
    pub fn enforce(
        &self,
        lines: &mut [CandidateLine],
        hard_tags: &[String],
        normalizer: &Normalizer,
    ) -> Vec<String> {
        if hard_tags.is_empty() || lines.is_empty() {
            return Vec::new();
        }

        let target = self.min_covered.min(lines.len());
        let mut covered = Self::covered_count(lines, hard_tags);
        if covered >= target {
            return Vec::new();
        }

        for idx in 0..lines.len() {
            if covered >= target {
                break;
            }
            if Self::covers(&lines[idx].text, hard_tags) {
                continue;
            }

            let bucket = lines[idx].bucket;
            let mut body = strip_filler_suffixes(&lines[idx].text);
            for tag in hard_tags {
                if !contains_substring_ci(&body, tag) {
                    body = inject(&body, tag, idx);
                }
            }
            let mut repaired = normalizer.normalize(&body, bucket);

            // Length fit can truncate a tail insertion; front placement
            // survives it, so retry once from the front.
            if !Self::covers(&repaired, hard_tags) {
                let mut front_body = strip_filler_suffixes(&lines[idx].text);
                for tag in hard_tags {
                    if !contains_substring_ci(&front_body, tag) {
                        front_body = inject_front(&front_body, tag);
                    }
                }
                repaired = normalizer.normalize(&front_body, bucket);
            }

            lines[idx].text = repaired;
            if Self::covers(&lines[idx].text, hard_tags) {
                covered += 1;
            }
        }

        if covered < target {
            warn!(covered, target, "hard tag coverage exhausted repair");
            vec![format!(
                "hard tag coverage {}/{} below minimum {} after injection",
                covered,
                lines.len(),
                target
            )]
        } else {
            Vec::new()
        }
    }
}

/// Position-aware injection: strategy rotates with the line index.
fn inject(body: &str, tag: &str, line_index: usize) -> String {
    match line_index % 3 {
        0 => inject_front(body, tag),
        1 => inject_after_verb(body, tag),
        _ => inject_tail(body, tag),
    }
}

fn inject_front(body: &str, tag: &str) -> String {
    if body.is_empty() {
        return tag.to_string();
    }
    format!("{} watching {}", tag, lowercase_first(body))
}

/// Insert `like <tag>` after the first verb-like word; falls back to
/// the tail clause when no verb shows up.
fn inject_after_verb(body: &str, tag: &str) -> String {
    let words: Vec<&str> = body.split_whitespace().collect();
    let verb_at = words.iter().position(|w| {
        let lower = w.to_lowercase();
        VERB_HINTS.contains(&lower.as_str())
            || (lower.len() > 4 && (lower.ends_with("ed") || lower.ends_with("ing")))
    });
    match verb_at {
        Some(i) => {
            let mut out: Vec<String> = words[..=i].iter().map(|s| s.to_string()).collect();
            out.push("like".to_string());
            out.push(tag.to_string());
            out.extend(words[i + 1..].iter().map(|s| s.to_string()));
            out.join(" ")
        }
        None => inject_tail(body, tag),
    }
}

fn inject_tail(body: &str, tag: &str) -> String {
    if body.is_empty() {
        return tag.to_string();
    }
    format!("{} with {}", body, tag)
}

fn lowercase_first(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut done = false;
    for c in s.chars() {
        if !done && c.is_alphabetic() {
            out.extend(c.to_lowercase());
            done = true;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::line::LengthBucket;

    fn make_lines(texts: &[&str]) -> Vec<CandidateLine> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| CandidateLine::new(*t, i, LengthBucket::new(40, 90)))
            .collect()
    }

    fn tags(ts: &[&str]) -> Vec<String> {
        ts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn scenario_three_of_four_lines_gain_the_tag() {
        let mut lines = make_lines(&[
            "The gym mirror saw everything happen today",
            "Leg day went exactly as badly as promised",
            "My protein shake betrayed me mid sentence",
            "The treadmill kept every single receipt",
        ]);
        let hard = tags(&["Jesse"]);
        let reasons = CoverageEnforcer::default().enforce(&mut lines, &hard, &Normalizer::default());
        assert!(reasons.is_empty(), "unexpected reasons: {:?}", reasons);
        let covered = CoverageEnforcer::covered_count(&lines, &hard);
        assert!(covered >= 3, "only {} lines covered", covered);
    }

    #[test]
    fn does_not_touch_more_lines_than_needed() {
        let mut lines = make_lines(&[
            "Jesse saw the gym mirror crack from effort",
            "Jesse went through leg day without blinking",
            "My protein shake betrayed me mid sentence",
            "The treadmill kept every single receipt",
        ]);
        let hard = tags(&["Jesse"]);
        let before_last = lines[3].text.clone();
        CoverageEnforcer::default().enforce(&mut lines, &hard, &Normalizer::default());
        // Two lines already covered; only one more was needed, so the
        // fourth line stays untouched.
        assert_eq!(lines[3].text, before_last);
    }

    #[test]
    fn already_satisfied_batch_is_untouched() {
        let mut lines = make_lines(&[
            "Jesse saw the gym mirror crack from effort",
            "Jesse went through leg day without blinking",
            "Jesse kept the treadmill receipts on file",
            "The treadmill kept every single receipt",
        ]);
        let hard = tags(&["Jesse"]);
        let before: Vec<String> = lines.iter().map(|l| l.text.clone()).collect();
        let reasons = CoverageEnforcer::default().enforce(&mut lines, &hard, &Normalizer::default());
        assert!(reasons.is_empty());
        let after: Vec<String> = lines.iter().map(|l| l.text.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn multiple_hard_tags_all_required() {
        let mut lines = make_lines(&[
            "The gym mirror saw everything happen today",
            "Leg day went exactly as badly as promised",
            "My protein shake betrayed me mid sentence",
            "The treadmill kept every single receipt",
        ]);
        let hard = tags(&["Jesse", "Tuco"]);
        CoverageEnforcer::default().enforce(&mut lines, &hard, &Normalizer::default());
        let covered = CoverageEnforcer::covered_count(&lines, &hard);
        assert!(covered >= 3, "only {} lines fully covered", covered);
    }

    #[test]
    fn coverage_match_is_case_insensitive_substring() {
        assert!(CoverageEnforcer::covers(
            "Watching JESSE ruin leg day.",
            &tags(&["jesse"])
        ));
        assert!(CoverageEnforcer::covers(
            "The jesseism was strong.",
            &tags(&["jesse"])
        ));
        assert!(!CoverageEnforcer::covers("No names here.", &tags(&["jesse"])));
    }

    #[test]
    fn pathological_tag_reports_exhausted_repair() {
        let mut lines = make_lines(&[
            "Short line one here",
            "Short line two here",
            "Short line three here",
            "Short line four here",
        ]);
        // Longer than the entire bucket: cannot fit, must not panic.
        let hard = tags(&[
            "an absurdly long hard tag that cannot possibly fit inside any of the configured length buckets at all",
        ]);
        let reasons = CoverageEnforcer::default().enforce(&mut lines, &hard, &Normalizer::default());
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("below minimum"), "got: {}", reasons[0]);
    }

    #[test]
    fn empty_tag_list_is_a_no_op() {
        let mut lines = make_lines(&["Anything at all goes here today"]);
        let before = lines[0].text.clone();
        let reasons = CoverageEnforcer::default().enforce(&mut lines, &[], &Normalizer::default());
        assert!(reasons.is_empty());
        assert_eq!(lines[0].text, before);
    }

    #[test]
    fn injection_strategies_differ_by_index() {
        let front = inject("my workout fell apart", "Jesse", 0);
        let mid = inject("my workout fell apart", "Jesse", 1);
        let tail = inject("my workout fell apart", "Jesse", 2);
        assert!(front.starts_with("Jesse"));
        assert!(mid.contains("fell like Jesse"), "got: {}", mid);
        assert!(tail.ends_with("with Jesse"));
        assert_ne!(front, mid);
        assert_ne!(mid, tail);
    }

    #[test]
    fn injected_lines_keep_normalizer_invariants() {
        let mut lines = make_lines(&[
            "The gym mirror saw everything happen today",
            "Leg day went exactly as badly as promised",
            "My protein shake betrayed me mid sentence",
            "The treadmill kept every single receipt",
        ]);
        let hard = tags(&["Jesse"]);
        let normalizer = Normalizer::default();
        CoverageEnforcer::default().enforce(&mut lines, &hard, &normalizer);
        for line in &lines {
            assert!(line.text.ends_with('.'), "bad shape: {}", line.text);
            assert_eq!(line.text.matches('.').count(), 1, "bad shape: {}", line.text);
        }
    }
}
