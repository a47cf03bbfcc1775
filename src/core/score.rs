//! Batch quality scorer — per-line and per-batch scoring plus the
//! retry/accept decision. Pure: never mutates its input.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::content::{ContentContext, ContentEnforcer};
use crate::core::coverage::CoverageEnforcer;
use crate::core::normalize::{ends_dangling, Normalizer};
use crate::core::voice::VoiceCatalog;
use crate::schema::line::{CandidateLine, Issue};
use crate::schema::report::{BatchReport, LineReport};

/// Generator-artifact openers that read as machine output.
static ROBOTIC_OPENERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^as an ai\b",
        r"(?i)^here is a\b",
        r"(?i)^here's a\b",
        r"(?i)^sure here\b",
        r"(?i)^caption\b",
        r"(?i)^i cannot\b",
        r"(?i)^check out\b",
        r"(?i)^introducing\b",
        r"(?i)^behold\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid robotic-opener regex"))
    .collect()
});

/// Default overall score below which a retry is recommended.
pub const DEFAULT_RETRY_THRESHOLD: u8 = 75;

/// Default cap on distinct issue categories before a retry is
/// recommended regardless of score.
pub const DEFAULT_MAX_ISSUE_CATEGORIES: usize = 2;

/// Everything the scorer needs to judge a batch.
pub struct ScoreContext<'a> {
    pub content: ContentContext<'a>,
    pub hard_tags: &'a [String],
    pub min_coverage: usize,
    pub voices: &'a VoiceCatalog,
    pub normalizer: &'a Normalizer,
    /// Display label of the entity the batch was supposed to carry.
    pub entity_label: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct Scorer {
    threshold: u8,
    max_issue_categories: usize,
}

impl Default for Scorer {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_RETRY_THRESHOLD,
            max_issue_categories: DEFAULT_MAX_ISSUE_CATEGORIES,
        }
    }
}

impl Scorer {
    pub fn new(threshold: u8, max_issue_categories: usize) -> Self {
        Self {
            threshold,
            max_issue_categories,
        }
    }

    /// Score the batch. `batch_reasons` carries upstream batch-level
    /// failures (coverage exhaustion, entity drought); any of them
    /// forces a retry recommendation.
    pub fn score(
        &self,
        lines: &[CandidateLine],
        ctx: &ScoreContext<'_>,
        mut batch_reasons: Vec<String>,
    ) -> BatchReport {
        let mut per_line_issues: Vec<Vec<Issue>> = Vec::with_capacity(lines.len());
        for line in lines {
            per_line_issues.push(self.line_issues(line, ctx));
        }

        let format_score = fraction_score(lines.len(), |i| {
            !per_line_issues[i]
                .iter()
                .any(|is| matches!(is.category(), "format" | "length"))
        });
        let context_score = fraction_score(lines.len(), |i| {
            !per_line_issues[i]
                .iter()
                .any(|is| matches!(is.category(), "lexicon" | "tone" | "rating" | "soft_tag"))
        });
        let voice_score = fraction_score(lines.len(), |i| {
            !per_line_issues[i].iter().any(|is| is.category() == "voice")
        });
        let delivery_score = fraction_score(lines.len(), |i| {
            !per_line_issues[i]
                .iter()
                .any(|is| is.category() == "delivery")
        });

        let coverage_score = if ctx.hard_tags.is_empty() {
            100
        } else {
            let target = ctx.min_coverage.min(lines.len()).max(1);
            let covered = CoverageEnforcer::covered_count(lines, ctx.hard_tags);
            ((covered.min(target) * 100) / target) as u8
        };

        if let Some(label) = ctx.entity_label {
            if !lines
                .iter()
                .any(|l| crate::core::normalize::contains_substring_ci(&l.text, label))
            {
                batch_reasons.push(format!("pop culture entity '{}' not present", label));
            }
        }

        let sub_scores: Vec<(String, u8)> = vec![
            ("format".to_string(), format_score),
            ("context".to_string(), context_score),
            ("voice".to_string(), voice_score),
            ("tag_coverage".to_string(), coverage_score),
            ("delivery".to_string(), delivery_score),
        ];
        let overall =
            (sub_scores.iter().map(|(_, s)| *s as u32).sum::<u32>() / sub_scores.len() as u32) as u8;

        let distinct_categories = {
            let mut cats: Vec<&str> = Vec::new();
            for issues in &per_line_issues {
                for issue in issues {
                    if !cats.contains(&issue.category()) {
                        cats.push(issue.category());
                    }
                }
            }
            cats.len()
        };

        let retry_recommended = overall < self.threshold
            || distinct_categories > self.max_issue_categories
            || !batch_reasons.is_empty();

        let per_line = per_line_issues
            .into_iter()
            .enumerate()
            .map(|(index, issues)| LineReport {
                index,
                pass: issues.is_empty(),
                reasons: issues.iter().map(|i| i.reason()).collect(),
            })
            .collect();

        BatchReport {
            per_line,
            batch_reasons,
            overall_score: overall,
            retry_recommended,
            sub_scores,
        }
    }

    fn line_issues(&self, line: &CandidateLine, ctx: &ScoreContext<'_>) -> Vec<Issue> {
        let mut issues = ctx.normalizer.check(&line.text, line.bucket);
        issues.extend(ContentEnforcer::check(&line.text, &ctx.content));

        if let Some(voice_id) = line.voice {
            if !ctx.voices.matches_stencil(voice_id, &line.text) {
                issues.push(Issue::Voice(format!(
                    "line does not carry voice {:?} stencil signature",
                    voice_id
                )));
            }
        }

        for tag in ctx.hard_tags {
            if !crate::core::normalize::contains_substring_ci(&line.text, tag) {
                issues.push(Issue::TagCoverage(format!("missing hard tag '{}'", tag)));
            }
        }

        if ROBOTIC_OPENERS.iter().any(|re| re.is_match(&line.text)) {
            issues.push(Issue::Delivery("robotic opener".to_string()));
        }
        if ends_dangling(&line.text) {
            issues.push(Issue::Delivery("dangling ending".to_string()));
        }

        issues
    }
}

fn fraction_score(total: usize, mut pass: impl FnMut(usize) -> bool) -> u8 {
    if total == 0 {
        return 100;
    }
    let passing = (0..total).filter(|&i| pass(i)).count();
    ((passing * 100) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lexicon::LexiconEntry;
    use crate::core::voice::{Stencil, VoiceCatalog, VoiceId, VoiceProfile};
    use crate::schema::line::{CandidateLine, LengthBucket};
    use crate::schema::request::Rating;

    fn entry() -> LexiconEntry {
        LexiconEntry {
            topic: "gym".to_string(),
            general: vec!["workout".to_string()],
            slang: Vec::new(),
            cultural: Vec::new(),
            emotional: Vec::new(),
            technical: Vec::new(),
        }
    }

    fn catalog() -> VoiceCatalog {
        let mut c = VoiceCatalog::new();
        c.register(VoiceProfile {
            id: VoiceId(1),
            name: "hype".to_string(),
            stencil: Stencil::parse("Man listen {setup} and then {punch}").unwrap(),
            rating_bank: Rating::all().to_vec(),
        });
        c
    }

    fn line(text: &str, bucket: LengthBucket) -> CandidateLine {
        CandidateLine::new(text, 0, bucket)
    }

    fn ctx<'a>(
        e: &'a LexiconEntry,
        voices: &'a VoiceCatalog,
        normalizer: &'a Normalizer,
        hard: &'a [String],
    ) -> ScoreContext<'a> {
        ScoreContext {
            content: ContentContext {
                rating: Rating::Pg13,
                tone: "deadpan",
                entry: e,
                soft_tags: &[],
            },
            hard_tags: hard,
            min_coverage: 3,
            voices,
            normalizer,
            entity_label: None,
        }
    }

    #[test]
    fn clean_batch_scores_high_and_accepts() {
        let e = entry();
        let voices = catalog();
        let normalizer = Normalizer::default();
        let c = ctx(&e, &voices, &normalizer, &[]);

        let bucket = LengthBucket::new(40, 80);
        let lines = vec![
            line("My workout stayed fine and nobody noticed it.", bucket),
            line("The workout was fine before anyone showed up.", bucket),
        ];
        let report = Scorer::default().score(&lines, &c, Vec::new());
        assert!(report.overall_score >= 75, "score {}", report.overall_score);
        assert!(!report.retry_recommended, "reasons: {:?}", report.all_reasons());
    }

    #[test]
    fn low_score_recommends_retry() {
        let e = entry();
        let voices = catalog();
        let normalizer = Normalizer::default();
        let hard = vec!["Jesse".to_string()];
        let c = ctx(&e, &voices, &normalizer, &hard);

        let bucket = LengthBucket::new(40, 60);
        let lines = vec![
            line("bad", bucket),
            line("also bad, truly!", bucket),
            line("no shape here", bucket),
            line("still nothing", bucket),
        ];
        let report = Scorer::default().score(&lines, &c, Vec::new());
        assert!(report.retry_recommended);
        assert!(report.overall_score < 75);
        assert!(!report.per_line[0].pass);
    }

    #[test]
    fn issue_category_spread_forces_retry() {
        let e = entry();
        let voices = catalog();
        let normalizer = Normalizer::default();
        let c = ctx(&e, &voices, &normalizer, &[]);

        // Shape is fine but lexicon, tone, and delivery all miss: three
        // distinct categories beats the cap even if the score held up.
        let bucket = LengthBucket::new(20, 60);
        let lines = vec![line("Behold a line about absolutely nothing much.", bucket)];
        let report = Scorer::default().score(&lines, &c, Vec::new());
        assert!(report.retry_recommended);
    }

    #[test]
    fn batch_reason_always_forces_retry() {
        let e = entry();
        let voices = catalog();
        let normalizer = Normalizer::default();
        let c = ctx(&e, &voices, &normalizer, &[]);

        let bucket = LengthBucket::new(40, 80);
        let lines = vec![line("My workout stayed fine and nobody noticed it.", bucket)];
        let report = Scorer::default().score(
            &lines,
            &c,
            vec!["hard tag coverage 1/4 below minimum 3 after injection".to_string()],
        );
        assert!(report.retry_recommended);
        assert_eq!(report.batch_reasons.len(), 1);
    }

    #[test]
    fn voice_signature_checked_when_assigned() {
        let e = entry();
        let voices = catalog();
        let normalizer = Normalizer::default();
        let c = ctx(&e, &voices, &normalizer, &[]);

        let bucket = LengthBucket::new(20, 80);
        let mut good = line("Man listen my workout was fine and then it was not.", bucket);
        good.voice = Some(VoiceId(1));
        let mut bad = line("My workout was fine and then it was not today.", bucket);
        bad.voice = Some(VoiceId(1));

        let report = Scorer::default().score(&[good, bad], &c, Vec::new());
        assert!(report.per_line[0].reasons.iter().all(|r| !r.starts_with("voice")));
        assert!(report.per_line[1].reasons.iter().any(|r| r.starts_with("voice")));
    }

    #[test]
    fn robotic_opener_penalized() {
        let e = entry();
        let voices = catalog();
        let normalizer = Normalizer::default();
        let c = ctx(&e, &voices, &normalizer, &[]);

        let bucket = LengthBucket::new(20, 80);
        let lines = vec![line("Here is a caption about my fine workout today.", bucket)];
        let report = Scorer::default().score(&lines, &c, Vec::new());
        assert!(report.per_line[0]
            .reasons
            .iter()
            .any(|r| r.contains("robotic")));
    }

    #[test]
    fn entity_absence_is_a_batch_reason() {
        let e = entry();
        let voices = catalog();
        let normalizer = Normalizer::default();
        let mut c = ctx(&e, &voices, &normalizer, &[]);
        c.entity_label = Some("The Rock");

        let bucket = LengthBucket::new(40, 80);
        let lines = vec![line("My workout stayed fine and nobody noticed it.", bucket)];
        let report = Scorer::default().score(&lines, &c, Vec::new());
        assert!(report
            .batch_reasons
            .iter()
            .any(|r| r.contains("The Rock")));
        assert!(report.retry_recommended);
    }

    #[test]
    fn scorer_never_mutates_lines() {
        let e = entry();
        let voices = catalog();
        let normalizer = Normalizer::default();
        let c = ctx(&e, &voices, &normalizer, &[]);

        let bucket = LengthBucket::new(40, 60);
        let lines = vec![line("some malformed thing!!", bucket)];
        let before = lines[0].text.clone();
        let _ = Scorer::default().score(&lines, &c, Vec::new());
        assert_eq!(lines[0].text, before);
    }

    #[test]
    fn empty_batch_scores_perfect_but_harmless() {
        let e = entry();
        let voices = catalog();
        let normalizer = Normalizer::default();
        let c = ctx(&e, &voices, &normalizer, &[]);
        let report = Scorer::default().score(&[], &c, Vec::new());
        assert_eq!(report.per_line.len(), 0);
        assert!(!report.retry_recommended);
    }
}
