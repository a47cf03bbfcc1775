//! Structural normalizer — enforces line-level shape.
//!
//! Given a raw string and a target length bucket, produces a string with
//! exactly one terminal period, no banned punctuation, a capitalized
//! first letter, and a length inside the bucket, without ever cutting a
//! word in half. Deterministic and idempotent: re-running on its own
//! output is a no-op.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::schema::line::{Issue, LengthBucket};

/// Words that end a line "dangling": prepositions, conjunctions,
/// articles, and other connectors that leave a fragment.
static DANGLING_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(and|but|or|so|because|with|the|a|an|of|to|in|on|at|for|my|your|their|when|while|if|than|then|like|just|very|really|about|into|over|under)$",
    )
    .expect("invalid dangling-end regex")
});

/// A trailing 1–2 letter token that is not a legitimate short word.
static SHORT_FRAGMENT_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b[a-z]{1,2}$").expect("invalid short-fragment regex"));

/// Short words that are fine at the end of a sentence.
static SHORT_WORD_ALLOWLIST: &[&str] = &["up", "me", "it", "go", "ok", "no"];

/// Completion pool keyed by the dangling word that was removed. Each
/// clause re-supplies its own connector so the sentence reads complete.
static COMPLETIONS: Lazy<FxHashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = FxHashMap::default();
    m.insert("and", "and called it a day");
    m.insert("but", "but nobody blinked");
    m.insert("or", "or so the story goes");
    m.insert("so", "so that settled it");
    m.insert("because", "because of course it did");
    m.insert("with", "with zero hesitation");
    m.insert("the", "the hard way");
    m.insert("a", "a real mess");
    m.insert("an", "an instant classic");
    m.insert("of", "of all time");
    m.insert("to", "to everyone watching");
    m.insert("in", "in record time");
    m.insert("on", "on a random Tuesday");
    m.insert("at", "at full volume");
    m.insert("for", "for no reason at all");
    m.insert("my", "my last nerve");
    m.insert("your", "your honor");
    m.insert("their", "their finest hour");
    m
});

/// Fallback completion for dangling words with no keyed clause.
const FALLBACK_COMPLETION: &str = "and nobody was ready for it";

/// Body used when repair strips a line down to nothing.
const EMPTY_BODY: &str = "Well that escalated";

/// Filler clauses for under-length lines, shortest first. None start
/// or end with a dangling word, none carry banned punctuation.
static FILLERS: &[&str] = &[
    "no notes",
    "for real",
    "and honestly same",
    "and the vibes were off",
    "which is exactly how it always goes",
    "and everyone just pretended not to notice",
];

/// One-word pads for buckets too narrow for any filler clause.
static PADS: &[&str] = &["sure", "wow", "yes", "ok"];

/// Punctuation the default profile strips outright.
const ALWAYS_BANNED: &[char] = &['"', '(', ')', '[', ']', '{', '}', '*', '#', '\u{2026}'];

/// Punctuation shape rules for a deployment.
#[derive(Debug, Clone)]
pub struct NormalizeProfile {
    /// Strip commas and semicolons/colons.
    pub ban_commas: bool,
    /// Strip em- and en-dashes.
    pub ban_dashes: bool,
}

impl Default for NormalizeProfile {
    fn default() -> Self {
        Self {
            ban_commas: true,
            ban_dashes: true,
        }
    }
}

/// Line-shape enforcement for one profile.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    profile: NormalizeProfile,
}

impl Normalizer {
    pub fn new(profile: NormalizeProfile) -> Self {
        Self { profile }
    }

    /// Normalize `text` into the bucket. See the module doc for the
    /// guarantees; when the bucket is too narrow to fill word-safely the
    /// closest achievable text is returned (callers detect the miss via
    /// [`Normalizer::check`]).
    pub fn normalize(&self, text: &str, bucket: LengthBucket) -> String {
        let stripped = self.strip_punctuation(text);
        let mut body = first_sentence(&stripped);

        body = repair_dangling(body);
        if body.is_empty() {
            body = EMPTY_BODY.to_string();
        }

        body = fit_length(body, bucket);
        if body.is_empty() {
            body = EMPTY_BODY.to_string();
        }

        let mut out = capitalize_first(&body);
        out.push('.');
        out
    }

    /// Shape-check without repair: format and length issues only.
    pub fn check(&self, text: &str, bucket: LengthBucket) -> Vec<Issue> {
        let mut issues = Vec::new();

        let period_count = text.matches('.').count();
        if period_count != 1 || !text.ends_with('.') {
            issues.push(Issue::Format(format!(
                "expected exactly one terminal period, found {} period(s)",
                period_count
            )));
        }
        if text
            .chars()
            .any(|c| self.is_banned(c) || c == '!' || c == '?')
        {
            issues.push(Issue::Format("banned punctuation present".to_string()));
        }
        if let Some(first) = text.chars().find(|c| c.is_alphabetic()) {
            if !first.is_uppercase() {
                issues.push(Issue::Format("first letter not capitalized".to_string()));
            }
        }
        let len = text.chars().count();
        if !bucket.contains(len) {
            issues.push(Issue::Length {
                len,
                lo: bucket.lo,
                hi: bucket.hi,
            });
        }
        issues
    }

    fn is_banned(&self, c: char) -> bool {
        if ALWAYS_BANNED.contains(&c) {
            return true;
        }
        if self.profile.ban_commas && (c == ',' || c == ';' || c == ':') {
            return true;
        }
        if self.profile.ban_dashes && (c == '\u{2014}' || c == '\u{2013}') {
            return true;
        }
        false
    }

    fn strip_punctuation(&self, text: &str) -> String {
        let mapped: String = text
            .chars()
            .map(|c| {
                if self.is_banned(c) {
                    ' '
                } else if c == '!' || c == '?' {
                    '.'
                } else {
                    c
                }
            })
            .collect();
        collapse_whitespace(&mapped)
    }
}

/// True if the text (terminal period ignored) ends in a dangling word
/// or a stray 1–2 letter fragment.
pub fn ends_dangling(text: &str) -> bool {
    let body = text.trim_end().trim_end_matches('.').trim_end();
    if body.is_empty() {
        return false;
    }
    if DANGLING_END.is_match(body) {
        return true;
    }
    if SHORT_FRAGMENT_END.is_match(body) {
        let last = last_word(body).to_lowercase();
        return !SHORT_WORD_ALLOWLIST.contains(&last.as_str());
    }
    false
}

/// Case-insensitive whole-word (or whole-phrase) containment.
pub fn contains_word_ci(text: &str, phrase: &str) -> bool {
    let text_toks = tokenize_lower(text);
    let phrase_toks = tokenize_lower(phrase);
    if phrase_toks.is_empty() || phrase_toks.len() > text_toks.len() {
        return false;
    }
    text_toks
        .windows(phrase_toks.len())
        .any(|w| w == phrase_toks.as_slice())
}

/// Case-insensitive substring containment (hard tags use this: the tag
/// must appear literally, whatever surrounds it).
pub fn contains_substring_ci(text: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    text.to_lowercase().contains(&needle.to_lowercase())
}

/// Uppercase the first alphabetic character, leaving the rest alone.
pub fn capitalize_first(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut done = false;
    for c in s.chars() {
        if !done && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            done = true;
        } else {
            out.push(c);
        }
    }
    out
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokenize_lower(s: &str) -> Vec<String> {
    let mut toks = Vec::new();
    let mut cur = String::new();
    for c in s.chars() {
        if c.is_alphanumeric() || c == '\'' {
            cur.extend(c.to_lowercase());
        } else if !cur.is_empty() {
            toks.push(std::mem::take(&mut cur));
        }
    }
    if !cur.is_empty() {
        toks.push(cur);
    }
    toks
}

fn last_word(s: &str) -> &str {
    s.rsplit(|c: char| c.is_whitespace())
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
}

/// Take the first sentence of a multi-sentence string; the terminator
/// itself is dropped (normalize re-adds it last).
fn first_sentence(text: &str) -> String {
    for segment in text.split('.') {
        let trimmed = segment.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    String::new()
}

/// Remove trailing dangling words and close the sentence with a clause
/// keyed by the last word removed.
fn repair_dangling(mut body: String) -> String {
    if !ends_dangling(&body) {
        return body;
    }

    let mut removed_last: Option<String> = None;
    // A run of connectors ("and the") is removed whole; cap the walk so
    // pathological input cannot loop.
    for _ in 0..4 {
        if !ends_dangling(&body) {
            break;
        }
        let word = last_word(&body).to_lowercase();
        if word.is_empty() {
            break;
        }
        body = pop_last_word(&body);
        removed_last = Some(word);
    }

    let completion = removed_last
        .as_deref()
        .and_then(|w| COMPLETIONS.get(w).copied())
        .unwrap_or(FALLBACK_COMPLETION);

    if body.is_empty() {
        capitalize_first(completion)
    } else {
        format!("{} {}", body, completion)
    }
}

fn pop_last_word(s: &str) -> String {
    match s.trim_end().rfind(|c: char| c.is_whitespace()) {
        Some(idx) => s[..idx].trim_end().to_string(),
        None => String::new(),
    }
}

/// Fit the body (period excluded) into the bucket: word-safe truncation
/// from above, filler extension from below. Truncation only pops words;
/// extension only appends from the vetted pools.
fn fit_length(mut body: String, bucket: LengthBucket) -> String {
    let max_body = bucket.hi.saturating_sub(1);
    let min_body = bucket.lo.saturating_sub(1);

    if body.chars().count() > max_body {
        body = truncate_word_safe(&body, max_body);
        // Cutting mid-sentence can leave a fresh fragment; shrink only,
        // never re-append.
        while ends_dangling(&body) {
            let popped = pop_last_word(&body);
            if popped.is_empty() {
                break;
            }
            body = popped;
        }
    }

    while body.chars().count() < min_body {
        let len = body.chars().count();
        let room = max_body.saturating_sub(len + 1);
        let addition = FILLERS
            .iter()
            .rev()
            .find(|f| f.chars().count() <= room)
            .or_else(|| PADS.iter().find(|p| p.chars().count() <= room));
        match addition {
            Some(add) => {
                body.push(' ');
                body.push_str(add);
            }
            None => break, // bucket too narrow to fill word-safely
        }
    }

    body
}

/// Remove trailing filler/pad clauses the length pass appended, so a
/// later stage can inject real content into the freed room before
/// re-normalizing.
pub fn strip_filler_suffixes(body: &str) -> String {
    let mut out = body.trim_end().trim_end_matches('.').to_string();
    loop {
        let mut stripped = false;
        for f in FILLERS.iter().chain(PADS.iter()) {
            let suffix = format!(" {}", f);
            if out.ends_with(&suffix) {
                out.truncate(out.len() - suffix.len());
                out = out.trim_end().to_string();
                stripped = true;
            }
        }
        if !stripped {
            break;
        }
    }
    out
}

/// Word-safe shrink to at most `max_chars`, popping any fragment the
/// cut leaves behind. Shrink-only — callers append their own content
/// into the freed room.
pub fn truncate_to_words(body: &str, max_chars: usize) -> String {
    let mut out = truncate_word_safe(body, max_chars);
    while ends_dangling(&out) {
        let popped = pop_last_word(&out);
        if popped.is_empty() {
            break;
        }
        out = popped;
    }
    out
}

/// Cut at the last whitespace boundary at or before `max_chars`.
/// A single word longer than the limit is kept whole.
fn truncate_word_safe(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let byte_limit = body
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    let head = &body[..byte_limit];
    match head.rfind(|c: char| c.is_whitespace()) {
        Some(idx) => head[..idx].trim_end().to_string(),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm() -> Normalizer {
        Normalizer::default()
    }

    fn bucket(lo: usize, hi: usize) -> LengthBucket {
        LengthBucket::new(lo, hi)
    }

    #[test]
    fn short_input_is_extended_into_bucket() {
        let out = norm().normalize("This is a joke", bucket(40, 60));
        let len = out.chars().count();
        assert!((40..=60).contains(&len), "got {} chars: {}", len, out);
        assert!(out.ends_with('.'));
        assert_eq!(out.matches('.').count(), 1);
    }

    #[test]
    fn long_input_is_truncated_word_safe() {
        let input = "This line keeps going and going with far too many words to ever fit into the narrow bucket it was assigned to occupy";
        let out = norm().normalize(input, bucket(40, 60));
        let len = out.chars().count();
        assert!((40..=60).contains(&len), "got {} chars: {}", len, out);
        // No word was cut: every output word must exist in the input.
        let body = out.trim_end_matches('.');
        for word in body.split_whitespace() {
            assert!(
                input.contains(word) || FILLERS.iter().any(|f| f.contains(word)),
                "word '{}' not from input",
                word
            );
        }
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "This is a joke",
            "way too short",
            "Multiple sentences here. And another one! Also this?",
            "Ends dangling because of the",
            "A line that runs well past sixty characters so truncation has to kick in somewhere around here",
            "",
            "and the",
        ];
        for input in inputs {
            for (lo, hi) in [(40, 60), (61, 81), (20, 40)] {
                let once = norm().normalize(input, bucket(lo, hi));
                let twice = norm().normalize(&once, bucket(lo, hi));
                assert_eq!(once, twice, "not idempotent for {:?} in [{},{}]", input, lo, hi);
            }
        }
    }

    #[test]
    fn multi_sentence_collapses_to_first() {
        let out = norm().normalize("First clause here. Second clause there.", bucket(1, 80));
        assert!(out.starts_with("First clause here"));
        assert_eq!(out.matches('.').count(), 1);
    }

    #[test]
    fn exclamations_and_questions_become_periods() {
        let out = norm().normalize("What a day! Right?", bucket(1, 80));
        assert_eq!(out.matches('.').count(), 1);
        assert!(!out.contains('!'));
        assert!(!out.contains('?'));
    }

    #[test]
    fn commas_and_dashes_stripped() {
        let out = norm().normalize("Well, this — this is fine", bucket(1, 80));
        assert!(!out.contains(','));
        assert!(!out.contains('\u{2014}'));
    }

    #[test]
    fn dangling_conjunction_replaced_with_clause() {
        let out = norm().normalize("He walked in and the", bucket(1, 80));
        assert!(!out.trim_end_matches('.').ends_with("and the"));
        assert!(!ends_dangling(&out), "still dangling: {}", out);
    }

    #[test]
    fn dangling_preposition_completed() {
        let out = norm().normalize("She kept staring at", bucket(1, 80));
        assert!(!out.trim_end_matches('.').ends_with(" at"));
        assert!(!ends_dangling(&out));
    }

    #[test]
    fn completion_keyed_by_removed_word() {
        let out = norm().normalize("He reached for", bucket(1, 80));
        assert!(out.contains("for no reason at all"), "got: {}", out);
    }

    #[test]
    fn all_dangling_input_gets_stock_body() {
        let out = norm().normalize("and the", bucket(1, 80));
        assert!(!out.is_empty());
        assert!(out.ends_with('.'));
        assert!(!ends_dangling(&out));
    }

    #[test]
    fn first_letter_capitalized() {
        let out = norm().normalize("lowercase start here", bucket(1, 80));
        assert!(out.starts_with('L'), "got: {}", out);
    }

    #[test]
    fn empty_input_still_produces_valid_shape() {
        let out = norm().normalize("", bucket(20, 60));
        assert!(out.ends_with('.'));
        assert_eq!(out.matches('.').count(), 1);
        let len = out.chars().count();
        assert!((20..=60).contains(&len), "got {} chars: {}", len, out);
    }

    #[test]
    fn check_flags_shape_violations() {
        let n = norm();
        let issues = n.check("no terminal period here", bucket(1, 80));
        assert!(issues.iter().any(|i| i.category() == "format"));

        let issues = n.check("Two. Sentences.", bucket(1, 80));
        assert!(issues.iter().any(|i| i.category() == "format"));

        let issues = n.check("Tiny.", bucket(40, 60));
        assert!(issues.iter().any(|i| i.category() == "length"));

        let issues = n.check("lowercase start but fine otherwise.", bucket(1, 80));
        assert!(issues.iter().any(|i| i.category() == "format"));
    }

    #[test]
    fn check_passes_clean_line() {
        let n = norm();
        let line = n.normalize("Leg day has a way of humbling everyone", bucket(40, 60));
        assert!(n.check(&line, bucket(40, 60)).is_empty(), "line: {}", line);
    }

    #[test]
    fn ends_dangling_detection() {
        assert!(ends_dangling("He went to the"));
        assert!(ends_dangling("She waited and"));
        assert!(ends_dangling("A stray fragment li")); // 2-letter fragment
        assert!(!ends_dangling("He gave up")); // allowlisted short word
        assert!(!ends_dangling("A complete sentence here."));
    }

    #[test]
    fn contains_word_ci_whole_word_only() {
        assert!(contains_word_ci("My workout went fine", "workout"));
        assert!(contains_word_ci("My WORKOUT went fine", "workout"));
        assert!(!contains_word_ci("My workouts went fine", "workout"));
        assert!(contains_word_ci("Mr White waved", "mr white"));
    }

    #[test]
    fn contains_substring_ci_matches_anywhere() {
        assert!(contains_substring_ci("JesseWasHere", "jesse"));
        assert!(!contains_substring_ci("JessWasHere", "jesse"));
        assert!(!contains_substring_ci("anything", ""));
    }

    #[test]
    fn capitalize_first_skips_leading_digits() {
        assert_eq!(capitalize_first("9 lives of a cat"), "9 Lives of a cat");
        assert_eq!(capitalize_first("already Fine"), "Already Fine");
    }

    #[test]
    fn strip_filler_suffixes_removes_padding() {
        let n = norm();
        let out = n.normalize("This is a joke", bucket(40, 60));
        let stripped = strip_filler_suffixes(&out);
        assert_eq!(stripped, "This is a joke");
    }

    #[test]
    fn strip_filler_suffixes_leaves_real_text() {
        assert_eq!(
            strip_filler_suffixes("Leg day never forgives."),
            "Leg day never forgives"
        );
    }

    #[test]
    fn narrow_bucket_degrades_without_panicking() {
        // Bucket narrower than any pad; the normalizer settles closest.
        let out = norm().normalize("word", bucket(59, 60));
        assert!(out.ends_with('.'));
        assert_eq!(out.matches('.').count(), 1);
    }
}
