//! Content and tone enforcer — rating-appropriate vocabulary, tone
//! words, and topical grounding.
//!
//! Lower rating tiers *ban* listed profanity; higher tiers *require*
//! evidence of edge. A romantic tone cancels edge requirements and adds
//! its own profanity ban — a ban always wins over a requirement.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::core::lexicon::LexiconEntry;
use crate::core::normalize::{
    contains_word_ci, strip_filler_suffixes, Normalizer,
};
use crate::schema::line::{Issue, LengthBucket};
use crate::schema::request::Rating;

static STRONG_PROFANITY: &[&str] = &[
    "fuck", "fucking", "shit", "bitch", "asshole", "bastard", "dick", "goddamn",
];

static MILD_PROFANITY: &[&str] = &["damn", "hell", "ass", "crap", "sucks"];

/// Words that read as attitude without being profanity.
static ATTITUDE_MARKERS: &[&str] = &[
    "savage", "unhinged", "ruthless", "shameless", "feral", "menace", "reckless",
];

static INNUENDO_MARKERS: &[&str] = &["spicy", "scandalous", "frisky", "steamy", "sultry"];

/// Detection vocabulary per tone label.
static TONE_WORDS: Lazy<FxHashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    let mut m: FxHashMap<&'static str, &'static [&'static str]> = FxHashMap::default();
    m.insert("witty", &["clever", "technically", "ironic", "frankly"]);
    m.insert(
        "sarcastic",
        &["obviously", "totally", "thrilling", "groundbreaking", "riveting"],
    );
    m.insert("romantic", &["love", "heart", "sweet", "darling", "smitten"]);
    m.insert("savage", &["savage", "ruthless", "brutal", "merciless"]);
    m.insert("deadpan", &["fine", "noted", "whatever", "unbothered"]);
    m.insert("wholesome", &["proud", "cozy", "grateful", "blessed"]);
    m
});

/// Injection clause per tone; each contains a word from its detection
/// list and stays inside the normalizer's punctuation rules.
static TONE_INJECT: Lazy<FxHashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = FxHashMap::default();
    m.insert("witty", "which was frankly clever");
    m.insert("sarcastic", "which was obviously thrilling");
    m.insert("romantic", "and my heart noticed");
    m.insert("savage", "with ruthless precision");
    m.insert("deadpan", "and that was fine");
    m.insert("wholesome", "and everyone felt proud");
    m
});

/// Profanity and edge policy for one rating tier.
pub struct RatingPolicy;

impl RatingPolicy {
    /// Words banned outright at this tier (before the tone override).
    pub fn banned_words(rating: Rating) -> Vec<&'static str> {
        match rating {
            Rating::G => STRONG_PROFANITY
                .iter()
                .chain(MILD_PROFANITY.iter())
                .copied()
                .collect(),
            Rating::Pg13 => STRONG_PROFANITY.to_vec(),
            Rating::R | Rating::Explicit => Vec::new(),
        }
    }

    /// Full ban list after the tone override: romantic output never
    /// carries profanity, whatever the rating.
    pub fn banned_for(rating: Rating, tone: &str) -> Vec<&'static str> {
        let mut banned = Self::banned_words(rating);
        if tone.eq_ignore_ascii_case("romantic") {
            for w in STRONG_PROFANITY.iter().chain(MILD_PROFANITY.iter()) {
                if !banned.contains(w) {
                    banned.push(w);
                }
            }
        }
        banned
    }

    /// Whether this tier demands evidence of edge. Romantic tone
    /// cancels the requirement (but never a ban).
    pub fn edge_required(rating: Rating, tone: &str) -> bool {
        rating >= Rating::R && !tone.eq_ignore_ascii_case("romantic")
    }

    /// Edge evidence: a listed strong word, an attitude marker, or an
    /// innuendo marker.
    pub fn has_edge(text: &str) -> bool {
        STRONG_PROFANITY
            .iter()
            .chain(ATTITUDE_MARKERS.iter())
            .chain(INNUENDO_MARKERS.iter())
            .any(|w| contains_word_ci(text, w))
    }

    /// Clause appended when a required edge is missing. Never raw
    /// profanity spliced into arbitrary positions.
    pub fn edge_clause(rating: Rating) -> &'static str {
        match rating {
            Rating::Explicit => "and it was damn feral",
            _ => "and it was savage",
        }
    }
}

/// Everything the enforcer needs to know about the request.
pub struct ContentContext<'a> {
    pub rating: Rating,
    pub tone: &'a str,
    pub entry: &'a LexiconEntry,
    pub soft_tags: &'a [String],
}

/// The content pass applied to each normalized line.
pub struct ContentEnforcer;

impl ContentEnforcer {
    /// Repair `text` so it satisfies the content contract, then
    /// re-normalize into the bucket. Filler padding from the length
    /// pass is reclaimed first so injections have room to survive.
    pub fn apply(
        text: &str,
        ctx: &ContentContext<'_>,
        normalizer: &Normalizer,
        bucket: LengthBucket,
    ) -> String {
        let mut body = strip_filler_suffixes(text);

        for tag in ctx.soft_tags {
            body = remove_phrase_ci(&body, tag);
        }
        for word in RatingPolicy::banned_for(ctx.rating, ctx.tone) {
            body = remove_phrase_ci(&body, word);
        }

        if !ctx.entry.grounds(&body) {
            if let Some(word) = ctx.entry.first_general() {
                body = format!("{} thanks to the {}", body, word);
            }
        }

        let tone_key = ctx.tone.to_lowercase();
        if let Some(words) = TONE_WORDS.get(tone_key.as_str()) {
            if !words.iter().any(|w| contains_word_ci(&body, w)) {
                if let Some(clause) = TONE_INJECT.get(tone_key.as_str()) {
                    body = format!("{} {}", body, clause);
                }
            }
        }

        if RatingPolicy::edge_required(ctx.rating, ctx.tone) && !RatingPolicy::has_edge(&body) {
            body = format!("{} {}", body, RatingPolicy::edge_clause(ctx.rating));
        }

        normalizer.normalize(&body, bucket)
    }

    /// Check-only pass for the scorer. Never mutates.
    pub fn check(text: &str, ctx: &ContentContext<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();

        for tag in ctx.soft_tags {
            if contains_word_ci(text, tag) {
                issues.push(Issue::SoftTag(tag.clone()));
            }
        }

        for word in RatingPolicy::banned_for(ctx.rating, ctx.tone) {
            if contains_word_ci(text, word) {
                issues.push(Issue::Rating(format!("banned word '{}' present", word)));
            }
        }

        if !ctx.entry.grounds(text) {
            issues.push(Issue::Lexicon(format!(
                "no '{}' lexicon word present",
                ctx.entry.topic
            )));
        }

        if let Some(words) = TONE_WORDS.get(ctx.tone.to_lowercase().as_str()) {
            if !words.iter().any(|w| contains_word_ci(text, w)) {
                issues.push(Issue::Tone(format!("no '{}' tone word present", ctx.tone)));
            }
        }

        if RatingPolicy::edge_required(ctx.rating, ctx.tone) && !RatingPolicy::has_edge(text) {
            issues.push(Issue::Rating(format!(
                "no edge evidence for rating {}",
                ctx.rating.label()
            )));
        }

        issues
    }
}

/// Remove every whole-word (or whole-phrase) occurrence, preserving the
/// rest of the line.
fn remove_phrase_ci(text: &str, phrase: &str) -> String {
    let phrase_toks: Vec<String> = phrase
        .split_whitespace()
        .map(|t| strip_token(t))
        .filter(|t| !t.is_empty())
        .collect();
    if phrase_toks.is_empty() {
        return text.to_string();
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let mut kept: Vec<&str> = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        let end = i + phrase_toks.len();
        let matches = end <= words.len()
            && words[i..end]
                .iter()
                .zip(&phrase_toks)
                .all(|(w, p)| strip_token(w) == *p);
        if matches {
            i = end;
        } else {
            kept.push(words[i]);
            i += 1;
        }
    }
    kept.join(" ")
}

fn strip_token(t: &str) -> String {
    t.chars()
        .filter(|c| c.is_alphanumeric() || *c == '\'')
        .collect::<String>()
        .to_lowercase()
}
