use serde::{Deserialize, Serialize};

use crate::core::voice::VoiceId;

/// An inclusive `[lo, hi]` character range a finished line must land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthBucket {
    pub lo: usize,
    pub hi: usize,
}

impl LengthBucket {
    pub fn new(lo: usize, hi: usize) -> Self {
        Self { lo, hi }
    }

    pub fn contains(&self, len: usize) -> bool {
        len >= self.lo && len <= self.hi
    }
}

/// Ordered list of length buckets, one per line position in a batch.
///
/// Bucket `i` is assigned to candidate `i` to force size variety across
/// the batch. The table is immutable during a batch; the pipeline may
/// shuffle it between batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTable {
    buckets: Vec<LengthBucket>,
}

impl BucketTable {
    /// Build a table from explicit buckets. Empty input is rejected —
    /// an empty table is a deployment problem, not bad content.
    pub fn new(buckets: Vec<LengthBucket>) -> Option<Self> {
        if buckets.is_empty() || buckets.iter().any(|b| b.lo == 0 || b.lo > b.hi) {
            return None;
        }
        Some(Self { buckets })
    }

    /// Default table for a batch of `n` lines: 40–60, 61–81, 82–102, …
    /// cycling back to the smallest bucket if `n` exceeds five.
    pub fn default_for(n: usize) -> Self {
        let mut buckets = Vec::with_capacity(n.max(1));
        for i in 0..n.max(1) {
            let step = i % 5;
            let lo = 40 + step * 21;
            buckets.push(LengthBucket::new(lo, lo + 20));
        }
        Self { buckets }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Bucket for line position `i`, cycling when the batch is larger
    /// than the table.
    pub fn for_position(&self, i: usize) -> LengthBucket {
        self.buckets[i % self.buckets.len()]
    }

    pub fn buckets(&self) -> &[LengthBucket] {
        &self.buckets
    }

    /// Reorder buckets in place using the supplied rng. Called by the
    /// pipeline between batches, never mid-batch.
    pub fn shuffle(&mut self, rng: &mut impl rand::Rng) {
        use rand::seq::SliceRandom;
        self.buckets.shuffle(rng);
    }
}

/// A problem detected on a line. Categories are closed — the scorer
/// counts distinct categories when recommending a retry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Issue {
    /// Wrong sentence shape: terminator count, banned punctuation,
    /// capitalization.
    Format(String),
    /// Outside the assigned length bucket.
    Length { len: usize, lo: usize, hi: usize },
    /// No topical lexicon word present.
    Lexicon(String),
    /// No tone-associated word present.
    Tone(String),
    /// Profanity policy violated (banned word present, or required
    /// edge absent).
    Rating(String),
    /// Line does not carry its assigned voice's stencil signature.
    Voice(String),
    /// Hard tag missing from this line.
    TagCoverage(String),
    /// Soft tag leaked verbatim into output.
    SoftTag(String),
    /// Robotic opener or dangling ending.
    Delivery(String),
    /// Pop-culture entity requested but not woven in.
    Entity(String),
}

impl Issue {
    /// Stable category key, used for distinct-category counting.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Format(_) => "format",
            Self::Length { .. } => "length",
            Self::Lexicon(_) => "lexicon",
            Self::Tone(_) => "tone",
            Self::Rating(_) => "rating",
            Self::Voice(_) => "voice",
            Self::TagCoverage(_) => "tag_coverage",
            Self::SoftTag(_) => "soft_tag",
            Self::Delivery(_) => "delivery",
            Self::Entity(_) => "entity",
        }
    }

    /// Human-readable reason string for diagnostic reports.
    pub fn reason(&self) -> String {
        match self {
            Self::Format(s) => format!("format: {}", s),
            Self::Length { len, lo, hi } => {
                format!("length: {} outside [{}, {}]", len, lo, hi)
            }
            Self::Lexicon(s) => format!("lexicon: {}", s),
            Self::Tone(s) => format!("tone: {}", s),
            Self::Rating(s) => format!("rating: {}", s),
            Self::Voice(s) => format!("voice: {}", s),
            Self::TagCoverage(s) => format!("tag coverage: {}", s),
            Self::SoftTag(s) => format!("soft tag leaked: {}", s),
            Self::Delivery(s) => format!("delivery: {}", s),
            Self::Entity(s) => format!("entity: {}", s),
        }
    }
}

/// One candidate line moving through the pipeline. Mutated in place by
/// each stage; finalized when it passes or exhausts repair.
#[derive(Debug, Clone)]
pub struct CandidateLine {
    pub text: String,
    /// Index into the batch's bucket table.
    pub bucket_index: usize,
    pub bucket: LengthBucket,
    pub voice: Option<VoiceId>,
    pub issues: Vec<Issue>,
}

impl CandidateLine {
    pub fn new(text: impl Into<String>, bucket_index: usize, bucket: LengthBucket) -> Self {
        Self {
            text: text.into(),
            bucket_index,
            bucket,
            voice: None,
            issues: Vec::new(),
        }
    }

    pub fn push_issue(&mut self, issue: Issue) {
        if !self.issues.contains(&issue) {
            self.issues.push(issue);
        }
    }
}
