//! Voice system — delivery stencils and batch rotation.
//!
//! A voice is a named delivery style with a two-slot sentence stencil.
//! The director assigns voices across a batch, avoiding repeats within
//! the batch and (with decreasing priority) across recent batches. Pure
//! rotation logic — the director knows nothing about what a stencil's
//! text means.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use thiserror::Error;

use crate::schema::request::Rating;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("stencil parse error: {0}")]
    StencilParse(String),
    #[error("no voice in the catalog covers rating {0}")]
    RatingUncovered(String),
}

/// Newtype wrapper for voice IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoiceId(pub u64);

/// Words a line can be split at to form its setup and punch halves.
const BOUNDARY_WORDS: &[&str] = &[
    "but", "so", "and", "because", "until", "then", "while", "which",
];

/// A segment of a parsed stencil.
#[derive(Debug, Clone, PartialEq)]
pub enum StencilSegment {
    /// Literal text, emitted as-is.
    Literal(String),
    /// The `{setup}` slot.
    Setup,
    /// The `{punch}` slot.
    Punch,
}

/// A parsed two-slot stencil template.
#[derive(Debug, Clone, PartialEq)]
pub struct Stencil {
    pub segments: Vec<StencilSegment>,
}

impl Stencil {
    /// Parse a stencil string into segments.
    ///
    /// Syntax: `{setup}` and `{punch}` slots (each required exactly
    /// once), `{{` / `}}` for literal braces, everything else literal.
    pub fn parse(input: &str) -> Result<Stencil, VoiceError> {
        let mut segments = Vec::new();
        let mut literal_buf = String::new();
        let chars: Vec<char> = input.chars().collect();
        let len = chars.len();
        let mut i = 0;

        while i < len {
            if chars[i] == '{' {
                if i + 1 < len && chars[i + 1] == '{' {
                    literal_buf.push('{');
                    i += 2;
                    continue;
                }

                if !literal_buf.is_empty() {
                    segments.push(StencilSegment::Literal(literal_buf.clone()));
                    literal_buf.clear();
                }

                let start = i + 1;
                let mut end = start;
                while end < len && chars[end] != '}' {
                    if chars[end] == '{' {
                        return Err(VoiceError::StencilParse(
                            "nested braces are not allowed".to_string(),
                        ));
                    }
                    end += 1;
                }
                if end == len {
                    return Err(VoiceError::StencilParse("unclosed brace".to_string()));
                }

                let content: String = chars[start..end].iter().collect();
                match content.as_str() {
                    "setup" => segments.push(StencilSegment::Setup),
                    "punch" => segments.push(StencilSegment::Punch),
                    other => {
                        return Err(VoiceError::StencilParse(format!(
                            "unknown slot '{{{}}}': expected {{setup}} or {{punch}}",
                            other
                        )));
                    }
                }
                i = end + 1;
            } else if chars[i] == '}' {
                if i + 1 < len && chars[i + 1] == '}' {
                    literal_buf.push('}');
                    i += 2;
                    continue;
                }
                return Err(VoiceError::StencilParse(
                    "unmatched closing brace".to_string(),
                ));
            } else {
                literal_buf.push(chars[i]);
                i += 1;
            }
        }

        if !literal_buf.is_empty() {
            segments.push(StencilSegment::Literal(literal_buf));
        }

        let setups = segments
            .iter()
            .filter(|s| matches!(s, StencilSegment::Setup))
            .count();
        let punches = segments
            .iter()
            .filter(|s| matches!(s, StencilSegment::Punch))
            .count();
        if setups != 1 || punches != 1 {
            return Err(VoiceError::StencilParse(format!(
                "stencil needs exactly one {{setup}} and one {{punch}}, found {} and {}",
                setups, punches
            )));
        }

        Ok(Stencil { segments })
    }

    /// Render the stencil with the two halves of a split line.
    pub fn render(&self, setup: &str, punch: &str) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                StencilSegment::Literal(s) => out.push_str(s),
                StencilSegment::Setup => out.push_str(setup),
                StencilSegment::Punch => out.push_str(punch),
            }
        }
        out
    }

    /// The leading literal, if the stencil opens with one. Used for
    /// pattern-compliance checks.
    pub fn leading_literal(&self) -> Option<&str> {
        match self.segments.first() {
            Some(StencilSegment::Literal(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// A named delivery style and the sentence template it renders through.
#[derive(Debug, Clone)]
pub struct VoiceProfile {
    pub id: VoiceId,
    pub name: String,
    pub stencil: Stencil,
    pub rating_bank: Vec<Rating>,
}

impl VoiceProfile {
    pub fn supports(&self, rating: Rating) -> bool {
        self.rating_bank.contains(&rating)
    }
}

// RON catalog entries carry the stencil as a plain string; parsing
// happens at load so malformed templates fail early.
#[derive(Debug, Deserialize, Serialize)]
struct RonVoice {
    id: u64,
    name: String,
    stencil: String,
    rating_bank: Vec<Rating>,
}

/// Immutable catalog of all loaded voices, in registration order.
#[derive(Debug, Clone, Default)]
pub struct VoiceCatalog {
    voices: Vec<VoiceProfile>,
    by_id: FxHashMap<VoiceId, usize>,
}

impl VoiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiled-in catalog shipped with the crate.
    pub fn builtin() -> Result<Self, VoiceError> {
        let mut catalog = Self::new();
        catalog.load_from_str(include_str!("../../data/voices.ron"))?;
        Ok(catalog)
    }

    pub fn register(&mut self, voice: VoiceProfile) {
        match self.by_id.get(&voice.id) {
            Some(&idx) => self.voices[idx] = voice,
            None => {
                self.by_id.insert(voice.id, self.voices.len());
                self.voices.push(voice);
            }
        }
    }

    pub fn get(&self, id: VoiceId) -> Option<&VoiceProfile> {
        self.by_id.get(&id).map(|&idx| &self.voices[idx])
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Ids valid for a rating, in catalog order.
    pub fn eligible(&self, rating: Rating) -> Vec<VoiceId> {
        self.voices
            .iter()
            .filter(|v| v.supports(rating))
            .map(|v| v.id)
            .collect()
    }

    /// True if the line carries the voice's stencil signature: its
    /// leading literal as a prefix, or any literal as a substring when
    /// the stencil opens with a slot.
    pub fn matches_stencil(&self, id: VoiceId, text: &str) -> bool {
        let Some(voice) = self.get(id) else {
            return false;
        };
        if let Some(lead) = voice.stencil.leading_literal() {
            let lead = lead.trim();
            return text.to_lowercase().starts_with(&lead.to_lowercase());
        }
        voice.stencil.segments.iter().any(|seg| match seg {
            StencilSegment::Literal(s) if s.trim().len() >= 3 => {
                text.to_lowercase().contains(&s.trim().to_lowercase())
            }
            _ => false,
        })
    }

    /// Load voices from a RON file containing a list of definitions.
    pub fn load_from_ron(&mut self, path: &Path) -> Result<(), VoiceError> {
        let contents = std::fs::read_to_string(path)?;
        self.load_from_str(&contents)
    }

    pub fn load_from_str(&mut self, contents: &str) -> Result<(), VoiceError> {
        let raw: Vec<RonVoice> = ron::from_str(contents)?;
        for v in raw {
            let stencil = Stencil::parse(&v.stencil)?;
            self.register(VoiceProfile {
                id: VoiceId(v.id),
                name: v.name,
                stencil,
                rating_bank: v.rating_bank,
            });
        }
        Ok(())
    }
}

/// Per-session rotation state. Reset `used_this_batch` at every batch
/// boundary; `recent_history` carries across batches.
#[derive(Debug, Clone)]
struct VoiceRotation {
    used_this_batch: FxHashSet<VoiceId>,
    recent_history: VecDeque<VoiceId>,
    history_depth: usize,
    last_assigned: FxHashMap<VoiceId, u64>,
    assignment_counter: u64,
}

impl VoiceRotation {
    fn new(history_depth: usize) -> Self {
        Self {
            used_this_batch: FxHashSet::default(),
            recent_history: VecDeque::new(),
            history_depth,
            last_assigned: FxHashMap::default(),
            assignment_counter: 0,
        }
    }

    fn record(&mut self, id: VoiceId) {
        self.used_this_batch.insert(id);
        self.recent_history.push_back(id);
        while self.recent_history.len() > self.history_depth {
            self.recent_history.pop_front();
        }
        self.assignment_counter += 1;
        self.last_assigned.insert(id, self.assignment_counter);
    }
}

/// Catalog plus rotation: assigns voices for each batch.
#[derive(Debug, Clone)]
pub struct VoiceDirector {
    catalog: VoiceCatalog,
    rotation: VoiceRotation,
}

/// Default bound on cross-batch repeat suppression.
pub const DEFAULT_HISTORY_DEPTH: usize = 4;

impl VoiceDirector {
    pub fn new(catalog: VoiceCatalog) -> Self {
        Self::with_history_depth(catalog, DEFAULT_HISTORY_DEPTH)
    }

    pub fn with_history_depth(catalog: VoiceCatalog, depth: usize) -> Self {
        Self {
            catalog,
            rotation: VoiceRotation::new(depth),
        }
    }

    pub fn catalog(&self) -> &VoiceCatalog {
        &self.catalog
    }

    /// Batch boundary: per-batch usage resets, recent history persists.
    pub fn start_batch(&mut self) {
        self.rotation.used_this_batch.clear();
    }

    /// Assign exactly `batch_size` voice ids valid for `rating`.
    ///
    /// Pairwise distinct while the eligible pool allows; recent-history
    /// ids are avoided when the pool is large enough; a pool smaller
    /// than the batch repeats least-recently-used ids rather than
    /// failing. An uncovered rating is a configuration error.
    pub fn assign(&mut self, batch_size: usize, rating: Rating) -> Result<Vec<VoiceId>, VoiceError> {
        let eligible = self.catalog.eligible(rating);
        if eligible.is_empty() {
            return Err(VoiceError::RatingUncovered(rating.label().to_string()));
        }

        let mut out = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            let pick = eligible
                .iter()
                .find(|id| {
                    !self.rotation.used_this_batch.contains(*id)
                        && !self.rotation.recent_history.contains(*id)
                })
                .or_else(|| {
                    eligible
                        .iter()
                        .find(|id| !self.rotation.used_this_batch.contains(*id))
                })
                .copied()
                .unwrap_or_else(|| {
                    // Whole pool used this batch: repeat the LRU id.
                    *eligible
                        .iter()
                        .min_by_key(|id| self.rotation.last_assigned.get(*id).copied().unwrap_or(0))
                        .expect("eligible pool checked non-empty")
                });
            self.rotation.record(pick);
            out.push(pick);
        }
        Ok(out)
    }

    /// Render a line through its assigned voice's stencil. The caller
    /// re-runs the normalizer afterward — wrapping can reintroduce
    /// length violations.
    pub fn render(&self, id: VoiceId, text: &str) -> Option<String> {
        let voice = self.catalog.get(id)?;
        let (setup, punch) = split_setup_punch(text);
        Some(voice.stencil.render(&setup, &punch))
    }
}

/// Split a line into setup and punch halves at a natural conjunction
/// boundary — the first boundary word inside the middle 60% of the
/// string — falling back to the word boundary nearest the midpoint.
/// The boundary word itself is dropped; the stencil supplies its own
/// connective tissue.
pub fn split_setup_punch(text: &str) -> (String, String) {
    let body = text.trim().trim_end_matches('.').trim_end();
    let words: Vec<&str> = body.split_whitespace().collect();
    if words.len() < 2 {
        return (body.to_string(), body.to_string());
    }

    let total: usize = body.chars().count();
    let window_lo = total / 5; // 20%
    let window_hi = total * 4 / 5; // 80%

    let mut offset = 0usize;
    for (i, word) in words.iter().enumerate() {
        if i > 0
            && offset >= window_lo
            && offset <= window_hi
            && BOUNDARY_WORDS.contains(&word.to_lowercase().as_str())
            && i + 1 < words.len()
        {
            return (words[..i].join(" "), words[i + 1..].join(" "));
        }
        offset += word.chars().count() + 1;
    }

    // No boundary word: nearest word boundary to the midpoint.
    let mid = total / 2;
    let mut best = 1usize;
    let mut best_dist = usize::MAX;
    let mut chars_before = 0usize;
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            let dist = chars_before.abs_diff(mid);
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }
        chars_before += word.chars().count() + 1;
    }
    (words[..best].join(" "), words[best..].join(" "))
}
