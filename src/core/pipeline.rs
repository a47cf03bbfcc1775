//! The caption pipeline: raw batch → repaired lines + diagnostic report.
//!
//! Wires together tag handling, structural normalization, content
//! enforcement, voice stencils, entity weaving, hard-tag distribution,
//! and scoring. The orchestrator itself is stateless; all cross-call
//! memory lives in the two rotation registries.

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, debug_span, warn};

use crate::core::content::{ContentContext, ContentEnforcer};
use crate::core::coverage::CoverageEnforcer;
use crate::core::entity::{EntityCooldown, EntityError, EntityPool, DEFAULT_COOLDOWN_WINDOW};
use crate::core::lexicon::{LexiconError, LexiconSet, FALLBACK_TOPIC};
use crate::core::normalize::{
    contains_substring_ci, strip_filler_suffixes, truncate_to_words, Normalizer,
};
use crate::core::score::{ScoreContext, Scorer};
use crate::core::voice::{VoiceCatalog, VoiceDirector, VoiceError};
use crate::schema::line::{BucketTable, CandidateLine};
use crate::schema::report::{BatchOutcome, BatchResult};
use crate::schema::request::{BatchRequest, Rating};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("voice error: {0}")]
    Voice(#[from] VoiceError),
    #[error("lexicon error: {0}")]
    Lexicon(#[from] LexiconError),
    #[error("entity error: {0}")]
    Entity(#[from] EntityError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("length bucket table is empty")]
    EmptyBucketTable,
}

/// Pipeline stages, strictly sequential. Only the final branch is
/// conditional: `Scored` resolves to accepted or retry-requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Classified,
    Normalized,
    ContentEnforced,
    Voiced,
    TagEnforced,
    Scored,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Classified => "classified",
            Self::Normalized => "normalized",
            Self::ContentEnforced => "content_enforced",
            Self::Voiced => "voiced",
            Self::TagEnforced => "tag_enforced",
            Self::Scored => "scored",
        }
    }
}

/// The top-level engine. Built via `CaptionEngine::builder()`.
///
/// Owns the two rotation registries; a concurrent application gives
/// each logical session its own engine instance (or wraps one in a
/// mutex around whole batches).
pub struct CaptionEngine {
    lexicons: LexiconSet,
    voices: VoiceDirector,
    entities: EntityCooldown,
    normalizer: Normalizer,
    scorer: Scorer,
    coverage: CoverageEnforcer,
    buckets: BucketTable,
    seed: u64,
    batch_count: u64,
}

/// Builder for constructing a `CaptionEngine`.
pub struct CaptionEngineBuilder {
    seed: u64,
    lexicons_path: Option<String>,
    voices_path: Option<String>,
    entities_path: Option<String>,
    cooldown_window: u64,
    min_coverage: Option<usize>,
    /// Directly provided catalogs (for testing without files).
    lexicons: Option<LexiconSet>,
    voices: Option<VoiceCatalog>,
    entities: Option<EntityPool>,
    buckets: Option<BucketTable>,
}

impl CaptionEngine {
    pub fn builder() -> CaptionEngineBuilder {
        CaptionEngineBuilder {
            seed: 0,
            lexicons_path: None,
            voices_path: None,
            entities_path: None,
            cooldown_window: DEFAULT_COOLDOWN_WINDOW,
            min_coverage: None,
            lexicons: None,
            voices: None,
            entities: None,
            buckets: None,
        }
    }

    /// Process one batch end to end. Configuration problems abort;
    /// malformed candidate lines are data to repair, never errors.
    pub fn process_batch(&mut self, request: &BatchRequest) -> Result<BatchResult, PipelineError> {
        let span = debug_span!("process_batch", batch = self.batch_count);
        let _enter = span.enter();

        let mut rng = StdRng::seed_from_u64(
            self.seed
                .wrapping_add(self.batch_count.wrapping_mul(7919)),
        );

        debug!(stage = Stage::Received.name(), lines = request.raw_lines.len());

        // Batch boundary for both registries, exactly once per batch.
        self.voices.start_batch();
        self.entities.start_new_batch();
        self.buckets.shuffle(&mut rng);

        debug!(
            stage = Stage::Classified.name(),
            hard = request.tags.hard.len(),
            soft = request.tags.soft.len()
        );

        let entry = self
            .lexicons
            .resolve(&request.category, &request.subcategory)
            .ok_or_else(|| {
                LexiconError::BuiltinInvalid(format!(
                    "missing fallback topic '{}'",
                    FALLBACK_TOPIC
                ))
            })?
            .clone();

        let mut lines: Vec<CandidateLine> = request
            .raw_lines
            .iter()
            .enumerate()
            .map(|(i, raw)| CandidateLine::new(raw.clone(), i, self.buckets.for_position(i)))
            .collect();

        for line in &mut lines {
            line.text = self.normalizer.normalize(&line.text, line.bucket);
        }
        debug!(stage = Stage::Normalized.name());

        let content_ctx = ContentContext {
            rating: request.rating,
            tone: &request.tone,
            entry: &entry,
            soft_tags: &request.tags.soft,
        };
        for line in &mut lines {
            line.text =
                ContentEnforcer::apply(&line.text, &content_ctx, &self.normalizer, line.bucket);
        }
        debug!(stage = Stage::ContentEnforced.name());

        let voice_ids = self.voices.assign(lines.len(), request.rating)?;
        for (line, voice_id) in lines.iter_mut().zip(&voice_ids) {
            if let Some(rendered) = self.voices.render(*voice_id, &line.text) {
                line.text = self.normalizer.normalize(&rendered, line.bucket);
                line.voice = Some(*voice_id);
            }
        }

        let mut batch_reasons: Vec<String> = Vec::new();
        let mut entity_label: Option<String> = None;
        if request.require_pop_culture_entity {
            match self.entities.select(&mut rng) {
                Some(id) => {
                    let label = self.entities.display_label(&id);
                    weave_entity(&mut lines, &label, &entry, &self.normalizer);
                    entity_label = Some(label);
                }
                None => {
                    warn!("pop culture entity requested but none eligible");
                    batch_reasons
                        .push("pop culture entity requested but none eligible".to_string());
                }
            }
        }
        debug!(stage = Stage::Voiced.name(), entity = entity_label.as_deref());

        batch_reasons.extend(self.coverage.enforce(
            &mut lines,
            &request.tags.hard,
            &self.normalizer,
        ));
        debug!(stage = Stage::TagEnforced.name());

        let score_ctx = ScoreContext {
            content: content_ctx,
            hard_tags: &request.tags.hard,
            min_coverage: self.coverage.min_covered(),
            voices: self.voices.catalog(),
            normalizer: &self.normalizer,
            entity_label: entity_label.as_deref(),
        };
        let report = self.scorer.score(&lines, &score_ctx, batch_reasons);
        debug!(
            stage = Stage::Scored.name(),
            score = report.overall_score,
            retry = report.retry_recommended
        );

        self.batch_count += 1;

        let texts: Vec<String> = lines.into_iter().map(|l| l.text).collect();
        let outcome = if report.retry_recommended {
            BatchOutcome::RetryRequested {
                lines: texts,
                reasons: report.all_reasons(),
            }
        } else {
            BatchOutcome::Accepted(texts)
        };

        Ok(BatchResult { outcome, report })
    }

    pub fn batch_count(&self) -> u64 {
        self.batch_count
    }
}

/// Weave the entity label into the last line lacking a cultural word,
/// as a `like <Label>` clause before the terminal period. The body is
/// shrunk word-safely first to leave room for the clause. Last rather
/// than first: the tag enforcer fills coverage front-to-back, and the
/// tail line is the one it leaves alone.
fn weave_entity(
    lines: &mut [CandidateLine],
    label: &str,
    entry: &crate::core::lexicon::LexiconEntry,
    normalizer: &Normalizer,
) {
    if lines.is_empty() {
        return;
    }
    let target = lines
        .iter()
        .rposition(|l| !entry.has_cultural_word(&l.text))
        .unwrap_or(lines.len() - 1);
    if let Some(line) = lines.get_mut(target) {
        if contains_substring_ci(&line.text, label) {
            return;
        }
        let needed = label.chars().count() + " like ".len();
        let max_body = line.bucket.hi.saturating_sub(1);
        let body = strip_filler_suffixes(&line.text);
        let body = truncate_to_words(&body, max_body.saturating_sub(needed));
        let woven = if body.is_empty() {
            label.to_string()
        } else {
            format!("{} like {}", body, label)
        };
        line.text = normalizer.normalize(&woven, line.bucket);
    }
}

impl CaptionEngineBuilder {
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Load lexicons from a RON file at build time.
    pub fn lexicons_path(mut self, path: &str) -> Self {
        self.lexicons_path = Some(path.to_string());
        self
    }

    /// Load the voice catalog from a RON file at build time.
    pub fn voices_path(mut self, path: &str) -> Self {
        self.voices_path = Some(path.to_string());
        self
    }

    /// Load the entity pool from a RON file at build time.
    pub fn entities_path(mut self, path: &str) -> Self {
        self.entities_path = Some(path.to_string());
        self
    }

    pub fn cooldown_window(mut self, window: u64) -> Self {
        self.cooldown_window = window;
        self
    }

    pub fn min_coverage(mut self, min: usize) -> Self {
        self.min_coverage = Some(min);
        self
    }

    /// Provide lexicons directly (for testing without files).
    pub fn with_lexicons(mut self, lexicons: LexiconSet) -> Self {
        self.lexicons = Some(lexicons);
        self
    }

    /// Provide the voice catalog directly (for testing without files).
    pub fn with_voices(mut self, voices: VoiceCatalog) -> Self {
        self.voices = Some(voices);
        self
    }

    /// Provide the entity pool directly (for testing without files).
    pub fn with_entities(mut self, entities: EntityPool) -> Self {
        self.entities = Some(entities);
        self
    }

    /// Provide the length bucket table directly.
    pub fn with_buckets(mut self, buckets: BucketTable) -> Self {
        self.buckets = Some(buckets);
        self
    }

    pub fn build(self) -> Result<CaptionEngine, PipelineError> {
        // Built-in catalogs back a zero-config build; any explicit
        // source (direct or path) replaces them outright.
        let mut lexicons = match (self.lexicons, self.lexicons_path.is_some()) {
            (Some(l), _) => l,
            (None, true) => LexiconSet::new(),
            (None, false) => LexiconSet::builtin()?,
        };
        if let Some(ref path) = self.lexicons_path {
            lexicons.load_from_ron(std::path::Path::new(path))?;
        }

        let mut voices = match (self.voices, self.voices_path.is_some()) {
            (Some(v), _) => v,
            (None, true) => VoiceCatalog::new(),
            (None, false) => VoiceCatalog::builtin()?,
        };
        if let Some(ref path) = self.voices_path {
            voices.load_from_ron(std::path::Path::new(path))?;
        }

        let mut entities = match (self.entities, self.entities_path.is_some()) {
            (Some(e), _) => e,
            (None, true) => EntityPool::new(),
            (None, false) => EntityPool::builtin()?,
        };
        if let Some(ref path) = self.entities_path {
            entities.load_from_ron(std::path::Path::new(path))?;
        }

        let buckets = match self.buckets {
            Some(b) => b,
            None => BucketTable::default_for(4),
        };
        if buckets.is_empty() {
            return Err(PipelineError::EmptyBucketTable);
        }

        // A rating no voice can serve is a broken deployment; fail the
        // build, not the batch.
        for rating in Rating::all() {
            if voices.eligible(rating).is_empty() {
                return Err(PipelineError::Voice(VoiceError::RatingUncovered(
                    rating.label().to_string(),
                )));
            }
        }

        // The fallback topic backs every unresolvable request.
        if lexicons.resolve("", "").is_none() {
            return Err(PipelineError::Lexicon(LexiconError::BuiltinInvalid(
                format!("missing fallback topic '{}'", FALLBACK_TOPIC),
            )));
        }

        let coverage = match self.min_coverage {
            Some(k) => CoverageEnforcer::new(k),
            None => CoverageEnforcer::default(),
        };

        Ok(CaptionEngine {
            lexicons,
            voices: VoiceDirector::new(voices),
            entities: EntityCooldown::with_window(entities, self.cooldown_window),
            normalizer: Normalizer::default(),
            scorer: Scorer::default(),
            coverage,
            buckets,
            seed: self.seed,
            batch_count: 0,
        })
    }
}
