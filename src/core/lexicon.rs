//! Context lexicon — topic-keyed vocabulary buckets used to verify and
//! inject topical grounding. Static reference data, loaded once; never
//! mutated at runtime.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::normalize::contains_word_ci;

#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("built-in lexicon catalog is invalid: {0}")]
    BuiltinInvalid(String),
}

/// Topic every request can fall back to when neither subcategory nor
/// category is known.
pub const FALLBACK_TOPIC: &str = "everyday";

/// Vocabulary buckets for one topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub topic: String,
    #[serde(default)]
    pub general: Vec<String>,
    #[serde(default)]
    pub slang: Vec<String>,
    #[serde(default)]
    pub cultural: Vec<String>,
    #[serde(default)]
    pub emotional: Vec<String>,
    #[serde(default)]
    pub technical: Vec<String>,
}

impl LexiconEntry {
    /// First general-bucket word — the canonical injection candidate.
    pub fn first_general(&self) -> Option<&str> {
        self.general.first().map(|s| s.as_str())
    }

    /// True if `text` contains any word from any bucket (case-insensitive
    /// whole-word match).
    pub fn grounds(&self, text: &str) -> bool {
        self.all_words().any(|w| contains_word_ci(text, w))
    }

    /// True if `text` contains a cultural-bucket word.
    pub fn has_cultural_word(&self, text: &str) -> bool {
        self.cultural.iter().any(|w| contains_word_ci(text, w))
    }

    fn all_words(&self) -> impl Iterator<Item = &str> {
        self.general
            .iter()
            .chain(&self.slang)
            .chain(&self.cultural)
            .chain(&self.emotional)
            .chain(&self.technical)
            .map(|s| s.as_str())
    }
}

/// Registry of all loaded lexicon entries, keyed by topic.
#[derive(Debug, Clone, Default)]
pub struct LexiconSet {
    entries: FxHashMap<String, LexiconEntry>,
}

impl LexiconSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiled-in catalog shipped with the crate.
    pub fn builtin() -> Result<Self, LexiconError> {
        let mut set = Self::new();
        set.load_from_str(include_str!("../../data/lexicons.ron"))?;
        if set.get(FALLBACK_TOPIC).is_none() {
            return Err(LexiconError::BuiltinInvalid(format!(
                "missing fallback topic '{}'",
                FALLBACK_TOPIC
            )));
        }
        Ok(set)
    }

    pub fn register(&mut self, entry: LexiconEntry) {
        self.entries.insert(entry.topic.clone(), entry);
    }

    pub fn get(&self, topic: &str) -> Option<&LexiconEntry> {
        self.entries.get(topic)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    /// Resolve the lexicon entry for a request: subcategory first, then
    /// category, then the fallback topic. Returns `None` only when the
    /// fallback itself is missing, which is a configuration problem.
    pub fn resolve(&self, category: &str, subcategory: &str) -> Option<&LexiconEntry> {
        if !subcategory.is_empty() {
            if let Some(entry) = self.entries.get(subcategory) {
                return Some(entry);
            }
        }
        self.entries
            .get(category)
            .or_else(|| self.entries.get(FALLBACK_TOPIC))
    }

    /// Load entries from a RON file. The file should contain a list of
    /// `LexiconEntry` definitions; later entries override earlier ones
    /// with the same topic.
    pub fn load_from_ron(&mut self, path: &Path) -> Result<(), LexiconError> {
        let contents = std::fs::read_to_string(path)?;
        self.load_from_str(&contents)
    }

    pub fn load_from_str(&mut self, contents: &str) -> Result<(), LexiconError> {
        let entries: Vec<LexiconEntry> = ron::from_str(contents)?;
        for entry in entries {
            self.register(entry);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(topic: &str, general: &[&str], cultural: &[&str]) -> LexiconEntry {
        LexiconEntry {
            topic: topic.to_string(),
            general: general.iter().map(|s| s.to_string()).collect(),
            slang: Vec::new(),
            cultural: cultural.iter().map(|s| s.to_string()).collect(),
            emotional: Vec::new(),
            technical: Vec::new(),
        }
    }

    #[test]
    fn resolve_prefers_subcategory() {
        let mut set = LexiconSet::new();
        set.register(make_entry("gym", &["workout"], &[]));
        set.register(make_entry("leg_day", &["squat"], &[]));
        set.register(make_entry(FALLBACK_TOPIC, &["life"], &[]));

        let entry = set.resolve("gym", "leg_day").unwrap();
        assert_eq!(entry.topic, "leg_day");
    }

    #[test]
    fn resolve_falls_back_to_category_then_default() {
        let mut set = LexiconSet::new();
        set.register(make_entry("gym", &["workout"], &[]));
        set.register(make_entry(FALLBACK_TOPIC, &["life"], &[]));

        assert_eq!(set.resolve("gym", "unknown").unwrap().topic, "gym");
        assert_eq!(
            set.resolve("nowhere", "unknown").unwrap().topic,
            FALLBACK_TOPIC
        );
        assert_eq!(set.resolve("nowhere", "").unwrap().topic, FALLBACK_TOPIC);
    }

    #[test]
    fn grounds_matches_whole_words_case_insensitive() {
        let entry = make_entry("gym", &["workout", "gains"], &["flex"]);
        assert!(entry.grounds("My WORKOUT went sideways."));
        assert!(entry.grounds("Caught me mid flex."));
        assert!(!entry.grounds("The workouts were cancelled.")); // not whole word
        assert!(!entry.grounds("Nothing topical here."));
    }

    #[test]
    fn first_general_is_injection_candidate() {
        let entry = make_entry("gym", &["workout", "gains"], &[]);
        assert_eq!(entry.first_general(), Some("workout"));
        let empty = make_entry("bare", &[], &[]);
        assert_eq!(empty.first_general(), None);
    }

    #[test]
    fn later_registration_overrides() {
        let mut set = LexiconSet::new();
        set.register(make_entry("gym", &["workout"], &[]));
        set.register(make_entry("gym", &["deadlift"], &[]));
        assert_eq!(set.get("gym").unwrap().general, vec!["deadlift"]);
    }

    #[test]
    fn builtin_catalog_loads_and_has_fallback() {
        let set = LexiconSet::builtin().unwrap();
        assert!(set.get(FALLBACK_TOPIC).is_some());
        assert!(set.len() >= 5);
        for topic in set.topics() {
            let entry = set.get(topic).unwrap();
            assert!(
                entry.first_general().is_some(),
                "topic '{}' has an empty general bucket",
                topic
            );
        }
    }

    #[test]
    fn ron_round_trip() {
        let entry = make_entry("gym", &["workout"], &["flex"]);
        let s = ron::to_string(&entry).unwrap();
        let back: LexiconEntry = ron::from_str(&s).unwrap();
        assert_eq!(back.topic, "gym");
        assert_eq!(back.cultural, vec!["flex"]);
    }
}
