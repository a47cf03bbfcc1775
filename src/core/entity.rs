//! Entity cooldown registry — pop-culture reference rotation.
//!
//! Selects at most one cultural reference per batch from a curated
//! pool, excluding anything used in the current or recent batches.
//! Entities move eligible → used-this-batch → on-cooldown → eligible,
//! strictly following batch boundaries.

use rand::Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::normalize::capitalize_first;

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Newtype wrapper for entity IDs (snake_case tokens).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One pool entry: the internal id plus an optional canonical display
/// label for ids the generic transform gets wrong.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityEntry {
    pub id: EntityId,
    #[serde(default)]
    pub display: Option<String>,
}

/// The curated entity pool. Static after load.
#[derive(Debug, Clone, Default)]
pub struct EntityPool {
    entries: Vec<EntityEntry>,
    display: FxHashMap<EntityId, String>,
}

impl EntityPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiled-in pool shipped with the crate.
    pub fn builtin() -> Result<Self, EntityError> {
        let mut pool = Self::new();
        pool.load_from_str(include_str!("../../data/entities.ron"))?;
        Ok(pool)
    }

    pub fn register(&mut self, entry: EntityEntry) {
        if let Some(label) = &entry.display {
            self.display.insert(entry.id.clone(), label.clone());
        }
        if !self.entries.iter().any(|e| e.id == entry.id) {
            self.entries.push(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entries.iter().map(|e| &e.id)
    }

    /// Human-readable label for an id: the canonical lookup when the
    /// catalog has one, otherwise underscores to spaces with each word
    /// capitalized. Pure.
    pub fn display_label(&self, id: &EntityId) -> String {
        if let Some(label) = self.display.get(id) {
            return label.clone();
        }
        id.as_str()
            .split('_')
            .filter(|w| !w.is_empty())
            .map(capitalize_first)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Load entries from a RON file containing a list of definitions.
    pub fn load_from_ron(&mut self, path: &Path) -> Result<(), EntityError> {
        let contents = std::fs::read_to_string(path)?;
        self.load_from_str(&contents)
    }

    pub fn load_from_str(&mut self, contents: &str) -> Result<(), EntityError> {
        let entries: Vec<EntityEntry> = ron::from_str(contents)?;
        for entry in entries {
            self.register(entry);
        }
        Ok(())
    }
}

/// Default cooldown window, in batches.
pub const DEFAULT_COOLDOWN_WINDOW: u64 = 3;

/// Per-session cooldown state over an entity pool.
#[derive(Debug, Clone)]
pub struct EntityCooldown {
    pool: EntityPool,
    current_batch_id: u64,
    used_in_batch: FxHashSet<EntityId>,
    cooldown: FxHashMap<EntityId, u64>,
    window: u64,
    quota: usize,
}

impl EntityCooldown {
    pub fn new(pool: EntityPool) -> Self {
        Self::with_window(pool, DEFAULT_COOLDOWN_WINDOW)
    }

    pub fn with_window(pool: EntityPool, window: u64) -> Self {
        Self {
            pool,
            current_batch_id: 0,
            used_in_batch: FxHashSet::default(),
            cooldown: FxHashMap::default(),
            window,
            quota: 1,
        }
    }

    pub fn pool(&self) -> &EntityPool {
        &self.pool
    }

    pub fn current_batch_id(&self) -> u64 {
        self.current_batch_id
    }

    /// Batch boundary: bump the batch id, clear per-batch usage, prune
    /// cooldown entries older than the window.
    pub fn start_new_batch(&mut self) {
        self.current_batch_id += 1;
        self.used_in_batch.clear();
        let current = self.current_batch_id;
        let window = self.window;
        self.cooldown
            .retain(|_, last_used| current <= *last_used + window);
    }

    /// Select one entity for the current batch, or `None` when the
    /// quota is spent or everything is on cooldown. Picks uniformly
    /// among eligibles with the caller's rng.
    pub fn select(&mut self, rng: &mut impl Rng) -> Option<EntityId> {
        if self.used_in_batch.len() >= self.quota {
            return None;
        }

        let current = self.current_batch_id;
        let window = self.window;
        let eligible: Vec<&EntityId> = self
            .pool
            .ids()
            .filter(|id| {
                !self.used_in_batch.contains(*id)
                    && self
                        .cooldown
                        .get(*id)
                        .map_or(true, |last| current > *last + window)
            })
            .collect();

        if eligible.is_empty() {
            return None;
        }

        let picked = eligible[rng.gen_range(0..eligible.len())].clone();
        self.used_in_batch.insert(picked.clone());
        self.cooldown.insert(picked.clone(), current);
        Some(picked)
    }

    /// Convenience passthrough to the pool's label table.
    pub fn display_label(&self, id: &EntityId) -> String {
        self.pool.display_label(id)
    }
}
