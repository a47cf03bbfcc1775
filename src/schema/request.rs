use serde::{Deserialize, Serialize};

/// Content rating tier, ordered from clean to explicit.
///
/// Lower tiers *ban* listed profanity; higher tiers *require* evidence
/// of edge. The policy tables live in `core::content` — this type only
/// carries the ordering and the wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rating {
    G,
    Pg13,
    R,
    Explicit,
}

impl Rating {
    /// Returns the display label for this rating (e.g., "PG-13").
    pub fn label(&self) -> &'static str {
        match self {
            Self::G => "G",
            Self::Pg13 => "PG-13",
            Self::R => "R",
            Self::Explicit => "Explicit",
        }
    }

    /// Parse a display label back into a tier.
    pub fn parse_label(label: &str) -> Option<Rating> {
        match label {
            "G" => Some(Self::G),
            "PG-13" => Some(Self::Pg13),
            "R" => Some(Self::R),
            "Explicit" => Some(Self::Explicit),
            _ => None,
        }
    }

    /// All tiers, clean to explicit.
    pub fn all() -> [Rating; 4] {
        [Self::G, Self::Pg13, Self::R, Self::Explicit]
    }
}

/// Requested keywords split into hard (must appear verbatim) and soft
/// (style hints that must never leak into output).
///
/// Invariants: a string never appears in both sets; hard tags keep the
/// caller's casing, soft tags are case-folded; order of first
/// appearance is preserved; no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    pub hard: Vec<String>,
    pub soft: Vec<String>,
}

impl TagSet {
    pub fn is_empty(&self) -> bool {
        self.hard.is_empty() && self.soft.is_empty()
    }
}

/// One batch of candidate lines plus the request context they were
/// generated under. This is the sole input to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Raw candidate text from the remote generator.
    pub raw_lines: Vec<String>,
    /// Topic category, e.g. "gym".
    pub category: String,
    /// Finer topic, e.g. "leg_day". May be empty.
    #[serde(default)]
    pub subcategory: String,
    /// Tone label, e.g. "sarcastic" or "romantic".
    pub tone: String,
    pub rating: Rating,
    #[serde(default)]
    pub tags: TagSet,
    /// Whether one line should carry a pop-culture reference.
    #[serde(default)]
    pub require_pop_culture_entity: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_labels() {
        assert_eq!(Rating::G.label(), "G");
        assert_eq!(Rating::Pg13.label(), "PG-13");
        assert_eq!(Rating::Explicit.label(), "Explicit");
    }

    #[test]
    fn rating_ordering() {
        assert!(Rating::G < Rating::Pg13);
        assert!(Rating::Pg13 < Rating::R);
        assert!(Rating::R < Rating::Explicit);
    }

    #[test]
    fn rating_labels_round_trip() {
        for rating in Rating::all() {
            assert_eq!(Rating::parse_label(rating.label()), Some(rating));
        }
        assert_eq!(Rating::parse_label("NC-17"), None);
    }

    #[test]
    fn rating_ron_round_trip() {
        let s = ron::to_string(&Rating::Pg13).unwrap();
        let back: Rating = ron::from_str(&s).unwrap();
        assert_eq!(back, Rating::Pg13);
    }

    #[test]
    fn tag_set_empty() {
        assert!(TagSet::default().is_empty());
        let ts = TagSet {
            hard: vec!["Jesse".to_string()],
            soft: Vec::new(),
        };
        assert!(!ts.is_empty());
    }

    #[test]
    fn request_round_trip() {
        let req = BatchRequest {
            raw_lines: vec!["A line".to_string()],
            category: "gym".to_string(),
            subcategory: String::new(),
            tone: "sarcastic".to_string(),
            rating: Rating::Pg13,
            tags: TagSet::default(),
            require_pop_culture_entity: true,
        };
        let s = ron::to_string(&req).unwrap();
        let back: BatchRequest = ron::from_str(&s).unwrap();
        assert_eq!(back.category, "gym");
        assert_eq!(back.rating, Rating::Pg13);
        assert!(back.require_pop_culture_entity);
    }
}
