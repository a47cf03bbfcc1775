use serde::{Deserialize, Serialize};

/// Per-line verdict in a batch report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineReport {
    pub index: usize,
    pub pass: bool,
    pub reasons: Vec<String>,
}

/// The diagnostic trail produced once per pipeline run. Purely
/// informational — never fed back as mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub per_line: Vec<LineReport>,
    /// Batch-level problems (e.g. coverage unreachable).
    pub batch_reasons: Vec<String>,
    /// Mean of the sub-scores, 0–100.
    pub overall_score: u8,
    pub retry_recommended: bool,
    /// Named sub-scores behind `overall_score`, for operators.
    pub sub_scores: Vec<(String, u8)>,
}

impl BatchReport {
    /// All distinct issue reasons across the batch.
    pub fn all_reasons(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for line in &self.per_line {
            for r in &line.reasons {
                if !out.contains(r) {
                    out.push(r.clone());
                }
            }
        }
        for r in &self.batch_reasons {
            if !out.contains(r) {
                out.push(r.clone());
            }
        }
        out
    }
}

/// Final decision for one batch. `RetryRequested` is terminal from the
/// engine's point of view — re-invoking the generator is the caller's
/// call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BatchOutcome {
    Accepted(Vec<String>),
    RetryRequested {
        /// Best-effort repaired lines, still usable if the caller
        /// declines to retry.
        lines: Vec<String>,
        reasons: Vec<String>,
    },
}

impl BatchOutcome {
    pub fn lines(&self) -> &[String] {
        match self {
            Self::Accepted(lines) => lines,
            Self::RetryRequested { lines, .. } => lines,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Everything the pipeline hands back for one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub outcome: BatchOutcome,
    pub report: BatchReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> BatchReport {
        BatchReport {
            per_line: vec![
                LineReport {
                    index: 0,
                    pass: true,
                    reasons: Vec::new(),
                },
                LineReport {
                    index: 1,
                    pass: false,
                    reasons: vec!["length: 20 outside [40, 60]".to_string()],
                },
            ],
            batch_reasons: vec!["hard tag coverage below minimum".to_string()],
            overall_score: 62,
            retry_recommended: true,
            sub_scores: vec![("format".to_string(), 80)],
        }
    }

    #[test]
    fn all_reasons_merges_line_and_batch() {
        let report = sample_report();
        let reasons = report.all_reasons();
        assert_eq!(reasons.len(), 2);
        assert!(reasons.iter().any(|r| r.contains("length")));
        assert!(reasons.iter().any(|r| r.contains("coverage")));
    }

    #[test]
    fn all_reasons_dedupes() {
        let mut report = sample_report();
        report.per_line[0].reasons = report.per_line[1].reasons.clone();
        assert_eq!(report.all_reasons().len(), 2);
    }

    #[test]
    fn outcome_lines_accessible_both_ways() {
        let accepted = BatchOutcome::Accepted(vec!["A.".to_string()]);
        assert!(accepted.is_accepted());
        assert_eq!(accepted.lines().len(), 1);

        let retry = BatchOutcome::RetryRequested {
            lines: vec!["A.".to_string(), "B.".to_string()],
            reasons: vec!["score below threshold".to_string()],
        };
        assert!(!retry.is_accepted());
        assert_eq!(retry.lines().len(), 2);
    }

    #[test]
    fn report_round_trip() {
        let report = sample_report();
        let s = ron::to_string(&report).unwrap();
        let back: BatchReport = ron::from_str(&s).unwrap();
        assert_eq!(back.overall_score, 62);
        assert!(back.retry_recommended);
        assert_eq!(back.per_line.len(), 2);
    }
}
