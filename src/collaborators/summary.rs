//! Roll-up of analysis results

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::analysis::AnalysisResult;
use crate::utils::constants::{HIGH_SCORE_THRESHOLD, MAX_SUCCESS_FORMULAS};

/// A success factor shared by high-scoring results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessFormula {
    pub factor: String,
    pub occurrences: usize,
    pub high_scoring: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub analyzed: usize,
    /// Mean over results that carried a score.
    pub average_score: Option<f64>,
    pub success_formulas: Vec<SuccessFormula>,
}

impl AnalysisSummary {
    /// Formulas are the most frequent factors among results scoring at least
    /// [`HIGH_SCORE_THRESHOLD`], kept when they appear in at least half of
    /// those results. Ties keep first-seen order.
    #[must_use]
    pub fn from_results(results: &[AnalysisResult]) -> Self {
        let scores: Vec<f64> = results.iter().filter_map(|r| r.overall_score).collect();
        let average_score =
            (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64);

        let high: Vec<&AnalysisResult> = results
            .iter()
            .filter(|r| r.overall_score.is_some_and(|s| s >= HIGH_SCORE_THRESHOLD))
            .collect();

        let mut order: Vec<&str> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for factor in high.iter().flat_map(|r| r.success_factors.iter()) {
            let count = counts.entry(factor.as_str()).or_insert(0);
            if *count == 0 {
                order.push(factor);
            }
            *count += 1;
        }

        // Stable sort keeps first-seen order among equal counts.
        order.sort_by(|a, b| counts[b].cmp(&counts[a]));

        let success_formulas = order
            .into_iter()
            .take(MAX_SUCCESS_FORMULAS)
            .filter(|factor| counts[factor] * 2 >= high.len())
            .map(|factor| SuccessFormula {
                factor: factor.to_string(),
                occurrences: counts[factor],
                high_scoring: high.len(),
            })
            .collect();

        Self {
            analyzed: results.len(),
            average_score,
            success_formulas,
        }
    }
}
