//! Score Aggregator: weighted score, confidence, strengths/weaknesses and batch statistics.
//! Pure functions; no I/O.

use crate::models::matching::{RangeStatistics, ScoreStatistics};
use crate::models::{AggregateStats, MatchResult, ScoreDimension};

pub const STRENGTH_THRESHOLD: u32 = 75;
pub const WEAKNESS_THRESHOLD: u32 = 60;
/// Items taken from each qualifying dimension.
const ITEMS_PER_DIMENSION: usize = 2;
/// Cap on strengths and on weaknesses.
const MAX_HIGHLIGHTS: usize = 5;

/// `round(Σ score × weight)` bounded to [0, 100].
pub fn weighted_score(dimensions: &[ScoreDimension]) -> u32 {
    let total: f64 = dimensions.iter().map(|d| d.score as f64 * d.weight).sum();
    total.round().clamp(0.0, 100.0) as u32
}

/// `0.6 × variance_factor + 0.4 × semantic_alignment`, clamped to [0, 1].
///
/// Uses population variance of the dimension scores. With no dimensions the
/// mean is taken as 0.
pub fn confidence(dimensions: &[ScoreDimension], semantic_similarity: f32) -> f64 {
    let scores: Vec<f64> = dimensions.iter().map(|d| d.score as f64).collect();
    let mean = mean(&scores);
    let variance = if scores.is_empty() {
        0.0
    } else {
        scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64
    };

    let variance_factor = 1.0 - (variance / 1000.0).min(0.3);
    let semantic_alignment = 1.0 - (mean / 100.0 - semantic_similarity as f64).abs();

    (0.6 * variance_factor + 0.4 * semantic_alignment).clamp(0.0, 1.0)
}

/// Up to two evidence items from every dimension scoring ≥ 75 and up to two gaps
/// from every dimension below 60, in dimension order, five of each at most.
pub fn strengths_and_weaknesses(dimensions: &[ScoreDimension]) -> (Vec<String>, Vec<String>) {
    let strengths = dimensions
        .iter()
        .filter(|d| d.score >= STRENGTH_THRESHOLD)
        .flat_map(|d| d.evidence.iter().take(ITEMS_PER_DIMENSION).cloned())
        .take(MAX_HIGHLIGHTS)
        .collect();

    let weaknesses = dimensions
        .iter()
        .filter(|d| d.score < WEAKNESS_THRESHOLD)
        .flat_map(|d| d.gaps.iter().take(ITEMS_PER_DIMENSION).cloned())
        .take(MAX_HIGHLIGHTS)
        .collect();

    (strengths, weaknesses)
}

/// Statistics over successfully processed results. All-zero for an empty slice.
///
/// The median is the upper middle element for even-sized batches.
pub fn aggregate_statistics(results: &[MatchResult]) -> AggregateStats {
    if results.is_empty() {
        return AggregateStats::default();
    }

    let n = results.len() as f64;
    let mut scores: Vec<u32> = results.iter().map(|r| r.overall_score).collect();
    scores.sort_unstable();
    let confidences: Vec<f64> = results.iter().map(|r| r.confidence).collect();
    let similarities: Vec<f64> = results.iter().map(|r| r.semantic_similarity as f64).collect();

    let mut stats = AggregateStats {
        total_candidates: results.len(),
        score_statistics: ScoreStatistics {
            mean: scores.iter().map(|s| *s as f64).sum::<f64>() / n,
            min: scores[0],
            max: scores[scores.len() - 1],
            median: scores[scores.len() / 2],
        },
        confidence_statistics: range(&confidences),
        semantic_statistics: range(&similarities),
        ..Default::default()
    };

    for result in results {
        *stats
            .recommendations_breakdown
            .entry(result.recommendation)
            .or_insert(0) += 1;
    }

    stats.total_processing_time_ms = results.iter().map(|r| r.processing_time_ms).sum();
    stats.avg_processing_time_ms = stats.total_processing_time_ms / n;
    stats.total_cost_usd = results.iter().map(|r| r.llm_cost).sum();
    stats.avg_cost_per_candidate = stats.total_cost_usd / n;
    stats
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn range(values: &[f64]) -> RangeStatistics {
    RangeStatistics {
        mean: mean(values),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Recommendation;
    use crate::testing::match_result;

    fn dims(scores: [u32; 5]) -> Vec<ScoreDimension> {
        let weights = [0.30, 0.30, 0.15, 0.15, 0.10];
        scores
            .iter()
            .zip(weights)
            .enumerate()
            .map(|(i, (score, weight))| ScoreDimension {
                dimension: format!("d{i}"),
                score: *score,
                weight,
                explanation: String::new(),
                evidence: vec![format!("e{i}a"), format!("e{i}b"), format!("e{i}c")],
                gaps: vec![format!("g{i}a"), format!("g{i}b"), format!("g{i}c")],
            })
            .collect()
    }

    #[test]
    fn test_weighted_score_scenario() {
        // 24 + 21 + 9 + 7.5 + 9 = 70.5
        assert_eq!(weighted_score(&dims([80, 70, 60, 50, 90])), 71);
        assert_eq!(Recommendation::from_score(71), Recommendation::Maybe);
    }

    #[test]
    fn test_weighted_score_bounds() {
        assert_eq!(weighted_score(&dims([0; 5])), 0);
        assert_eq!(weighted_score(&dims([100; 5])), 100);
        assert_eq!(weighted_score(&[]), 0);
    }

    #[test]
    fn test_weighted_score_matches_formula_across_grid() {
        for a in (0..=100).step_by(10) {
            for b in (0..=100).step_by(25) {
                let d = dims([a, b, 100 - a, b / 2, a / 3]);
                let expected: f64 = d.iter().map(|x| x.score as f64 * x.weight).sum();
                let score = weighted_score(&d);
                assert_eq!(score, expected.round() as u32);
                assert!(score <= 100);
            }
        }
    }

    #[test]
    fn test_confidence_degenerate_inputs_stay_in_range() {
        for sim in [0.0f32, 0.5, 1.0] {
            for scores in [[0; 5], [100; 5], [50; 5], [0, 100, 0, 100, 0]] {
                let c = confidence(&dims(scores), sim);
                assert!((0.0..=1.0).contains(&c), "confidence {c} for {scores:?}/{sim}");
            }
        }
        let c = confidence(&[], 0.3);
        assert!((0.0..=1.0).contains(&c));
    }

    #[test]
    fn test_confidence_formula() {
        // identical scores: variance 0, mean 0.8 vs similarity 0.8 → 1.0
        assert!((confidence(&dims([80; 5]), 0.8) - 1.0).abs() < 1e-6);

        // scores [80,70,60,50,90]: mean 70, variance 200
        // variance_factor = 0.8, alignment = 1 - |0.7 - 0.5| = 0.8
        let c = confidence(&dims([80, 70, 60, 50, 90]), 0.5);
        assert!((c - 0.8).abs() < 1e-6);

        // huge spread caps the variance penalty at 0.3
        let c = confidence(&dims([0, 100, 0, 100, 0]), 0.4);
        assert!((c - (0.6 * 0.7 + 0.4 * 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_strength_and_weakness_boundaries() {
        let (strengths, weaknesses) = strengths_and_weaknesses(&dims([75, 60, 74, 59, 100]));
        assert_eq!(strengths, vec!["e0a", "e0b", "e4a", "e4b"]);
        assert_eq!(weaknesses, vec!["g3a", "g3b"]);
    }

    #[test]
    fn test_highlights_truncated_to_five() {
        let (strengths, weaknesses) = strengths_and_weaknesses(&dims([90; 5]));
        assert_eq!(strengths, vec!["e0a", "e0b", "e1a", "e1b", "e2a"]);
        assert!(weaknesses.is_empty());

        let (_, weaknesses) = strengths_and_weaknesses(&dims([10; 5]));
        assert_eq!(weaknesses.len(), 5);
        assert_eq!(weaknesses[4], "g2a");
    }

    #[test]
    fn test_aggregate_statistics_empty_is_zeroed() {
        assert_eq!(aggregate_statistics(&[]), AggregateStats::default());
    }

    #[test]
    fn test_aggregate_statistics() {
        let results = vec![
            match_result("a", 90, 0.9, 0.8),
            match_result("b", 30, 0.5, 0.6),
            match_result("c", 65, 0.7, 0.7),
            match_result("d", 70, 0.6, 0.9),
        ];
        let stats = aggregate_statistics(&results);

        assert_eq!(stats.total_candidates, 4);
        assert_eq!(stats.score_statistics.min, 30);
        assert_eq!(stats.score_statistics.max, 90);
        assert_eq!(stats.score_statistics.median, 70);
        assert!((stats.score_statistics.mean - 63.75).abs() < 1e-9);
        assert!((stats.confidence_statistics.mean - 0.675).abs() < 1e-9);
        assert!((stats.semantic_statistics.max - 0.9).abs() < 1e-6);
        assert_eq!(stats.recommendations_breakdown[&Recommendation::StrongMatch], 1);
        assert_eq!(stats.recommendations_breakdown[&Recommendation::Maybe], 2);
        assert_eq!(stats.recommendations_breakdown[&Recommendation::NotRecommended], 1);
        assert!(stats.recommendations_breakdown.get(&Recommendation::WeakMatch).is_none());
    }
}
