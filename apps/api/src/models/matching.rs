use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordinal hiring recommendation. Declaration order is the ranking order,
/// so `Ord` can be used for "at least" comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Not Recommended")]
    NotRecommended,
    #[serde(rename = "Weak Match")]
    WeakMatch,
    #[serde(rename = "Maybe")]
    Maybe,
    #[serde(rename = "Strong Match")]
    StrongMatch,
}

impl Recommendation {
    /// Bands are inclusive on their lower bound: 80+, 60-79, 40-59, below 40.
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 80 => Recommendation::StrongMatch,
            s if s >= 60 => Recommendation::Maybe,
            s if s >= 40 => Recommendation::WeakMatch,
            _ => Recommendation::NotRecommended,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Recommendation::StrongMatch => "Strong Match",
            Recommendation::Maybe => "Maybe",
            Recommendation::WeakMatch => "Weak Match",
            Recommendation::NotRecommended => "Not Recommended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Similar,
    Related,
    Missing,
}

impl MatchType {
    /// Case- and whitespace-insensitive lookup of a model-supplied label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "exact" => Some(MatchType::Exact),
            "similar" => Some(MatchType::Similar),
            "related" => Some(MatchType::Related),
            "missing" => Some(MatchType::Missing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillMatch {
    pub skill: String,
    pub match_type: MatchType,
    /// 0.0 – 1.0
    pub relevance_score: f32,
    pub explanation: Option<String>,
}

/// One weighted evaluation axis of a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreDimension {
    pub dimension: String,
    /// 0 – 100
    pub score: u32,
    /// 0.0 – 1.0, fixed per dimension by configuration
    pub weight: f64,
    pub explanation: String,
    pub evidence: Vec<String>,
    pub gaps: Vec<String>,
}

/// The explainable result of matching one resume against one job.
/// Built once by the pipeline and handed to the caller as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub resume_id: String,
    pub job_id: String,
    pub timestamp: DateTime<Utc>,
    pub overall_score: u32,
    pub semantic_similarity: f32,
    pub recommendation: Recommendation,
    pub confidence: f64,
    pub dimension_scores: Vec<ScoreDimension>,
    pub matched_skills: Vec<SkillMatch>,
    pub missing_critical_skills: Vec<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub overall_reasoning: String,
    pub processing_time_ms: f64,
    /// USD
    pub llm_cost: f64,
    pub metadata: Map<String, Value>,
}

impl MatchResult {
    pub fn rejected_by_semantic_filter(&self) -> bool {
        self.metadata
            .get("rejected_by_semantic_filter")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreStatistics {
    pub mean: f64,
    pub min: u32,
    pub max: u32,
    pub median: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeStatistics {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Summary over the successfully processed results of a batch.
/// All-zero when nothing was processed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_candidates: usize,
    pub score_statistics: ScoreStatistics,
    pub confidence_statistics: RangeStatistics,
    pub semantic_statistics: RangeStatistics,
    pub recommendations_breakdown: BTreeMap<Recommendation, usize>,
    pub total_processing_time_ms: f64,
    pub avg_processing_time_ms: f64,
    pub total_cost_usd: f64,
    pub avg_cost_per_candidate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMatchResult {
    pub job_id: String,
    pub timestamp: DateTime<Utc>,
    /// Size of the submitted batch; may exceed `results.len()` when resumes failed.
    pub total_resumes: usize,
    pub results: Vec<MatchResult>,
    pub aggregate_stats: AggregateStats,
    pub total_processing_time_ms: f64,
    pub total_cost: f64,
}
