//! Post-match analyses: ranking, filtering, skill breakdowns and experience-level checks.

use serde::{Deserialize, Serialize};

use crate::models::{JobDescription, MatchResult, MatchType, Recommendation, Resume, SkillMatch};
use crate::semantic::similarity::ExperienceRelevance;
use crate::semantic::{EmbeddingError, SemanticMatcher};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    #[default]
    OverallScore,
    SemanticSimilarity,
    Confidence,
}

/// Sorts results best first by the chosen criterion. Ties keep their input order.
pub fn rank_candidates(mut results: Vec<MatchResult>, by: RankBy) -> Vec<MatchResult> {
    match by {
        RankBy::OverallScore => results.sort_by(|a, b| b.overall_score.cmp(&a.overall_score)),
        RankBy::SemanticSimilarity => {
            results.sort_by(|a, b| b.semantic_similarity.total_cmp(&a.semantic_similarity))
        }
        RankBy::Confidence => results.sort_by(|a, b| b.confidence.total_cmp(&a.confidence)),
    }
    results
}

/// Keeps results recommended at least as strongly as `min`.
pub fn filter_by_recommendation(results: Vec<MatchResult>, min: Recommendation) -> Vec<MatchResult> {
    results.into_iter().filter(|r| r.recommendation >= min).collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Skills breakdown (embedding space)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SkillCounts {
    pub exact: usize,
    pub similar: usize,
    pub missing: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillsBreakdown {
    pub exact_matches: Vec<SkillMatch>,
    pub similar_matches: Vec<SkillMatch>,
    pub missing_skills: Vec<SkillMatch>,
    pub total_required_skills: usize,
    pub matched_required_skills: usize,
    /// 0 – 100; 0 when the job lists no required skills
    pub match_percentage: f64,
    pub summary: SkillCounts,
}

pub async fn skills_breakdown(
    semantic: &SemanticMatcher,
    resume: &Resume,
    job: &JobDescription,
) -> Result<SkillsBreakdown, EmbeddingError> {
    let matches = semantic.skill_match(resume, job).await?;

    let total_required = job.required_skills.len();
    // skill_match yields required skills first, one entry each, in JD order.
    let matched_required = matches
        .iter()
        .take(total_required)
        .filter(|m| m.match_type != MatchType::Missing)
        .count();
    let match_percentage = if total_required == 0 {
        0.0
    } else {
        matched_required as f64 / total_required as f64 * 100.0
    };

    let of_type = |t: MatchType| -> Vec<SkillMatch> {
        matches.iter().filter(|m| m.match_type == t).cloned().collect()
    };
    let exact_matches = of_type(MatchType::Exact);
    let similar_matches = of_type(MatchType::Similar);
    let missing_skills = of_type(MatchType::Missing);

    Ok(SkillsBreakdown {
        summary: SkillCounts {
            exact: exact_matches.len(),
            similar: similar_matches.len(),
            missing: missing_skills.len(),
        },
        exact_matches,
        similar_matches,
        missing_skills,
        total_required_skills: total_required,
        matched_required_skills: matched_required,
        match_percentage,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Experience level
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceStatus {
    Underqualified,
    Match,
    Overqualified,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperienceLevelCheck {
    pub is_match: bool,
    pub status: ExperienceStatus,
    pub gap_years: f64,
    pub candidate_years: f64,
    /// e.g. "3-5", "3+" or "0+"
    pub required_range: String,
}

/// Compares total experience with the job's range. A missing minimum is 0 and a
/// missing maximum is unbounded.
pub fn experience_level_check(resume: &Resume, job: &JobDescription) -> ExperienceLevelCheck {
    let years = resume.total_experience_years.unwrap_or(0.0);
    let min = job.min_experience_years.unwrap_or(0) as f64;
    let max = job.max_experience_years.map(|m| m as f64);

    let (status, gap_years) = if years < min {
        (ExperienceStatus::Underqualified, min - years)
    } else if let Some(max) = max.filter(|max| years > *max) {
        (ExperienceStatus::Overqualified, years - max)
    } else {
        (ExperienceStatus::Match, 0.0)
    };

    let required_range = match job.max_experience_years {
        Some(max) => format!("{}-{}", job.min_experience_years.unwrap_or(0), max),
        None => format!("{}+", job.min_experience_years.unwrap_or(0)),
    };

    ExperienceLevelCheck {
        is_match: status == ExperienceStatus::Match,
        status,
        gap_years: (gap_years * 10.0).round() / 10.0,
        candidate_years: years,
        required_range,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperienceAnalysis {
    #[serde(flatten)]
    pub relevance: ExperienceRelevance,
    pub experience_level_match: ExperienceLevelCheck,
    pub total_years: Option<f64>,
    pub min_required_years: Option<u32>,
    pub max_required_years: Option<u32>,
}

/// Embedding relevance of each role plus the experience-level check.
pub async fn experience_analysis(
    semantic: &SemanticMatcher,
    resume: &Resume,
    job: &JobDescription,
) -> Result<ExperienceAnalysis, EmbeddingError> {
    Ok(ExperienceAnalysis {
        relevance: semantic.experience_relevance(resume, job).await?,
        experience_level_match: experience_level_check(resume, job),
        total_years: resume.total_experience_years,
        min_required_years: job.min_experience_years,
        max_required_years: job.max_experience_years,
    })
}
