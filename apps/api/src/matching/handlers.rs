use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use tracing::info;
use uuid::Uuid;

use crate::db::{fetch_match_result, insert_match_result, MatchResultRow};
use crate::errors::AppError;
use crate::matching::analysis::{
    experience_analysis, filter_by_recommendation, rank_candidates, skills_breakdown,
    ExperienceAnalysis, RankBy, SkillsBreakdown,
};
use crate::models::{BatchMatchResult, JobDescription, MatchResult, Recommendation, Resume};
use crate::semantic::similarity::SectionSimilarities;
use crate::semantic::text::resume_representation;
use crate::semantic::{search_candidates, IndexedCandidate};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct MatchRequest {
    pub resume: Resume,
    pub job: JobDescription,
    pub resume_id: Option<String>,
    pub job_id: Option<String>,
}

#[derive(Serialize)]
pub struct MatchResponse {
    pub id: Uuid,
    pub result: MatchResult,
}

#[derive(Deserialize)]
pub struct BatchRequest {
    pub resumes: Vec<Resume>,
    pub job: JobDescription,
    pub job_id: Option<String>,
    /// Reorders the results; input order when absent.
    pub rank_by: Option<RankBy>,
    pub min_recommendation: Option<Recommendation>,
}

#[derive(Deserialize)]
pub struct ShortlistRequest {
    pub resumes: Vec<Resume>,
    pub job: JobDescription,
    pub job_id: Option<String>,
    pub top_k: Option<usize>,
}

#[derive(Deserialize)]
pub struct PairRequest {
    pub resume: Resume,
    pub job: JobDescription,
}

#[derive(Serialize)]
pub struct ExperienceResponse {
    #[serde(flatten)]
    pub analysis: ExperienceAnalysis,
    pub section_similarities: SectionSimilarities,
}

#[derive(Deserialize)]
pub struct CandidateUpload {
    pub id: String,
    pub resume: Resume,
}

#[derive(Deserialize)]
pub struct IndexRequest {
    pub candidates: Vec<CandidateUpload>,
}

#[derive(Serialize)]
pub struct IndexResponse {
    pub indexed: usize,
    pub total: usize,
}

#[derive(Deserialize)]
pub struct SearchRequest {
    pub job: JobDescription,
    #[serde(default = "default_search_k")]
    pub k: usize,
    #[serde(default)]
    pub min_score: f32,
}

fn default_search_k() -> usize {
    10
}

fn validate_job(job: &JobDescription) -> Result<(), AppError> {
    job.validate().map_err(AppError::Validation)
}

fn validate_resumes(resumes: &[Resume]) -> Result<(), AppError> {
    if resumes.is_empty() {
        return Err(AppError::Validation("resumes cannot be empty".to_string()));
    }
    Ok(())
}

fn normalize_all(resumes: Vec<Resume>) -> Vec<Resume> {
    let today = Utc::now().date_naive();
    resumes.into_iter().map(|r| r.normalized(today)).collect()
}

fn new_job_id() -> String {
    Uuid::new_v4().to_string()
}

/// POST /api/v1/matches
pub async fn handle_match(
    State(state): State<AppState>,
    Json(req): Json<MatchRequest>,
) -> Result<Json<MatchResponse>, AppError> {
    validate_job(&req.job)?;

    let resume = req.resume.normalized(Utc::now().date_naive());
    let resume_id = req.resume_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let job_id = req.job_id.unwrap_or_else(new_job_id);

    let result = state
        .engine
        .match_resume(Arc::new(resume), Arc::new(req.job), &resume_id, &job_id)
        .await?;
    let id = insert_match_result(&state.db, &result).await?;

    Ok(Json(MatchResponse { id, result }))
}

/// GET /api/v1/matches/:id
pub async fn handle_get_match(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchResultRow>, AppError> {
    let row = fetch_match_result(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Match {id} not found")))?;
    Ok(Json(row))
}

/// POST /api/v1/matches/batch
pub async fn handle_batch_match(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<BatchMatchResult>, AppError> {
    validate_job(&req.job)?;
    validate_resumes(&req.resumes)?;

    let job_id = req.job_id.unwrap_or_else(new_job_id);
    let mut batch = state
        .engine
        .match_batch(normalize_all(req.resumes), req.job, &job_id)
        .await;

    if let Some(min) = req.min_recommendation {
        batch.results = filter_by_recommendation(batch.results, min);
    }
    if let Some(by) = req.rank_by {
        batch.results = rank_candidates(batch.results, by);
    }
    Ok(Json(batch))
}

/// POST /api/v1/matches/shortlist
pub async fn handle_shortlist(
    State(state): State<AppState>,
    Json(req): Json<ShortlistRequest>,
) -> Result<Json<Vec<MatchResult>>, AppError> {
    validate_job(&req.job)?;
    validate_resumes(&req.resumes)?;

    let job_id = req.job_id.unwrap_or_else(new_job_id);
    let results = state
        .engine
        .shortlist(normalize_all(req.resumes), req.job, &job_id, req.top_k)
        .await?;
    Ok(Json(results))
}

/// POST /api/v1/skills/analysis
pub async fn handle_skills_analysis(
    State(state): State<AppState>,
    Json(req): Json<PairRequest>,
) -> Result<Json<SkillsBreakdown>, AppError> {
    validate_job(&req.job)?;
    let breakdown = skills_breakdown(state.engine.semantic(), &req.resume, &req.job).await?;
    Ok(Json(breakdown))
}

/// POST /api/v1/experience/analysis
pub async fn handle_experience_analysis(
    State(state): State<AppState>,
    Json(req): Json<PairRequest>,
) -> Result<Json<ExperienceResponse>, AppError> {
    validate_job(&req.job)?;
    let resume = req.resume.normalized(Utc::now().date_naive());
    let semantic = state.engine.semantic();

    let analysis = experience_analysis(semantic, &resume, &req.job).await?;
    let section_similarities = semantic.section_similarities(&resume, &req.job).await?;
    Ok(Json(ExperienceResponse {
        analysis,
        section_similarities,
    }))
}

/// POST /api/v1/candidates
pub async fn handle_index_candidates(
    State(state): State<AppState>,
    Json(req): Json<IndexRequest>,
) -> Result<Json<IndexResponse>, AppError> {
    if req.candidates.is_empty() {
        return Err(AppError::Validation("candidates cannot be empty".to_string()));
    }

    let today = Utc::now().date_naive();
    let indexed = req.candidates.len();
    for upload in req.candidates {
        let resume = upload.resume.normalized(today);
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), json!(resume.display_name()));
        metadata.insert("skills".to_string(), json!(resume.skills));
        metadata.insert("total_experience_years".to_string(), json!(resume.total_experience_years));

        state
            .candidates
            .upsert(&upload.id, &resume_representation(&resume), metadata)
            .await?;
    }

    let total = state.candidates.len().await;
    info!("Indexed {} candidates ({} total)", indexed, total);
    Ok(Json(IndexResponse { indexed, total }))
}

/// DELETE /api/v1/candidates/:id
pub async fn handle_remove_candidate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !state.candidates.remove(&id).await {
        return Err(AppError::NotFound(format!("Candidate {id} not found")));
    }
    info!("Removed candidate {} from the index", id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/candidates/search
pub async fn handle_search_candidates(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Vec<IndexedCandidate>>, AppError> {
    validate_job(&req.job)?;
    let hits = search_candidates(state.candidates.as_ref(), &req.job, req.k, req.min_score).await?;
    Ok(Json(hits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_job, sample_resume, test_state, BagOfWordsEmbedder, ScriptedLlm};

    fn state() -> AppState {
        test_state(Arc::new(ScriptedLlm::new()), Arc::new(BagOfWordsEmbedder))
    }

    #[tokio::test]
    async fn test_empty_job_title_is_rejected() {
        let req = BatchRequest {
            resumes: vec![sample_resume()],
            job: JobDescription::default(),
            job_id: None,
            rank_by: None,
            min_recommendation: None,
        };
        let err = handle_batch_match(State(state()), Json(req)).await.err();
        assert!(matches!(err, Some(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_empty_resume_list_is_rejected() {
        let req = ShortlistRequest {
            resumes: vec![],
            job: sample_job(),
            job_id: None,
            top_k: Some(3),
        };
        let err = handle_shortlist(State(state()), Json(req)).await.err();
        assert!(matches!(err, Some(AppError::Validation(msg)) if msg.contains("resumes")));
    }

    #[tokio::test]
    async fn test_index_then_search_returns_best_candidate() {
        let state = state();
        let chef = Resume {
            summary: Some("Pastry chef".to_string()),
            skills: vec!["Baking".to_string()],
            ..Default::default()
        };
        let req = IndexRequest {
            candidates: vec![
                CandidateUpload {
                    id: "chef".to_string(),
                    resume: chef,
                },
                CandidateUpload {
                    id: "ml".to_string(),
                    resume: sample_resume(),
                },
            ],
        };
        let Json(indexed) = handle_index_candidates(State(state.clone()), Json(req)).await.unwrap();
        assert_eq!(indexed.indexed, 2);
        assert_eq!(indexed.total, 2);

        let search = SearchRequest {
            job: sample_job(),
            k: 1,
            min_score: 0.0,
        };
        let Json(hits) = handle_search_candidates(State(state), Json(search)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "ml");
        assert_eq!(hits[0].metadata["skills"], json!(["Python", "Pytorch"]));
    }

    #[tokio::test]
    async fn test_remove_unknown_candidate_is_not_found() {
        let state = state();
        let req = IndexRequest {
            candidates: vec![CandidateUpload {
                id: "ml".to_string(),
                resume: sample_resume(),
            }],
        };
        handle_index_candidates(State(state.clone()), Json(req)).await.unwrap();

        let status = handle_remove_candidate(State(state.clone()), Path("ml".to_string()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.candidates.len().await, 0);

        let err = handle_remove_candidate(State(state), Path("ml".to_string())).await.err();
        assert!(matches!(err, Some(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_skills_analysis_uses_embedding_matcher() {
        let req = PairRequest {
            resume: sample_resume(),
            job: sample_job(),
        };
        let Json(breakdown) = handle_skills_analysis(State(state()), Json(req)).await.unwrap();
        assert_eq!(breakdown.total_required_skills, 2);
        assert_eq!(breakdown.summary.exact, 1);
    }

    #[tokio::test]
    async fn test_experience_analysis_combines_level_and_sections() {
        // With no datable role the stated 4.0 years stand.
        let mut resume = sample_resume();
        resume.work_experience[0].start_date = None;
        let req = PairRequest {
            resume,
            job: sample_job(),
        };
        let Json(response) = handle_experience_analysis(State(state()), Json(req)).await.unwrap();
        assert!(response.analysis.experience_level_match.is_match);
        assert_eq!(response.analysis.experience_level_match.required_range, "2-6");
        assert!(response.section_similarities.skills_similarity > 0.0);
    }
}
