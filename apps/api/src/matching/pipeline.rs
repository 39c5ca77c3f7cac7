//! Matching Orchestrator: sequences filter, parallel evaluation, reasoning and aggregation.
//!
//! `MatchEngine` is built once at startup and shared as `Arc<MatchEngine>`.
//! Single matches never fail on LLM trouble; only the embedding stage can abort one.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::aggregate::{aggregate_statistics, confidence, strengths_and_weaknesses, weighted_score};
use super::dimensions::{DimensionEvaluator, DimensionReport};
use super::prompts;
use super::skills::{SkillMatcher, SkillReport};
use super::{with_deadline, CallUsage, MatchError};
use crate::config::MatchSettings;
use crate::llm_client::LanguageModel;
use crate::models::{BatchMatchResult, JobDescription, MatchResult, Recommendation, Resume, ScoreDimension};
use crate::semantic::SemanticMatcher;

pub const REJECTION_CONFIDENCE: f64 = 0.1;
pub const REJECTION_WEAKNESS: &str =
    "Semantic similarity below threshold - candidate does not meet basic requirements";
const REASONING_TEMPERATURE: f32 = 0.7;

pub struct MatchEngine {
    semantic: Arc<SemanticMatcher>,
    llm: Arc<dyn LanguageModel>,
    dimensions: DimensionEvaluator,
    skills: SkillMatcher,
    settings: MatchSettings,
}

impl MatchEngine {
    pub fn new(semantic: Arc<SemanticMatcher>, llm: Arc<dyn LanguageModel>, settings: MatchSettings) -> Self {
        Self {
            dimensions: DimensionEvaluator::new(Arc::clone(&llm), settings.weights, settings.call_timeout),
            skills: SkillMatcher::new(Arc::clone(&llm), settings.call_timeout),
            semantic,
            llm,
            settings,
        }
    }

    pub fn semantic(&self) -> &SemanticMatcher {
        &self.semantic
    }

    /// Matches one resume against one job.
    ///
    /// Below the semantic threshold (with filtering enabled) a rejection result is
    /// returned without any LLM call.
    pub async fn match_resume(
        &self,
        resume: Arc<Resume>,
        job: Arc<JobDescription>,
        resume_id: &str,
        job_id: &str,
    ) -> Result<MatchResult, MatchError> {
        let started = Instant::now();
        let similarity = self.semantic.similarity(&resume, &job).await?;

        if self.settings.enable_semantic_filter && similarity < self.settings.semantic_threshold {
            info!(
                "Resume {} rejected by semantic filter for job {} (similarity {:.3})",
                resume_id, job_id, similarity
            );
            return Ok(self.rejection(resume_id, job_id, similarity, started));
        }

        Ok(self.deep_match(resume, job, resume_id, job_id, similarity, started).await)
    }

    /// Matches every resume independently. Failed resumes are logged and left out;
    /// `total_resumes` still counts them. Results keep input order.
    pub async fn match_batch(self: &Arc<Self>, resumes: Vec<Resume>, job: JobDescription, job_id: &str) -> BatchMatchResult {
        let started = Instant::now();
        let total_resumes = resumes.len();

        let items = resumes
            .into_iter()
            .enumerate()
            .map(|(idx, resume)| (idx, resume, None))
            .collect();
        let results: Vec<MatchResult> = self
            .run_bounded(items, Arc::new(job), job_id)
            .await
            .into_iter()
            .map(|(_, result)| result)
            .collect();

        let aggregate_stats = aggregate_statistics(&results);
        let total_cost = results.iter().map(|r| r.llm_cost).sum();

        info!(
            "Batch for job {} finished: {}/{} resumes matched, cost ${:.4}",
            job_id,
            results.len(),
            total_resumes,
            total_cost
        );

        BatchMatchResult {
            job_id: job_id.to_string(),
            timestamp: Utc::now(),
            total_resumes,
            results,
            aggregate_stats,
            total_processing_time_ms: elapsed_ms(started),
            total_cost,
        }
    }

    /// Cheap-first screening of a large pool: one batched embedding call ranks every
    /// resume, those below the threshold are dropped, the best `top_k` are deep-matched.
    /// Results are sorted by overall score, best first.
    pub async fn shortlist(
        self: &Arc<Self>,
        resumes: Vec<Resume>,
        job: JobDescription,
        job_id: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<MatchResult>, MatchError> {
        let ranked = self.semantic.batch_similarity(&resumes, &job).await?;

        let mut survivors: Vec<(usize, f32)> = ranked
            .into_iter()
            .filter(|(_, score)| !self.settings.enable_semantic_filter || *score >= self.settings.semantic_threshold)
            .collect();
        if let Some(k) = top_k {
            survivors.truncate(k);
        }

        let mut slots: Vec<Option<Resume>> = resumes.into_iter().map(Some).collect();
        let items = survivors
            .into_iter()
            .filter_map(|(idx, score)| slots[idx].take().map(|resume| (idx, resume, Some(score))))
            .collect();

        let mut results: Vec<MatchResult> = self
            .run_bounded(items, Arc::new(job), job_id)
            .await
            .into_iter()
            .map(|(_, result)| result)
            .collect();
        results.sort_by(|a, b| b.overall_score.cmp(&a.overall_score));
        Ok(results)
    }

    /// Runs per-resume matches with at most `batch_concurrency` in flight.
    /// A precomputed similarity skips the pre-filter for that resume.
    async fn run_bounded(
        self: &Arc<Self>,
        items: Vec<(usize, Resume, Option<f32>)>,
        job: Arc<JobDescription>,
        job_id: &str,
    ) -> Vec<(usize, MatchResult)> {
        let permits = Arc::new(Semaphore::new(self.settings.batch_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (idx, resume, similarity) in items {
            let engine = Arc::clone(self);
            let job = Arc::clone(&job);
            let permits = Arc::clone(&permits);
            let job_id = job_id.to_string();

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let resume_id = format!("resume_{idx}");
                let resume = Arc::new(resume);
                let outcome = match similarity {
                    Some(similarity) => Ok(engine
                        .deep_match(resume, job, &resume_id, &job_id, similarity, Instant::now())
                        .await),
                    None => engine.match_resume(resume, job, &resume_id, &job_id).await,
                };
                (idx, resume_id, outcome)
            });
        }

        let mut completed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, _, Ok(result))) => completed.push((idx, result)),
                Ok((_, resume_id, Err(e))) => {
                    error!("Skipping {} for job {}: {}", resume_id, job_id, e)
                }
                Err(e) => error!("Skipping resume for job {}: {}", job_id, MatchError::Task(e.to_string())),
            }
        }

        completed.sort_by_key(|(idx, _)| *idx);
        completed
    }

    async fn deep_match(
        &self,
        resume: Arc<Resume>,
        job: Arc<JobDescription>,
        resume_id: &str,
        job_id: &str,
        similarity: f32,
        started: Instant,
    ) -> MatchResult {
        let (dimension_report, skill_report): (DimensionReport, SkillReport) = tokio::join!(
            self.dimensions.evaluate(Arc::clone(&resume), Arc::clone(&job)),
            self.skills.analyze(&resume, &job),
        );

        let overall_score = weighted_score(&dimension_report.dimensions);
        let recommendation = Recommendation::from_score(overall_score);

        let (overall_reasoning, reasoning_usage, reasoning_fallback) = self
            .reasoning(&job, &dimension_report.dimensions, &skill_report, overall_score, recommendation)
            .await;

        let confidence = confidence(&dimension_report.dimensions, similarity);
        let (strengths, weaknesses) = strengths_and_weaknesses(&dimension_report.dimensions);
        let llm_cost = dimension_report.cost + skill_report.cost + reasoning_usage.cost;
        let llm_latency_ms = dimension_report.latency_ms + skill_report.latency_ms + reasoning_usage.latency_ms;

        let mut metadata = Map::new();
        metadata.insert("semantic_similarity".to_string(), json!(similarity));
        metadata.insert("passed_semantic_filter".to_string(), json!(similarity >= self.settings.semantic_threshold));
        metadata.insert(
            "failed_dimensions".to_string(),
            json!(dimension_report.failed.iter().map(|d| d.key()).collect::<Vec<_>>()),
        );
        metadata.insert("skill_analysis_fallback".to_string(), json!(skill_report.used_fallback));
        metadata.insert("reasoning_fallback".to_string(), json!(reasoning_fallback));
        metadata.insert("llm_latency_ms".to_string(), json!(llm_latency_ms));

        let result = MatchResult {
            resume_id: resume_id.to_string(),
            job_id: job_id.to_string(),
            timestamp: Utc::now(),
            overall_score,
            semantic_similarity: similarity,
            recommendation,
            confidence,
            dimension_scores: dimension_report.dimensions,
            matched_skills: skill_report.analysis.matches,
            missing_critical_skills: skill_report.analysis.missing_critical,
            strengths,
            weaknesses,
            overall_reasoning,
            processing_time_ms: elapsed_ms(started),
            llm_cost,
            metadata,
        };

        info!(
            "Matched {} to job {}: score {} ({}), confidence {:.2}, cost ${:.4}, {:.0}ms",
            result.resume_id,
            result.job_id,
            result.overall_score,
            result.recommendation.label(),
            result.confidence,
            result.llm_cost,
            result.processing_time_ms
        );
        result
    }

    /// Narrative over the finished evaluation. Runs strictly after dimensions and skills.
    /// Returns the text, its usage and whether the deterministic fallback was used.
    async fn reasoning(
        &self,
        job: &JobDescription,
        dimensions: &[ScoreDimension],
        skills: &SkillReport,
        overall_score: u32,
        recommendation: Recommendation,
    ) -> (String, CallUsage, bool) {
        let scores_summary = dimensions
            .iter()
            .map(|d| format!("- {}: {}/100 - {}", d.dimension, d.score, d.explanation))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = prompts::REASONING_PROMPT_TEMPLATE
            .replace("{job_title}", &job.job_title)
            .replace("{scores_summary}", &scores_summary)
            .replace("{matched_count}", &skills.analysis.matches.len().to_string())
            .replace("{missing_count}", &skills.analysis.missing_critical.len().to_string());

        let call = self
            .llm
            .generate(&prompt, Some(prompts::REASONING_SYSTEM), REASONING_TEMPERATURE, None);

        let (failure, usage) = match with_deadline(self.settings.call_timeout, call).await {
            Ok(reply) if !reply.content.trim().is_empty() => {
                let usage = CallUsage::of(&reply);
                return (reply.content, usage, false);
            }
            Ok(reply) => ("empty LLM response".to_string(), CallUsage::of(&reply)),
            Err(e) => (e.to_string(), CallUsage::default()),
        };

        warn!("Overall reasoning unavailable ({failure}), using summary narrative");
        let narrative = fallback_reasoning(job, dimensions, skills, overall_score, recommendation);
        (narrative, usage, true)
    }

    fn rejection(&self, resume_id: &str, job_id: &str, similarity: f32, started: Instant) -> MatchResult {
        let threshold = self.settings.semantic_threshold;

        let mut metadata = Map::new();
        metadata.insert("rejected_by_semantic_filter".to_string(), Value::Bool(true));
        metadata.insert(
            "rejection_reason".to_string(),
            json!(format!("Semantic similarity {similarity:.3} below threshold {threshold:.2}")),
        );
        metadata.insert("semantic_threshold".to_string(), json!(threshold));
        metadata.insert("semantic_similarity".to_string(), json!(similarity));
        metadata.insert("passed_semantic_filter".to_string(), Value::Bool(false));

        MatchResult {
            resume_id: resume_id.to_string(),
            job_id: job_id.to_string(),
            timestamp: Utc::now(),
            overall_score: 0,
            semantic_similarity: similarity,
            recommendation: Recommendation::NotRecommended,
            confidence: REJECTION_CONFIDENCE,
            dimension_scores: vec![],
            matched_skills: vec![],
            missing_critical_skills: vec![],
            strengths: vec![],
            weaknesses: vec![REJECTION_WEAKNESS.to_string()],
            overall_reasoning: format!(
                "Rejected by the semantic pre-filter: similarity {similarity:.3} is below the {threshold:.2} threshold, so no detailed evaluation was run."
            ),
            processing_time_ms: elapsed_ms(started),
            llm_cost: 0.0,
            metadata,
        }
    }
}

/// Deterministic summary used when the reasoning call fails.
fn fallback_reasoning(
    job: &JobDescription,
    dimensions: &[ScoreDimension],
    skills: &SkillReport,
    overall_score: u32,
    recommendation: Recommendation,
) -> String {
    let mut text = format!(
        "{} for {} with an overall score of {}/100.",
        recommendation.label(),
        job.job_title,
        overall_score
    );

    let best = dimensions.iter().max_by_key(|d| d.score);
    let worst = dimensions.iter().min_by_key(|d| d.score);
    if let (Some(best), Some(worst)) = (best, worst) {
        text.push_str(&format!(
            " Strongest dimension: {} ({}/100); weakest: {} ({}/100).",
            best.dimension, best.score, worst.dimension, worst.score
        ));
    }

    text.push_str(&format!(
        " Skills: {} matched, {} critical missing.",
        skills.analysis.matches.len(),
        skills.analysis.missing_critical.len()
    ));
    text
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::dimensions::EVALUATION_FAILED_GAP;
    use crate::testing::{sample_job, sample_resume, AngleEmbedder, FailingEmbedder, ScriptedLlm};

    const SKILLS_REPLY: &str = r#"{
        "matched_skills": [
            {"skill": "Python", "match_type": "exact", "relevance_score": 1.0, "explanation": "listed"},
            {"skill": "TensorFlow", "match_type": "similar", "relevance_score": 0.75, "explanation": "Pytorch"}
        ],
        "missing_critical": []
    }"#;

    fn verdict(score: u32) -> String {
        format!(r#"{{"score": {score}, "explanation": "scored {score}", "evidence": ["ev{score}"], "gaps": ["gap{score}"]}}"#)
    }

    fn scenario_llm() -> ScriptedLlm {
        ScriptedLlm::new()
            .reply("Evaluate the technical skills match", &verdict(80), 0.01)
            .reply("Evaluate experience relevance", &verdict(70), 0.01)
            .reply("Evaluate educational qualifications", &verdict(60), 0.01)
            .reply("Evaluate cultural fit", &verdict(50), 0.01)
            .reply("Evaluate growth potential", &verdict(90), 0.01)
            .reply("Analyze skill matching", SKILLS_REPLY, 0.02)
            .reply("Generate overall matching analysis", "A solid candidate worth interviewing.", 0.03)
    }

    fn engine_with(llm: Arc<ScriptedLlm>, embedder: AngleEmbedder, settings: MatchSettings) -> Arc<MatchEngine> {
        let semantic = Arc::new(SemanticMatcher::new(Arc::new(embedder), settings.semantic_threshold));
        Arc::new(MatchEngine::new(semantic, llm, settings))
    }

    fn engine(llm: Arc<ScriptedLlm>, similarity: f32) -> Arc<MatchEngine> {
        engine_with(llm, AngleEmbedder::new(similarity), MatchSettings::default())
    }

    async fn run(engine: &MatchEngine) -> Result<MatchResult, MatchError> {
        engine
            .match_resume(Arc::new(sample_resume()), Arc::new(sample_job()), "r1", "j1")
            .await
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let llm = Arc::new(scenario_llm());
        let result = run(&engine(Arc::clone(&llm), 0.8)).await.unwrap();

        assert_eq!(result.overall_score, 71);
        assert_eq!(result.recommendation, Recommendation::Maybe);
        assert_eq!(result.dimension_scores.len(), 5);
        let labels: Vec<&str> = result.dimension_scores.iter().map(|d| d.dimension.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Technical Skills",
                "Experience Relevance",
                "Education & Certifications",
                "Cultural Fit",
                "Growth Potential"
            ]
        );

        // variance 200 → 0.8; alignment 1 - |0.70 - 0.80| = 0.9
        assert!((result.confidence - 0.84).abs() < 1e-6);
        assert_eq!(result.strengths, vec!["ev80", "ev90"]);
        assert_eq!(result.weaknesses, vec!["gap50"]);
        assert_eq!(result.matched_skills.len(), 2);
        assert_eq!(result.overall_reasoning, "A solid candidate worth interviewing.");
        assert!((result.llm_cost - 0.10).abs() < 1e-9);
        // Each scripted reply reports 1ms; seven calls in total.
        assert_eq!(result.metadata["llm_latency_ms"], 7.0);
        assert_eq!(llm.calls(), 7);
        assert_eq!(result.metadata["passed_semantic_filter"], true);
        assert_eq!(result.metadata["skill_analysis_fallback"], false);
        assert!(!result.rejected_by_semantic_filter());
    }

    #[tokio::test]
    async fn test_semantic_filter_short_circuits_without_llm_calls() {
        let llm = Arc::new(scenario_llm());
        let result = run(&engine(Arc::clone(&llm), 0.5)).await.unwrap();

        assert_eq!(llm.calls(), 0);
        assert_eq!(result.overall_score, 0);
        assert_eq!(result.recommendation, Recommendation::NotRecommended);
        assert_eq!(result.confidence, REJECTION_CONFIDENCE);
        assert!(result.dimension_scores.is_empty());
        assert_eq!(result.weaknesses, vec![REJECTION_WEAKNESS]);
        assert!((result.semantic_similarity - 0.5).abs() < 1e-4);
        assert!(result.rejected_by_semantic_filter());
        assert_eq!(result.llm_cost, 0.0);
    }

    #[tokio::test]
    async fn test_disabled_filter_evaluates_low_similarity() {
        let llm = Arc::new(scenario_llm());
        let settings = MatchSettings {
            enable_semantic_filter: false,
            ..Default::default()
        };
        let result = run(&engine_with(Arc::clone(&llm), AngleEmbedder::new(0.3), settings))
            .await
            .unwrap();

        assert_eq!(llm.calls(), 7);
        assert_eq!(result.overall_score, 71);
        assert_eq!(result.metadata["passed_semantic_filter"], false);
    }

    #[tokio::test]
    async fn test_every_llm_call_failing_still_yields_complete_result() {
        let llm = Arc::new(ScriptedLlm::new().fail_default());
        let result = run(&engine(Arc::clone(&llm), 0.9)).await.unwrap();

        assert_eq!(result.dimension_scores.len(), 5);
        assert!(result.dimension_scores.iter().all(|d| d.score == 0));
        assert_eq!(result.overall_score, 0);
        assert_eq!(result.recommendation, Recommendation::NotRecommended);
        assert_eq!(result.weaknesses.len(), 5);
        assert!(result.weaknesses.iter().all(|w| w == EVALUATION_FAILED_GAP));
        assert_eq!(result.missing_critical_skills, vec!["TensorFlow"]);
        assert_eq!(result.matched_skills[0].skill, "Python");
        assert!(result.overall_reasoning.starts_with("Not Recommended for ML Engineer"));
        assert_eq!(result.metadata["failed_dimensions"].as_array().unwrap().len(), 5);
        assert_eq!(result.metadata["skill_analysis_fallback"], true);
        assert_eq!(result.metadata["reasoning_fallback"], true);
        assert_eq!(result.llm_cost, 0.0);
        assert_eq!(result.metadata["llm_latency_ms"], 0.0);
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts_match() {
        let llm = Arc::new(scenario_llm());
        let semantic = Arc::new(SemanticMatcher::new(Arc::new(FailingEmbedder), 0.7));
        let engine = MatchEngine::new(semantic, llm.clone(), MatchSettings::default());

        let err = run(&engine).await.unwrap_err();
        assert!(matches!(err, MatchError::Embedding(_)));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reasoning_timeout_uses_fallback_narrative() {
        let llm = Arc::new(
            scenario_llm().delay("Generate overall matching analysis", std::time::Duration::from_secs(600)),
        );
        let result = run(&engine(llm, 0.8)).await.unwrap();

        assert_eq!(result.overall_score, 71);
        assert!(result.overall_reasoning.starts_with("Maybe for ML Engineer with an overall score of 71/100."));
        assert_eq!(result.metadata["reasoning_fallback"], true);
        assert!((result.llm_cost - 0.07).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_batch_skips_failures_and_keeps_input_order() {
        let llm = Arc::new(scenario_llm());
        let embedder = AngleEmbedder::new(0.8).with_failure("unembeddable");
        let engine = engine_with(llm, embedder, MatchSettings::default());

        let broken = Resume {
            summary: Some("unembeddable".to_string()),
            ..Default::default()
        };
        let batch = engine
            .match_batch(vec![sample_resume(), broken, sample_resume()], sample_job(), "job-7")
            .await;

        assert_eq!(batch.total_resumes, 3);
        assert_eq!(batch.results.len(), 2);
        let ids: Vec<&str> = batch.results.iter().map(|r| r.resume_id.as_str()).collect();
        assert_eq!(ids, vec!["resume_0", "resume_2"]);
        assert_eq!(batch.aggregate_stats.total_candidates, 2);
        assert!((batch.total_cost - 0.20).abs() < 1e-9);
        assert_eq!(batch.job_id, "job-7");
    }

    #[tokio::test]
    async fn test_parallel_batch_preserves_order() {
        let llm = Arc::new(scenario_llm());
        let settings = MatchSettings {
            batch_concurrency: 4,
            ..Default::default()
        };
        let engine = engine_with(Arc::clone(&llm), AngleEmbedder::new(0.8), settings);

        let resumes = (0..6).map(|_| sample_resume()).collect();
        let batch = engine.match_batch(resumes, sample_job(), "job").await;

        let ids: Vec<String> = batch.results.iter().map(|r| r.resume_id.clone()).collect();
        let expected: Vec<String> = (0..6).map(|i| format!("resume_{i}")).collect();
        assert_eq!(ids, expected);
        assert_eq!(llm.calls(), 42);
    }

    #[tokio::test]
    async fn test_empty_batch_has_zeroed_stats() {
        let engine = engine(Arc::new(scenario_llm()), 0.8);
        let batch = engine.match_batch(vec![], sample_job(), "job").await;
        assert_eq!(batch.total_resumes, 0);
        assert!(batch.results.is_empty());
        assert_eq!(batch.aggregate_stats.total_candidates, 0);
        assert_eq!(batch.total_cost, 0.0);
    }

    #[tokio::test]
    async fn test_shortlist_filters_and_limits_before_llm() {
        let llm = Arc::new(scenario_llm());
        let embedder = AngleEmbedder::new(0.5)
            .with_similarity("candidate-alpha", 0.9)
            .with_similarity("candidate-gamma", 0.8);
        let engine = engine_with(Arc::clone(&llm), embedder, MatchSettings::default());

        let tagged = |tag: &str| Resume {
            summary: Some(tag.to_string()),
            ..sample_resume()
        };
        let pool = vec![tagged("candidate-alpha"), tagged("candidate-beta"), tagged("candidate-gamma")];

        let top = engine.shortlist(pool.clone(), sample_job(), "job", Some(1)).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].resume_id, "resume_0");
        assert!((top[0].semantic_similarity - 0.9).abs() < 1e-4);
        assert_eq!(llm.calls(), 7);

        let all = engine.shortlist(pool, sample_job(), "job", None).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.resume_id.as_str()).collect();
        assert_eq!(ids, vec!["resume_0", "resume_2"]);
    }
}
