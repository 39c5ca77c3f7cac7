//! Embedding-space matching: the semantic pre-filter and its supplementary analyses.

use std::sync::Arc;

use serde::Serialize;

use super::embeddings::{embed_exact, Embedder, EmbeddingError};
use super::text::{experience_text, job_representation, job_requirements_text, resume_representation};
use crate::models::{JobDescription, MatchType, Resume, SkillMatch};

/// At or above this a job skill counts as an exact embedding match.
pub const EXACT_MATCH_SIMILARITY: f32 = 0.9;

/// Cosine similarity of two vectors; 0.0 for unequal lengths, empty or zero-norm input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Cosine similarity folded into the [0, 1] score range.
fn unit_similarity(a: &[f32], b: &[f32]) -> f32 {
    cosine_similarity(a, b).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExperienceRelevance {
    pub overall_relevance: f32,
    pub most_relevant_role_score: f32,
    pub average_relevance: f32,
    pub top_3_average: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectionSimilarities {
    pub skills_similarity: f32,
    pub experience_similarity: f32,
    pub education_similarity: f32,
    pub summary_similarity: f32,
}

/// Fast first-pass matcher over a shared embedding model.
pub struct SemanticMatcher {
    embedder: Arc<dyn Embedder>,
    threshold: f32,
}

impl SemanticMatcher {
    pub fn new(embedder: Arc<dyn Embedder>, threshold: f32) -> Self {
        Self { embedder, threshold }
    }

    /// Overall resume/job similarity in [0, 1].
    pub async fn similarity(&self, resume: &Resume, job: &JobDescription) -> Result<f32, EmbeddingError> {
        let texts = vec![resume_representation(resume), job_representation(job)];
        let vectors = embed_exact(self.embedder.as_ref(), &texts).await?;
        Ok(unit_similarity(&vectors[0], &vectors[1]))
    }

    /// Classifies every required and preferred job skill against its closest resume skill.
    ///
    /// Returns one entry per job skill, in JD order. With no resume skills every
    /// job skill is reported missing.
    pub async fn skill_match(
        &self,
        resume: &Resume,
        job: &JobDescription,
    ) -> Result<Vec<SkillMatch>, EmbeddingError> {
        let job_skills = job.all_skills();
        if job_skills.is_empty() {
            return Ok(vec![]);
        }
        if resume.skills.is_empty() {
            return Ok(job_skills.into_iter().map(not_found).collect());
        }

        let texts: Vec<String> = job_skills.iter().chain(resume.skills.iter()).cloned().collect();
        let vectors = embed_exact(self.embedder.as_ref(), &texts).await?;
        let (job_vectors, resume_vectors) = vectors.split_at(job_skills.len());

        let matches = job_skills
            .into_iter()
            .zip(job_vectors)
            .map(|(skill, job_vec)| {
                let (best_idx, best) = resume_vectors
                    .iter()
                    .map(|rv| unit_similarity(job_vec, rv))
                    .enumerate()
                    .fold((0, f32::MIN), |acc, (i, s)| if s > acc.1 { (i, s) } else { acc });

                let match_type = if best >= EXACT_MATCH_SIMILARITY {
                    MatchType::Exact
                } else if best >= self.threshold {
                    MatchType::Similar
                } else {
                    MatchType::Missing
                };

                let explanation = match match_type {
                    MatchType::Missing => "Not found in resume".to_string(),
                    _ => format!("Matches '{}'", resume.skills[best_idx]),
                };

                SkillMatch {
                    skill,
                    match_type,
                    relevance_score: best,
                    explanation: Some(explanation),
                }
            })
            .collect();

        Ok(matches)
    }

    /// Similarity of every resume to the job in a single embedding call,
    /// as `(input index, score)` sorted by score descending.
    pub async fn batch_similarity(
        &self,
        resumes: &[Resume],
        job: &JobDescription,
    ) -> Result<Vec<(usize, f32)>, EmbeddingError> {
        if resumes.is_empty() {
            return Ok(vec![]);
        }

        let mut texts: Vec<String> = resumes.iter().map(resume_representation).collect();
        texts.push(job_representation(job));
        let vectors = embed_exact(self.embedder.as_ref(), &texts).await?;
        let (resume_vectors, job_vector) = vectors.split_at(resumes.len());

        let mut scored: Vec<(usize, f32)> = resume_vectors
            .iter()
            .map(|rv| unit_similarity(rv, &job_vector[0]))
            .enumerate()
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(scored)
    }

    /// How closely each past role matches what the job asks for.
    pub async fn experience_relevance(
        &self,
        resume: &Resume,
        job: &JobDescription,
    ) -> Result<ExperienceRelevance, EmbeddingError> {
        if resume.work_experience.is_empty() {
            return Ok(ExperienceRelevance::default());
        }

        let mut texts = vec![job_requirements_text(job)];
        texts.extend(resume.work_experience.iter().map(experience_text));
        let vectors = embed_exact(self.embedder.as_ref(), &texts).await?;

        let mut scores: Vec<f32> = vectors[1..]
            .iter()
            .map(|v| unit_similarity(&vectors[0], v))
            .collect();
        scores.sort_by(|a, b| b.total_cmp(a));

        let best = scores[0];
        let top = &scores[..scores.len().min(3)];
        Ok(ExperienceRelevance {
            overall_relevance: best,
            most_relevant_role_score: best,
            average_relevance: mean(&scores),
            top_3_average: mean(top),
        })
    }

    /// Similarity of each resume section against the full job text. Absent sections score 0.
    pub async fn section_similarities(
        &self,
        resume: &Resume,
        job: &JobDescription,
    ) -> Result<SectionSimilarities, EmbeddingError> {
        let sections: [Option<String>; 4] = [
            (!resume.skills.is_empty()).then(|| resume.skills.join(", ")),
            (!resume.work_experience.is_empty()).then(|| {
                resume
                    .work_experience
                    .iter()
                    .map(|e| format!("{}: {}", e.title, e.description_or_default()))
                    .collect::<Vec<_>>()
                    .join(" ")
            }),
            (!resume.education.is_empty()).then(|| {
                resume
                    .education
                    .iter()
                    .map(|e| {
                        format!(
                            "{} in {} from {}",
                            e.degree,
                            e.field_of_study.as_deref().unwrap_or_default(),
                            e.institution
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            }),
            resume.summary.clone().filter(|s| !s.trim().is_empty()),
        ];

        let mut texts = vec![job_representation(job)];
        texts.extend(sections.iter().flatten().cloned());
        let vectors = embed_exact(self.embedder.as_ref(), &texts).await?;

        let mut present = vectors[1..].iter();
        let mut scores = [0.0f32; 4];
        for (slot, section) in scores.iter_mut().zip(sections.iter()) {
            if section.is_some() {
                if let Some(v) = present.next() {
                    *slot = unit_similarity(&vectors[0], v);
                }
            }
        }

        Ok(SectionSimilarities {
            skills_similarity: scores[0],
            experience_similarity: scores[1],
            education_similarity: scores[2],
            summary_similarity: scores[3],
        })
    }
}

fn not_found(skill: String) -> SkillMatch {
    SkillMatch {
        skill,
        match_type: MatchType::Missing,
        relevance_score: 0.0,
        explanation: Some("Not found in resume".to_string()),
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}
