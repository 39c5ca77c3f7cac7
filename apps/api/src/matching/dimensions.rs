//! Dimension Evaluator: five independent LLM judgments run concurrently.
//!
//! Every call resolves to a `DimensionOutcome`; failures never escape. The evaluator
//! always hands back exactly five `ScoreDimension`s in `Dimension::ALL` order,
//! whatever order the calls complete in.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::warn;

use super::prompts;
use super::weights::ScoringWeights;
use super::{with_deadline, CallUsage};
use crate::llm_client::LanguageModel;
use crate::models::{JobDescription, Resume, ScoreDimension};

/// Gap recorded on every dimension whose evaluation did not produce a verdict.
pub const EVALUATION_FAILED_GAP: &str = "Evaluation failed";

/// The fixed evaluation axes, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    TechnicalSkills,
    Experience,
    Education,
    CulturalFit,
    GrowthPotential,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::TechnicalSkills,
        Dimension::Experience,
        Dimension::Education,
        Dimension::CulturalFit,
        Dimension::GrowthPotential,
    ];

    /// Position in `ALL`.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn key(self) -> &'static str {
        match self {
            Dimension::TechnicalSkills => "technical_skills",
            Dimension::Experience => "experience",
            Dimension::Education => "education",
            Dimension::CulturalFit => "cultural_fit",
            Dimension::GrowthPotential => "growth_potential",
        }
    }

    /// Human-readable name stored on `ScoreDimension::dimension`.
    pub fn label(self) -> &'static str {
        match self {
            Dimension::TechnicalSkills => "Technical Skills",
            Dimension::Experience => "Experience Relevance",
            Dimension::Education => "Education & Certifications",
            Dimension::CulturalFit => "Cultural Fit",
            Dimension::GrowthPotential => "Growth Potential",
        }
    }

    fn system_prompt(self) -> &'static str {
        match self {
            Dimension::TechnicalSkills => prompts::TECHNICAL_SYSTEM,
            Dimension::Experience => prompts::EXPERIENCE_SYSTEM,
            Dimension::Education => prompts::EDUCATION_SYSTEM,
            Dimension::CulturalFit => prompts::CULTURAL_SYSTEM,
            Dimension::GrowthPotential => prompts::GROWTH_SYSTEM,
        }
    }

    /// Renders the dimension-specific prompt from the relevant resume and job fields.
    pub fn build_prompt(self, resume: &Resume, job: &JobDescription) -> String {
        let prompt = match self {
            Dimension::TechnicalSkills => prompts::TECHNICAL_PROMPT_TEMPLATE
                .replace("{job_title}", &job.job_title)
                .replace("{required_skills}", &list_or(&job.required_skills, "None specified"))
                .replace("{preferred_skills}", &list_or(&job.preferred_skills, "None specified"))
                .replace("{candidate_skills}", &list_or(&resume.skills, "None listed"))
                .replace("{experience}", &format_experience(resume, None)),
            Dimension::Experience => prompts::EXPERIENCE_PROMPT_TEMPLATE
                .replace("{job_title}", &job.job_title)
                .replace("{experience_range}", &experience_range(job))
                .replace(
                    "{responsibilities}",
                    &or_default(job.responsibilities.iter().take(3).cloned().collect::<Vec<_>>().join(" "), "Not specified"),
                )
                .replace(
                    "{total_years}",
                    &resume
                        .total_experience_years
                        .map(|y| y.to_string())
                        .unwrap_or_else(|| "Not specified".to_string()),
                )
                .replace("{experience}", &format_experience(resume, Some(3))),
            Dimension::Education => prompts::EDUCATION_PROMPT_TEMPLATE
                .replace("{education_requirements}", &list_or(&job.education_requirements, "Not specified"))
                .replace("{education}", &format_education(resume))
                .replace("{certifications}", &format_certifications(resume)),
            Dimension::CulturalFit => prompts::CULTURAL_PROMPT_TEMPLATE
                .replace("{job_summary}", &or_default(job.summary.clone(), "Not provided"))
                .replace(
                    "{candidate_summary}",
                    resume.summary.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or("Not provided"),
                )
                .replace("{achievements}", &format_achievements(resume)),
            Dimension::GrowthPotential => prompts::GROWTH_PROMPT_TEMPLATE
                .replace("{experience}", &format_experience(resume, None))
                .replace(
                    "{certifications}",
                    &or_default(
                        resume.certifications.iter().map(|c| c.name.clone()).collect::<Vec<_>>().join(", "),
                        "None",
                    ),
                ),
        };
        prompt.replace("{response_shape}", prompts::DIMENSION_RESPONSE_SHAPE)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Per-call outcome
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Verdict {
    score: f64,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    evidence: Vec<String>,
    #[serde(default)]
    gaps: Vec<String>,
}

/// Result of one dimension call, before it is collapsed into a `ScoreDimension`.
#[derive(Debug, Clone, PartialEq)]
pub enum DimensionOutcome {
    Parsed {
        score: u32,
        explanation: String,
        evidence: Vec<String>,
        gaps: Vec<String>,
    },
    Failed {
        reason: String,
    },
}

impl DimensionOutcome {
    /// Interprets the model's reply. Empty content, invalid JSON or a missing
    /// score all become `Failed`.
    pub fn from_reply(content: &str) -> Self {
        if content.trim().is_empty() {
            return DimensionOutcome::Failed {
                reason: "empty LLM response".to_string(),
            };
        }

        let verdict: Verdict = match serde_json::from_str(content) {
            Ok(v) => v,
            Err(e) => {
                return DimensionOutcome::Failed {
                    reason: format!("invalid JSON response: {e}"),
                }
            }
        };

        if !verdict.score.is_finite() {
            return DimensionOutcome::Failed {
                reason: "score is not a number".to_string(),
            };
        }

        DimensionOutcome::Parsed {
            score: verdict.score.round().clamp(0.0, 100.0) as u32,
            explanation: verdict
                .explanation
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| "No explanation provided".to_string()),
            evidence: verdict.evidence,
            gaps: verdict.gaps,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DimensionOutcome::Failed { .. })
    }

    /// The single place a failed evaluation is turned into its fallback dimension.
    pub fn into_score(self, dimension: Dimension, weight: f64) -> ScoreDimension {
        match self {
            DimensionOutcome::Parsed {
                score,
                explanation,
                evidence,
                gaps,
            } => ScoreDimension {
                dimension: dimension.label().to_string(),
                score,
                weight,
                explanation,
                evidence,
                gaps,
            },
            DimensionOutcome::Failed { reason } => ScoreDimension {
                dimension: dimension.label().to_string(),
                score: 0,
                weight,
                explanation: format!("Evaluation failed: {reason}"),
                evidence: vec![],
                gaps: vec![EVALUATION_FAILED_GAP.to_string()],
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Evaluator
// ────────────────────────────────────────────────────────────────────────────

/// Five dimensions in canonical order plus what producing them cost.
#[derive(Debug, Clone)]
pub struct DimensionReport {
    pub dimensions: Vec<ScoreDimension>,
    pub cost: f64,
    /// Summed provider latency of the replies received, not wall-clock time.
    pub latency_ms: f64,
    pub failed: Vec<Dimension>,
}

pub struct DimensionEvaluator {
    llm: Arc<dyn LanguageModel>,
    weights: ScoringWeights,
    call_timeout: Duration,
}

impl DimensionEvaluator {
    pub fn new(llm: Arc<dyn LanguageModel>, weights: ScoringWeights, call_timeout: Duration) -> Self {
        Self {
            llm,
            weights,
            call_timeout,
        }
    }

    /// Runs all five evaluations concurrently. Never fails.
    ///
    /// Each task reports its own cost and latency; both are summed after the join.
    pub async fn evaluate(&self, resume: Arc<Resume>, job: Arc<JobDescription>) -> DimensionReport {
        let mut tasks = JoinSet::new();
        for dimension in Dimension::ALL {
            let llm = Arc::clone(&self.llm);
            let resume = Arc::clone(&resume);
            let job = Arc::clone(&job);
            let deadline = self.call_timeout;
            tasks.spawn(async move {
                let (outcome, usage) = evaluate_one(llm.as_ref(), dimension, &resume, &job, deadline).await;
                (dimension, outcome, usage)
            });
        }

        let mut slots: [Option<DimensionOutcome>; 5] = Default::default();
        let (mut cost, mut latency_ms) = (0.0, 0.0);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((dimension, outcome, usage)) => {
                    cost += usage.cost;
                    latency_ms += usage.latency_ms;
                    slots[dimension.index()] = Some(outcome);
                }
                Err(e) => warn!("Dimension evaluation task did not complete: {e}"),
            }
        }

        let mut failed = Vec::new();
        let dimensions = Dimension::ALL
            .into_iter()
            .zip(slots)
            .map(|(dimension, slot)| {
                let outcome = slot.unwrap_or_else(|| DimensionOutcome::Failed {
                    reason: "evaluation task aborted".to_string(),
                });
                if outcome.is_failed() {
                    failed.push(dimension);
                }
                outcome.into_score(dimension, self.weights.for_dimension(dimension))
            })
            .collect();

        DimensionReport {
            dimensions,
            cost,
            latency_ms,
            failed,
        }
    }
}

async fn evaluate_one(
    llm: &dyn LanguageModel,
    dimension: Dimension,
    resume: &Resume,
    job: &JobDescription,
    deadline: Duration,
) -> (DimensionOutcome, CallUsage) {
    let prompt = dimension.build_prompt(resume, job);
    let call = llm.generate_structured(&prompt, Some(dimension.system_prompt()), None);

    let (outcome, usage) = match with_deadline(deadline, call).await {
        Ok(reply) => (DimensionOutcome::from_reply(&reply.content), CallUsage::of(&reply)),
        Err(e) => (DimensionOutcome::Failed { reason: e.to_string() }, CallUsage::default()),
    };

    if let DimensionOutcome::Failed { reason } = &outcome {
        warn!("{} evaluation fell back to score 0: {}", dimension.label(), reason);
    }
    (outcome, usage)
}

// ────────────────────────────────────────────────────────────────────────────
// Prompt field formatting
// ────────────────────────────────────────────────────────────────────────────

fn list_or(items: &[String], empty: &str) -> String {
    or_default(items.join(", "), empty)
}

fn or_default(text: String, empty: &str) -> String {
    if text.trim().is_empty() {
        empty.to_string()
    } else {
        text
    }
}

fn experience_range(job: &JobDescription) -> String {
    match (job.min_experience_years, job.max_experience_years) {
        (Some(min), Some(max)) => format!("{min}-{max} years"),
        (Some(min), None) => format!("{min}+ years"),
        (None, Some(max)) => format!("Up to {max} years"),
        (None, None) => "Not specified".to_string(),
    }
}

/// One line per role: title, company, tenure, a description excerpt and up to five technologies.
pub fn format_experience(resume: &Resume, limit: Option<usize>) -> String {
    let lines: Vec<String> = resume
        .work_experience
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|exp| {
            let mut line = format!("- {} at {}", exp.title, exp.company);
            if let Some(months) = exp.duration_months.filter(|m| *m > 0) {
                line.push_str(&format!(" ({}y {}m)", months / 12, months % 12));
            }
            if let Some(desc) = exp.description.as_deref().filter(|d| !d.trim().is_empty()) {
                let excerpt: String = desc.chars().take(200).collect();
                line.push_str(&format!(": {excerpt}"));
            }
            if !exp.technologies.is_empty() {
                let tech: Vec<&str> = exp.technologies.iter().take(5).map(String::as_str).collect();
                line.push_str(&format!(" | Tech: {}", tech.join(", ")));
            }
            line
        })
        .collect();

    or_default(lines.join("\n"), "No experience listed")
}

fn format_education(resume: &Resume) -> String {
    let lines: Vec<String> = resume
        .education
        .iter()
        .map(|e| {
            format!(
                "- {} in {} from {} ({})",
                e.degree,
                e.field_of_study.as_deref().unwrap_or("N/A"),
                e.institution,
                e.graduation_year.map(|y| y.to_string()).unwrap_or_else(|| "N/A".to_string())
            )
        })
        .collect();
    or_default(lines.join("\n"), "None specified")
}

fn format_certifications(resume: &Resume) -> String {
    let lines: Vec<String> = resume
        .certifications
        .iter()
        .map(|c| format!("- {} from {}", c.name, c.issuer.as_deref().unwrap_or("unknown issuer")))
        .collect();
    or_default(lines.join("\n"), "None specified")
}

/// Up to two achievements per role, five in total.
fn format_achievements(resume: &Resume) -> String {
    let achievements: Vec<&str> = resume
        .work_experience
        .iter()
        .flat_map(|exp| exp.achievements.iter().take(2))
        .take(5)
        .map(String::as_str)
        .collect();
    or_default(achievements.join("; "), "None specified")
}
