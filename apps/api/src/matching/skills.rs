//! Skill Matcher (LLM-based) with a deterministic substring fallback.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::prompts;
use super::{with_deadline, CallUsage};
use crate::llm_client::LanguageModel;
use crate::models::resume::dedup_case_insensitive;
use crate::models::{JobDescription, MatchType, Resume, SkillMatch};

/// LLM matches below this relevance are discarded.
pub const MIN_LLM_RELEVANCE: f32 = 0.6;
/// Relevance assigned to every heuristic match.
pub const FALLBACK_RELEVANCE: f32 = 0.7;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SkillAnalysis {
    pub matches: Vec<SkillMatch>,
    pub missing_critical: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SkillReport {
    pub analysis: SkillAnalysis,
    pub cost: f64,
    pub latency_ms: f64,
    pub used_fallback: bool,
}

/// Entries are kept as raw values so one malformed match cannot sink the reply.
#[derive(Debug, Deserialize)]
struct LlmSkillReport {
    #[serde(default)]
    matched_skills: Vec<serde_json::Value>,
    #[serde(default)]
    missing_critical: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LlmSkillMatch {
    skill: String,
    match_type: String,
    relevance_score: f32,
    #[serde(default)]
    explanation: Option<String>,
}

impl LlmSkillMatch {
    fn into_skill_match(self) -> Option<SkillMatch> {
        let match_type = MatchType::from_label(&self.match_type)?;
        if !self.relevance_score.is_finite() {
            return None;
        }
        Some(SkillMatch {
            skill: self.skill,
            match_type,
            relevance_score: self.relevance_score.clamp(0.0, 1.0),
            explanation: self.explanation,
        })
    }
}

pub struct SkillMatcher {
    llm: Arc<dyn LanguageModel>,
    call_timeout: Duration,
}

impl SkillMatcher {
    pub fn new(llm: Arc<dyn LanguageModel>, call_timeout: Duration) -> Self {
        Self { llm, call_timeout }
    }

    /// Asks the LLM to classify skill matches; any failure degrades to the heuristic.
    pub async fn analyze(&self, resume: &Resume, job: &JobDescription) -> SkillReport {
        let prompt = build_prompt(resume, job);
        let call = self.llm.generate_structured(&prompt, Some(prompts::SKILLS_SYSTEM), None);

        let (parsed, usage) = match with_deadline(self.call_timeout, call).await {
            Ok(reply) => (parse_reply(&reply.content), CallUsage::of(&reply)),
            Err(e) => (Err(e.to_string()), CallUsage::default()),
        };

        match parsed {
            Ok(analysis) => SkillReport {
                analysis,
                cost: usage.cost,
                latency_ms: usage.latency_ms,
                used_fallback: false,
            },
            Err(reason) => {
                warn!("LLM skill matching failed ({reason}), using fallback");
                SkillReport {
                    analysis: fallback_skill_analysis(resume, job),
                    cost: usage.cost,
                    latency_ms: usage.latency_ms,
                    used_fallback: true,
                }
            }
        }
    }
}

fn build_prompt(resume: &Resume, job: &JobDescription) -> String {
    let bullets = |skills: &[String]| {
        if skills.is_empty() {
            "None".to_string()
        } else {
            skills.iter().map(|s| format!("- {s}")).collect::<Vec<_>>().join("\n")
        }
    };
    let candidate = if resume.skills.is_empty() {
        "None listed".to_string()
    } else {
        resume.skills.join(", ")
    };

    prompts::SKILLS_PROMPT_TEMPLATE
        .replace("{candidate_skills}", &candidate)
        .replace("{required_skills}", &bullets(&job.required_skills))
        .replace("{preferred_skills}", &bullets(&job.preferred_skills))
}

fn parse_reply(content: &str) -> Result<SkillAnalysis, String> {
    if content.trim().is_empty() {
        return Err("empty LLM response".to_string());
    }
    let report: LlmSkillReport =
        serde_json::from_str(content).map_err(|e| format!("invalid JSON response: {e}"))?;

    let total = report.matched_skills.len();
    let matches: Vec<SkillMatch> = report
        .matched_skills
        .into_iter()
        .filter_map(|raw| serde_json::from_value::<LlmSkillMatch>(raw).ok())
        .filter_map(LlmSkillMatch::into_skill_match)
        .filter(|m| m.relevance_score >= MIN_LLM_RELEVANCE)
        .collect();
    if matches.len() < total {
        debug!("Dropped {} of {} LLM skill matches", total - matches.len(), total);
    }

    Ok(SkillAnalysis {
        matches,
        missing_critical: report.missing_critical,
    })
}

/// Case-insensitive substring heuristic over the job's required skills. Never fails.
///
/// A required skill matches when it contains, or is contained in, a resume skill.
/// Every distinct required skill lands in exactly one of the two lists.
pub fn fallback_skill_analysis(resume: &Resume, job: &JobDescription) -> SkillAnalysis {
    let resume_skills: Vec<(&str, String)> = resume
        .skills
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| (s.as_str(), s.trim().to_lowercase()))
        .collect();

    let mut analysis = SkillAnalysis::default();
    for required in dedup_case_insensitive(job.required_skills.clone()) {
        let needle = required.trim().to_lowercase();
        let hit = (!needle.is_empty())
            .then(|| {
                resume_skills
                    .iter()
                    .find(|(_, lower)| needle.contains(lower.as_str()) || lower.contains(needle.as_str()))
            })
            .flatten();

        match hit {
            Some((original, _)) => analysis.matches.push(SkillMatch {
                skill: required,
                match_type: MatchType::Similar,
                relevance_score: FALLBACK_RELEVANCE,
                explanation: Some(format!("Matches '{original}'")),
            }),
            None => analysis.missing_critical.push(required),
        }
    }
    analysis
}
