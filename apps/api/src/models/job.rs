use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperienceLevel {
    #[serde(rename = "Entry Level")]
    Entry,
    #[serde(rename = "Mid Level")]
    Mid,
    Senior,
    Lead,
    Executive,
}

/// A single structured requirement extracted from the JD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequirement {
    /// e.g. "technical_skill", "experience", "education"
    pub category: String,
    #[serde(alias = "text")]
    pub requirement: String,
    #[serde(default = "default_true")]
    pub is_required: bool,
    /// 1 = critical, 2 = important, 3 = nice-to-have
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_true() -> bool {
    true
}

fn default_priority() -> u8 {
    1
}

/// A parsed job description. Read-only once it enters the matching pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobDescription {
    #[serde(alias = "title")]
    pub job_title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub experience_level: Option<ExperienceLevel>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub preferred_skills: Vec<String>,
    #[serde(default)]
    pub education_requirements: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<JobRequirement>,
    #[serde(default)]
    pub min_experience_years: Option<u32>,
    #[serde(default)]
    pub max_experience_years: Option<u32>,
}

impl JobDescription {
    /// Rejects records the matching pipeline cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.job_title.trim().is_empty() {
            return Err("job_title cannot be empty".to_string());
        }
        if let Some(req) = self.requirements.iter().find(|r| !(1..=3).contains(&r.priority)) {
            return Err(format!(
                "requirement '{}' has priority {} (expected 1-3)",
                req.requirement, req.priority
            ));
        }
        if let (Some(min), Some(max)) = (self.min_experience_years, self.max_experience_years) {
            if min > max {
                return Err(format!(
                    "min_experience_years ({min}) exceeds max_experience_years ({max})"
                ));
            }
        }
        Ok(())
    }

    /// Required skills followed by preferred skills, in JD order.
    pub fn all_skills(&self) -> Vec<String> {
        self.required_skills
            .iter()
            .chain(self.preferred_skills.iter())
            .cloned()
            .collect()
    }
}
