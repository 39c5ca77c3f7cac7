use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

/// End-date spellings that mean the position is still held.
const OPEN_ENDED_MARKERS: &[&str] = &["present", "current", "now"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub location: Option<String>,
    pub portfolio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkExperience {
    pub company: String,
    pub title: String,
    #[serde(default)]
    pub start_date: Option<String>,
    /// `None` (or "present") means the role is current.
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub duration_months: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
}

impl WorkExperience {
    pub fn description_or_default(&self) -> &str {
        match self.description.as_deref() {
            Some(d) if !d.trim().is_empty() => d,
            _ => "No description provided",
        }
    }

    /// True when the entry has no end date or an explicit "present"-style marker.
    pub fn is_current(&self) -> bool {
        match self.end_date.as_deref() {
            None => true,
            Some(end) => {
                let end = end.trim();
                end.is_empty()
                    || OPEN_ENDED_MARKERS
                        .iter()
                        .any(|m| end.eq_ignore_ascii_case(m))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Education {
    pub degree: String,
    pub institution: String,
    #[serde(default)]
    pub field_of_study: Option<String>,
    #[serde(default)]
    pub graduation_year: Option<i32>,
    #[serde(default)]
    pub gpa: Option<f64>,
    #[serde(default)]
    pub honors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certification {
    pub name: String,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub issue_date: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub credential_id: Option<String>,
}

/// A structured resume as handed over by the parsing collaborator.
/// Read-only once it enters the matching pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resume {
    #[serde(default)]
    pub contact_info: ContactInfo,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "deserialize_skills")]
    pub skills: Vec<String>,
    #[serde(default)]
    pub work_experience: Vec<WorkExperience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub certifications: Vec<Certification>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub total_experience_years: Option<f64>,
}

impl Resume {
    /// Deduplicates skills and recomputes experience durations against `today`.
    ///
    /// Open-ended roles, and roles whose end date cannot be read, are measured up
    /// to `today`. Entries without a start date are left out of the total. Entries
    /// whose start date cannot be read keep the duration the parser produced.
    pub fn normalized(mut self, today: NaiveDate) -> Self {
        self.skills = dedup_case_insensitive(std::mem::take(&mut self.skills));

        let mut total_months: u32 = 0;
        for exp in &mut self.work_experience {
            let Some(raw_start) = exp.start_date.as_deref().filter(|s| !s.trim().is_empty()) else {
                continue;
            };
            let Some(start) = parse_resume_date(raw_start) else {
                total_months += exp.duration_months.unwrap_or(0);
                continue;
            };

            let end = if exp.is_current() {
                today
            } else {
                exp.end_date.as_deref().and_then(parse_resume_date).unwrap_or(today)
            };

            let months = months_between(start, end);
            exp.duration_months = Some(months);
            total_months += months;
        }

        if total_months > 0 {
            self.total_experience_years = Some((total_months as f64 / 12.0 * 10.0).round() / 10.0);
        }

        self
    }

    /// Short display handle derived from the contact email, used in index metadata.
    pub fn display_name(&self) -> String {
        self.contact_info
            .email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|s| !s.is_empty())
            .unwrap_or("Unknown")
            .to_string()
    }
}

fn deserialize_skills<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let skills = Vec::<String>::deserialize(deserializer)?;
    Ok(dedup_case_insensitive(skills))
}

/// Removes case-insensitive duplicates, keeping the first spelling seen.
pub fn dedup_case_insensitive(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.to_lowercase()))
        .collect()
}

/// Parses the loose date strings resume parsers emit.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM`, `YYYY/MM`, `MM/YYYY`, `Mon YYYY`,
/// `Month YYYY` and a bare `YYYY`. Partial dates resolve to the first day.
pub fn parse_resume_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim().trim_end_matches('.');
    if s.is_empty() {
        return None;
    }

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }

    let candidates = [
        (format!("{s}-01"), "%Y-%m-%d"),
        (format!("{s}/01"), "%Y/%m/%d"),
        (format!("01/{s}"), "%d/%m/%Y"),
        (format!("01 {s}"), "%d %B %Y"),
    ];
    for (text, fmt) in &candidates {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return Some(d);
        }
    }

    if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse::<i32>().ok().and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1));
    }

    None
}

/// Whole calendar months from `start` to `end`; zero when `end` precedes `start`.
pub fn months_between(start: NaiveDate, end: NaiveDate) -> u32 {
    let months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    months.max(0) as u32
}
