//! Flat text renderings of resumes and job descriptions fed to the embedding model.

use crate::models::resume::WorkExperience;
use crate::models::{JobDescription, Resume};

/// Summary, skills, experience, education and certifications as one paragraph.
pub fn resume_representation(resume: &Resume) -> String {
    let mut parts = Vec::new();

    if let Some(summary) = resume.summary.as_deref().filter(|s| !s.trim().is_empty()) {
        parts.push(format!("Professional Summary: {summary}"));
    }
    if !resume.skills.is_empty() {
        parts.push(format!("Skills: {}", resume.skills.join(", ")));
    }
    for exp in &resume.work_experience {
        let mut text = format!("{} at {}. {}", exp.title, exp.company, exp.description_or_default());
        if !exp.technologies.is_empty() {
            text.push_str(&format!(" Technologies: {}", exp.technologies.join(", ")));
        }
        parts.push(text);
    }
    for edu in &resume.education {
        parts.push(format!(
            "{} in {} from {}",
            edu.degree,
            edu.field_of_study.as_deref().unwrap_or("N/A"),
            edu.institution
        ));
    }
    if !resume.certifications.is_empty() {
        let certs: Vec<String> = resume
            .certifications
            .iter()
            .map(|c| match c.issuer.as_deref() {
                Some(issuer) => format!("{} from {}", c.name, issuer),
                None => c.name.clone(),
            })
            .collect();
        parts.push(format!("Certifications: {}", certs.join(", ")));
    }

    parts.join(" ")
}

/// Title, summary, responsibilities, skills and education requirements as one paragraph.
///
/// Always starts with `"Job Title:"`.
pub fn job_representation(job: &JobDescription) -> String {
    let mut parts = vec![
        format!("Job Title: {}", job.job_title),
        format!("Summary: {}", job.summary),
    ];

    if !job.responsibilities.is_empty() {
        parts.push(format!("Responsibilities: {}", job.responsibilities.join(" ")));
    }
    if !job.required_skills.is_empty() {
        parts.push(format!("Required Skills: {}", job.required_skills.join(", ")));
    }
    if !job.preferred_skills.is_empty() {
        parts.push(format!("Preferred Skills: {}", job.preferred_skills.join(", ")));
    }
    if !job.education_requirements.is_empty() {
        parts.push(format!("Education: {}", job.education_requirements.join(" ")));
    }

    parts.join(" ")
}

/// What the job asks for, without title or education: the target of experience relevance.
pub fn job_requirements_text(job: &JobDescription) -> String {
    [
        job.summary.clone(),
        job.responsibilities.join(" "),
        job.required_skills.join(" "),
    ]
    .join(" ")
}

pub fn experience_text(exp: &WorkExperience) -> String {
    let mut text = format!("{} at {}. {}", exp.title, exp.company, exp.description_or_default());
    if !exp.achievements.is_empty() {
        text.push(' ');
        text.push_str(&exp.achievements.join(" "));
    }
    if !exp.technologies.is_empty() {
        text.push_str(&format!(" Technologies: {}", exp.technologies.join(", ")));
    }
    text
}
