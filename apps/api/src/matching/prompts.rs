// All LLM prompt constants for the matching pipeline.
// Templates carry `{placeholder}` markers filled with `.replace` before sending.

/// JSON shape every dimension evaluation must return.
pub const DIMENSION_RESPONSE_SHAPE: &str = r#"Provide a JSON response with:
{
    "score": <0-100>,
    "explanation": "<2-3 sentences explaining the score>",
    "evidence": ["<specific supporting facts from the resume>"],
    "gaps": ["<missing requirements or concerns>"]
}"#;

// ────────────────────────────────────────────────────────────────────────────
// Dimension evaluations
// ────────────────────────────────────────────────────────────────────────────

pub const TECHNICAL_SYSTEM: &str = "You are an expert technical recruiter evaluating candidate skills. \
    Provide objective, evidence-based assessment. Score from 0-100.";

pub const TECHNICAL_PROMPT_TEMPLATE: &str = r#"Evaluate the technical skills match between candidate and job requirements.

**Job Title:** {job_title}

**Required Technical Skills:**
{required_skills}

**Preferred Technical Skills:**
{preferred_skills}

**Candidate's Skills:**
{candidate_skills}

**Candidate's Technical Experience:**
{experience}

{response_shape}"#;

pub const EXPERIENCE_SYSTEM: &str = "You are an expert at evaluating work experience relevance. \
    Consider: role similarity, industry relevance, responsibilities alignment, career progression.";

pub const EXPERIENCE_PROMPT_TEMPLATE: &str = r#"Evaluate experience relevance for this job.

**Job Requirements:**
- Title: {job_title}
- Experience Required: {experience_range}
- Key Responsibilities: {responsibilities}

**Candidate's Experience:**
- Total Years: {total_years}
- Recent Roles:
{experience}

{response_shape}"#;

pub const EDUCATION_SYSTEM: &str = "Evaluate educational qualifications and certifications. \
    Consider: degree relevance, institution quality, certifications, continuous learning.";

pub const EDUCATION_PROMPT_TEMPLATE: &str = r#"Evaluate educational qualifications.

**Job Requirements:**
{education_requirements}

**Candidate's Education:**
{education}

**Certifications:**
{certifications}

{response_shape}"#;

pub const CULTURAL_SYSTEM: &str = "Assess cultural fit based on work style, collaboration indicators and soft skills. \
    Look for leadership, teamwork, communication, adaptability and problem-solving.";

pub const CULTURAL_PROMPT_TEMPLATE: &str = r#"Evaluate cultural fit and soft skills.

**Job Context:**
{job_summary}

**Candidate's Profile:**
Summary: {candidate_summary}
Achievements: {achievements}

{response_shape}"#;

pub const GROWTH_SYSTEM: &str = "Assess the candidate's growth potential and career trajectory. \
    Consider career progression, learning agility, skill development and role transitions.";

pub const GROWTH_PROMPT_TEMPLATE: &str = r#"Evaluate growth potential.

**Candidate's Career Progression:**
{experience}

**Certifications & Recent Learning:**
{certifications}

{response_shape}"#;

// ────────────────────────────────────────────────────────────────────────────
// Skill analysis
// ────────────────────────────────────────────────────────────────────────────

pub const SKILLS_SYSTEM: &str = r#"You are an expert technical recruiter analyzing candidate skills.
Match candidate skills against job requirements, considering semantic similarity,
related technologies and skill equivalence.

Return a JSON object with this structure:
{
  "matched_skills": [
    {
      "skill": "Required skill from JD",
      "match_type": "exact|similar|related",
      "relevance_score": 0.0-1.0,
      "explanation": "Brief explanation of the match"
    }
  ],
  "missing_critical": ["Critical required skills not found in resume"]
}

Match types:
- exact: direct match (e.g. "Python" matches "Python")
- similar: very close match (e.g. "PyTorch" for "TensorFlow")
- related: related but not equivalent (e.g. "Keras" for "Deep Learning frameworks")

Only include matches with relevance_score >= 0.6. Be strict but fair."#;

pub const SKILLS_PROMPT_TEMPLATE: &str = r#"Analyze skill matching between candidate and job requirements.

**Candidate Skills:**
{candidate_skills}

**Job Required Skills:**
{required_skills}

**Job Preferred Skills:**
{preferred_skills}

Consider direct technology matches, framework equivalents, skill categories
and experience descriptions that imply skills.

Return JSON only, no additional text."#;

// ────────────────────────────────────────────────────────────────────────────
// Overall reasoning
// ────────────────────────────────────────────────────────────────────────────

pub const REASONING_SYSTEM: &str = "Synthesize an overall hiring recommendation. \
    Be specific, balanced, and actionable. Write 2-3 paragraphs.";

pub const REASONING_PROMPT_TEMPLATE: &str = r#"Generate overall matching analysis.

**Job:** {job_title}

**Dimensional Scores:**
{scores_summary}

**Skills Match:**
- Matched: {matched_count} required skills
- Missing: {missing_count} required skills

Provide a concise overall assessment (2-3 paragraphs) explaining whether this candidate should be considered and why."#;
