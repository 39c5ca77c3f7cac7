use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::llm_client::backoff_delay;
use crate::matching::weights::ScoringWeights;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or any value is out of range.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub matching: MatchSettings,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
    /// USD per 1k input tokens
    pub cost_per_1k_input: f64,
    /// USD per 1k output tokens
    pub cost_per_1k_output: f64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 3,
            cost_per_1k_input: 0.003,
            cost_per_1k_output: 0.015,
        }
    }
}

impl LlmSettings {
    /// Longest a single logical call can take: every attempt timing out plus the
    /// backoff between attempts.
    pub fn call_budget(&self) -> Duration {
        let backoff: Duration = (1..self.max_retries).map(backoff_delay).sum();
        self.timeout.saturating_mul(self.max_retries) + backoff
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub model: String,
    pub cache_dir: PathBuf,
}

/// Knobs of the two-stage matching pipeline.
#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub semantic_threshold: f32,
    pub enable_semantic_filter: bool,
    /// Resumes matched concurrently in batch mode; 1 means sequential.
    pub batch_concurrency: usize,
    /// Outer deadline on every LLM call the pipeline makes, retries included.
    pub call_timeout: Duration,
    pub weights: ScoringWeights,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            semantic_threshold: 0.7,
            enable_semantic_filter: true,
            batch_concurrency: 1,
            call_timeout: LlmSettings::default().call_budget(),
            weights: ScoringWeights::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout_secs: u64 = parse_or(&lookup, "LLM_TIMEOUT_SECS", 60)?;
        if !(10..=300).contains(&timeout_secs) {
            bail!("LLM_TIMEOUT_SECS must be between 10 and 300, got {timeout_secs}");
        }
        let max_retries: u32 = parse_or(&lookup, "LLM_MAX_RETRIES", 3)?;
        if !(1..=10).contains(&max_retries) {
            bail!("LLM_MAX_RETRIES must be between 1 and 10, got {max_retries}");
        }
        let timeout = Duration::from_secs(timeout_secs);

        let llm = LlmSettings {
            model: lookup("LLM_MODEL").unwrap_or_else(|| LlmSettings::default().model),
            timeout,
            max_retries,
            cost_per_1k_input: parse_or(&lookup, "LLM_COST_PER_1K_INPUT", 0.003)?,
            cost_per_1k_output: parse_or(&lookup, "LLM_COST_PER_1K_OUTPUT", 0.015)?,
        };
        if llm.cost_per_1k_input < 0.0 || llm.cost_per_1k_output < 0.0 {
            bail!("LLM token prices cannot be negative");
        }

        let embedding = EmbeddingSettings {
            model: lookup("EMBEDDING_MODEL").unwrap_or_else(|| "all-MiniLM-L6-v2".to_string()),
            cache_dir: PathBuf::from(
                lookup("EMBEDDING_CACHE_DIR").unwrap_or_else(|| "./data".to_string()),
            ),
        };

        let semantic_threshold: f32 = parse_or(&lookup, "SEMANTIC_THRESHOLD", 0.7)?;
        if !(0.0..=1.0).contains(&semantic_threshold) {
            bail!("SEMANTIC_THRESHOLD must be between 0 and 1, got {semantic_threshold}");
        }
        let batch_concurrency: usize = parse_or(&lookup, "BATCH_CONCURRENCY", 1)?;
        if !(1..=16).contains(&batch_concurrency) {
            bail!("BATCH_CONCURRENCY must be between 1 and 16, got {batch_concurrency}");
        }

        let defaults = ScoringWeights::default();
        let weights = ScoringWeights {
            technical_skills: parse_or(&lookup, "WEIGHT_TECHNICAL_SKILLS", defaults.technical_skills)?,
            experience: parse_or(&lookup, "WEIGHT_EXPERIENCE", defaults.experience)?,
            education: parse_or(&lookup, "WEIGHT_EDUCATION", defaults.education)?,
            cultural_fit: parse_or(&lookup, "WEIGHT_CULTURAL_FIT", defaults.cultural_fit)?,
            growth_potential: parse_or(&lookup, "WEIGHT_GROWTH_POTENTIAL", defaults.growth_potential)?,
        };
        weights.validate().context("Invalid scoring weights")?;

        let matching = MatchSettings {
            semantic_threshold,
            enable_semantic_filter: parse_or(&lookup, "ENABLE_SEMANTIC_FILTER", true)?,
            batch_concurrency,
            call_timeout: llm.call_budget(),
            weights,
        };

        Ok(Config {
            database_url: require_var(&lookup, "DATABASE_URL")?,
            anthropic_api_key: require_var(&lookup, "ANTHROPIC_API_KEY")?,
            port: parse_or(&lookup, "PORT", 8080u16).context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            llm,
            embedding,
            matching,
        })
    }
}

fn require_var<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .to_lowercase()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let mut vars: HashMap<String, String> = HashMap::from([
            ("DATABASE_URL".to_string(), "postgres://localhost/screener".to_string()),
            ("ANTHROPIC_API_KEY".to_string(), "sk-test".to_string()),
        ]);
        for (k, v) in pairs {
            vars.insert(k.to_string(), v.to_string());
        }
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_applied() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.llm.max_retries, 3);
        assert_eq!(config.llm.timeout, Duration::from_secs(60));
        assert_eq!(config.embedding.model, "all-MiniLM-L6-v2");
        assert!((config.matching.semantic_threshold - 0.7).abs() < f32::EPSILON);
        assert!(config.matching.enable_semantic_filter);
        assert_eq!(config.matching.batch_concurrency, 1);
        assert_eq!(config.matching.call_timeout, config.llm.call_budget());
    }

    #[test]
    fn test_call_budget_leaves_room_for_retries() {
        let config = load(&[("LLM_TIMEOUT_SECS", "30"), ("LLM_MAX_RETRIES", "3")]).unwrap();
        // Three 30s attempts plus 2s and 4s of backoff.
        assert_eq!(config.llm.call_budget(), Duration::from_secs(96));
        assert!(config.matching.call_timeout > config.llm.timeout);

        let single = load(&[("LLM_MAX_RETRIES", "1")]).unwrap();
        assert_eq!(single.matching.call_timeout, single.llm.timeout);
    }

    #[test]
    fn test_missing_api_key_fails() {
        let err = Config::from_vars(|key| {
            (key == "DATABASE_URL").then(|| "postgres://localhost/screener".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let err = load(&[("WEIGHT_TECHNICAL_SKILLS", "0.50")]).unwrap_err();
        assert!(format!("{err:#}").contains("sum"));
    }

    #[test]
    fn test_weights_within_tolerance_accepted() {
        let config = load(&[
            ("WEIGHT_TECHNICAL_SKILLS", "0.305"),
            ("WEIGHT_EXPERIENCE", "0.30"),
        ])
        .unwrap();
        assert!((config.matching.weights.technical_skills - 0.305).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        assert!(load(&[("SEMANTIC_THRESHOLD", "1.5")]).is_err());
        assert!(load(&[("LLM_TIMEOUT_SECS", "5")]).is_err());
        assert!(load(&[("LLM_MAX_RETRIES", "0")]).is_err());
        assert!(load(&[("BATCH_CONCURRENCY", "64")]).is_err());
        assert!(load(&[("PORT", "not-a-port")]).is_err());
    }

    #[test]
    fn test_semantic_filter_toggle_parses_case_insensitively() {
        let config = load(&[("ENABLE_SEMANTIC_FILTER", "FALSE")]).unwrap();
        assert!(!config.matching.enable_semantic_filter);
    }
}
