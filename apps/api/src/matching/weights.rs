use serde::Serialize;

use super::dimensions::Dimension;

/// Allowed drift of the weight sum away from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Per-dimension weights. Must sum to 1.0 within tolerance; checked at config load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoringWeights {
    pub technical_skills: f64,
    pub experience: f64,
    pub education: f64,
    pub cultural_fit: f64,
    pub growth_potential: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            technical_skills: 0.30,
            experience: 0.30,
            education: 0.15,
            cultural_fit: 0.15,
            growth_potential: 0.10,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WeightsError {
    #[error("weight for {dimension} must be between 0 and 1, got {value}")]
    OutOfRange { dimension: &'static str, value: f64 },

    #[error("weights must sum to 1.0 (±{WEIGHT_SUM_TOLERANCE}), got {0:.4}")]
    BadSum(f64),
}

impl ScoringWeights {
    pub fn for_dimension(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::TechnicalSkills => self.technical_skills,
            Dimension::Experience => self.experience,
            Dimension::Education => self.education,
            Dimension::CulturalFit => self.cultural_fit,
            Dimension::GrowthPotential => self.growth_potential,
        }
    }

    pub fn sum(&self) -> f64 {
        Dimension::ALL.iter().map(|d| self.for_dimension(*d)).sum()
    }

    pub fn validate(&self) -> Result<(), WeightsError> {
        for dimension in Dimension::ALL {
            let value = self.for_dimension(dimension);
            if !(0.0..=1.0).contains(&value) {
                return Err(WeightsError::OutOfRange {
                    dimension: dimension.key(),
                    value,
                });
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(WeightsError::BadSum(sum));
        }
        Ok(())
    }
}
