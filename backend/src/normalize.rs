use crate::classifier::RawPrediction;
use shared::constants::PROBABILITY_DIGITS;
use shared::{ClassifyResponse, FireClass, ModelInfo, Probabilities};
use std::str::FromStr;

/// Softmax output sums to 1 within ~1e-6; this bound keeps the rounded pair within 0.001.
const SUM_TOLERANCE: f64 = 1e-4;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum NormalizeError {
    #[error("unknown label {0:?}")]
    UnknownLabel(String),
    #[error("unknown class {0:?} in scores")]
    UnknownClass(String),
    #[error("class {0} scored more than once")]
    DuplicateClass(FireClass),
    #[error("no score for class {0}")]
    MissingClass(FireClass),
    #[error("score {1} for class {0} is not a probability")]
    InvalidProbability(FireClass, f32),
    #[error("probabilities sum to {0}")]
    BadSum(f64),
}

/// Turns raw model output into the response payload.
#[derive(Debug, Clone)]
pub struct ResultNormalizer {
    model_info: ModelInfo,
}

impl ResultNormalizer {
    pub fn new(model_info: ModelInfo) -> Self {
        Self { model_info }
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.model_info
    }

    pub fn normalize(&self, prediction: &RawPrediction) -> Result<ClassifyResponse, NormalizeError> {
        let label = FireClass::from_str(&prediction.label)
            .map_err(|_| NormalizeError::UnknownLabel(prediction.label.clone()))?;

        let mut probs: [Option<f64>; 2] = [None, None];
        for score in &prediction.scores {
            let class = FireClass::from_str(&score.class)
                .map_err(|_| NormalizeError::UnknownClass(score.class.clone()))?;
            if !score.probability.is_finite() || !(0.0..=1.0).contains(&score.probability) {
                return Err(NormalizeError::InvalidProbability(class, score.probability));
            }
            let slot = &mut probs[class.index()];
            if slot.is_some() {
                return Err(NormalizeError::DuplicateClass(class));
            }
            *slot = Some(score.probability as f64);
        }

        let fire = probs[FireClass::Fire.index()].ok_or(NormalizeError::MissingClass(FireClass::Fire))?;
        let no_fire =
            probs[FireClass::NoFire.index()].ok_or(NormalizeError::MissingClass(FireClass::NoFire))?;

        let sum = fire + no_fire;
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(NormalizeError::BadSum(sum));
        }

        let argmax = if fire >= no_fire {
            FireClass::Fire
        } else {
            FireClass::NoFire
        };
        if argmax != label && fire != no_fire {
            log::warn!(
                "Model label {} disagrees with highest probability class {}",
                label,
                argmax
            );
        }

        Ok(ClassifyResponse {
            classification: label,
            confidence: round_digits(fire.max(no_fire)),
            message: format!("Image classified as: {}", label),
            raw_prediction: prediction.label.clone(),
            probabilities: Probabilities {
                fire: round_digits(fire),
                no_fire: round_digits(no_fire),
            },
            model_info: self.model_info.clone(),
        })
    }
}

fn round_digits(value: f64) -> f64 {
    let scale = 10f64.powi(PROBABILITY_DIGITS);
    (value * scale).round() / scale
}
