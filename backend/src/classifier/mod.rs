#[cfg_attr(not(feature = "torch"), allow(dead_code))]
pub mod preprocess;
#[cfg(feature = "torch")]
pub mod torch;

use std::path::Path;

#[allow(dead_code)]
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Preprocessing error: {0}")]
    Preprocessing(#[from] preprocess::PreprocessError),
    #[error("Model error: {0}")]
    Model(String),
    #[error("Unexpected model output: {0}")]
    Output(String),
}

/// Probability assigned to one named class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassScore {
    pub class: String,
    pub probability: f32,
}

/// Raw model output: the predicted label and one labeled score per class.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    pub label: String,
    pub scores: Vec<ClassScore>,
}

impl RawPrediction {
    /// Labels `probabilities[i]` with `class_names[i]` and takes the argmax as the label.
    pub fn from_ordered(
        class_names: &[String],
        probabilities: &[f32],
    ) -> Result<Self, InferenceError> {
        if class_names.len() != probabilities.len() {
            return Err(InferenceError::Output(format!(
                "expected {} probabilities, got {}",
                class_names.len(),
                probabilities.len()
            )));
        }

        let (best, _) = probabilities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .ok_or_else(|| InferenceError::Output("empty probability vector".into()))?;

        let scores = class_names
            .iter()
            .zip(probabilities)
            .map(|(class, p)| ClassScore {
                class: class.clone(),
                probability: *p,
            })
            .collect();

        Ok(Self {
            label: class_names[best].clone(),
            scores,
        })
    }
}

/// The boundary to the image model. Implementations are built once at startup and shared
/// read-only across requests, so `predict` must be callable concurrently.
pub trait Classifier: Send + Sync {
    fn predict(&self, image_path: &Path) -> Result<RawPrediction, InferenceError>;
}
