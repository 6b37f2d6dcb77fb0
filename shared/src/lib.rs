pub mod constants;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
pub enum FireClass {
    #[serde(rename = "fire")]
    #[strum(serialize = "fire")]
    Fire,
    #[serde(rename = "no fire")]
    #[strum(serialize = "no fire")]
    NoFire,
}

impl FireClass {
    /// Position of the class in the model output.
    pub fn index(self) -> usize {
        match self {
            FireClass::Fire => 0,
            FireClass::NoFire => 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Probabilities {
    pub fire: f64,
    pub no_fire: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModelInfo {
    pub architecture: String,
    pub weights: String,
    pub framework: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClassifyResponse {
    pub classification: FireClass,
    pub confidence: f64,
    pub message: String,
    pub raw_prediction: String,
    pub probabilities: Probabilities,
    pub model_info: ModelInfo,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
    pub version: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Endpoints {
    pub classify: String,
    pub health: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthResponse {
    pub status: String,
    pub endpoints: Endpoints,
    pub model_status: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}
