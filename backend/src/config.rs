use serde::{Deserialize, Serialize};
use shared::constants;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "FIRE_CLASSIFIER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/classifier.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: usize,
    pub allowed_extensions: Vec<String>,
    /// Check magic bytes in addition to the extension.
    pub sniff_content: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(constants::UPLOAD_DIR),
            max_bytes: constants::MAX_FILE_SIZE_BYTES,
            allowed_extensions: constants::ALLOWED_IMAGE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            sniff_content: false,
        }
    }
}

impl UploadConfig {
    pub fn extension_set(&self) -> BTreeSet<String> {
        self.allowed_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub architecture: String,
    pub weights: String,
    pub framework: String,
    pub class_names: Vec<String>,
    pub image_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::MODEL_WEIGHTS),
            architecture: constants::MODEL_ARCHITECTURE.to_string(),
            weights: constants::MODEL_WEIGHTS.to_string(),
            framework: constants::MODEL_FRAMEWORK.to_string(),
            class_names: constants::CLASS_NAMES.iter().map(|c| c.to_string()).collect(),
            image_size: constants::TARGET_IMAGE_SIZE,
            mean: constants::NORMALIZE_MEAN,
            std: constants::NORMALIZE_STD,
        }
    }
}

impl ModelConfig {
    pub fn model_info(&self) -> shared::ModelInfo {
        shared::ModelInfo {
            architecture: self.architecture.clone(),
            weights: self.weights.clone(),
            framework: self.framework.clone(),
        }
    }
}

impl AppConfig {
    /// Reads the YAML file named by `FIRE_CLASSIFIER_CONFIG` (or the default path), then
    /// applies environment overrides. A missing default file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok();
        let path = PathBuf::from(explicit.as_deref().unwrap_or(DEFAULT_CONFIG_PATH));

        let mut config = if path.exists() || explicit.is_some() {
            log::info!("Loading configuration from {}", path.display());
            Self::from_file(&path)?
        } else {
            log::info!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        if config_str.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(config_str)?)
    }

    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key: "PORT", value: port })?;
        }
        if let Some(dir) = var("UPLOAD_DIR") {
            self.upload.dir = PathBuf::from(dir);
        }
        if let Some(model_path) = var("MODEL_PATH") {
            self.model.path = PathBuf::from(model_path);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload.max_bytes == 0 {
            return Err(ConfigError::Invalid("upload.max_bytes must be positive".into()));
        }
        if self.upload.extension_set().is_empty() {
            return Err(ConfigError::Invalid(
                "upload.allowed_extensions must not be empty".into(),
            ));
        }
        if self.model.class_names != constants::CLASS_NAMES {
            return Err(ConfigError::Invalid(format!(
                "model.class_names must be {:?}, got {:?}",
                constants::CLASS_NAMES,
                self.model.class_names
            )));
        }
        if self.model.image_size == 0 {
            return Err(ConfigError::Invalid("model.image_size must be positive".into()));
        }
        if self.model.std.iter().any(|s| *s <= 0.0) {
            return Err(ConfigError::Invalid("model.std entries must be positive".into()));
        }
        Ok(())
    }
}
