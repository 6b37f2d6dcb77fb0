use super::preprocess::Preprocessor;
use super::{Classifier, InferenceError, RawPrediction};
use crate::config::ModelConfig;
use std::path::Path;
use std::sync::Mutex;
use tch::{CModule, Device, Kind, Tensor};

/// TorchScript image classifier. The module is loaded once and calls into it are
/// serialized behind a mutex.
pub struct TorchClassifier {
    model: Mutex<CModule>,
    device: Device,
    preprocessor: Preprocessor,
    class_names: Vec<String>,
}

impl TorchClassifier {
    pub fn load(config: &ModelConfig) -> Result<Self, InferenceError> {
        let device = Device::cuda_if_available();
        log::info!(
            "Loading {} weights from {} on {:?}",
            config.architecture,
            config.path.display(),
            device
        );
        let mut model = CModule::load_on_device(&config.path, device)
            .map_err(|e| InferenceError::Model(e.to_string()))?;
        model.set_eval();
        log::info!("Model configured for classes: {:?}", config.class_names);

        Ok(Self {
            model: Mutex::new(model),
            device,
            preprocessor: Preprocessor::new(config),
            class_names: config.class_names.clone(),
        })
    }

    fn forward(&self, input: &Tensor) -> Result<Vec<f32>, InferenceError> {
        let model = self
            .model
            .lock()
            .map_err(|_| InferenceError::Model("model lock poisoned".into()))?;
        let output = tch::no_grad(|| model.forward_ts(&[input]))
            .map_err(|e| InferenceError::Model(e.to_string()))?;

        let output = output
            .softmax(-1, Kind::Float)
            .to_device(Device::Cpu)
            .view([-1]);
        let num_elements = output.size()[0] as usize;
        let mut output_vec = vec![0.0f32; num_elements];
        output.copy_data(&mut output_vec, num_elements);
        Ok(output_vec)
    }
}

impl Classifier for TorchClassifier {
    fn predict(&self, image_path: &Path) -> Result<RawPrediction, InferenceError> {
        log::debug!("Starting inference on image: {}", image_path.display());
        let prepared = self.preprocessor.load(image_path)?;
        let input = Tensor::from_slice(&prepared.data)
            .view(prepared.shape())
            .to_device(self.device);

        let probabilities = self.forward(&input)?;
        log::debug!("Prediction probabilities: {:?}", probabilities);
        RawPrediction::from_ordered(&self.class_names, &probabilities)
    }
}
