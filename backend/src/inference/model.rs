use crate::inference::preprocess::image_to_tensor;
use crate::pipeline::stage::StageSpec;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use tch::{CModule, Device};

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Model error: {0}")]
    Model(#[from] tch::TchError),
}

/// Raw output of one classifier invocation. Probabilities are softmaxed
/// and keyed by label, summing to roughly one.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub predicted_index: usize,
    pub predicted_label: String,
    pub confidence: f32,
    pub class_probabilities: BTreeMap<String, f32>,
}

impl Prediction {
    pub fn from_probabilities(labels: &[String], probs: &[f32]) -> Self {
        let predicted_index = probs
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        let predicted_label = labels
            .get(predicted_index)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", predicted_index));
        let confidence = probs.get(predicted_index).copied().unwrap_or(0.0);

        let class_probabilities = probs
            .iter()
            .enumerate()
            .map(|(idx, p)| {
                let label = labels
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| format!("class_{}", idx));
                (label, *p)
            })
            .collect();

        Self {
            predicted_index,
            predicted_label,
            confidence,
            class_probabilities,
        }
    }

    pub fn probability_of(&self, label: &str) -> Option<f32> {
        self.class_probabilities.get(label).copied()
    }

    /// The positive call uses the designated class probability against the
    /// threshold, independent of which class is argmax.
    pub fn is_positive(&self, positive_label: &str, threshold: f32) -> bool {
        self.probability_of(positive_label)
            .map(|p| p >= threshold)
            .unwrap_or(false)
    }
}

/// One trained model as an opaque capability.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &[u8]) -> Result<Prediction, InferenceError>;
}

/// TorchScript-backed classifier. The module is loaded once and guarded by
/// a mutex since `CModule` is not sync.
pub struct TorchClassifier {
    module: Mutex<CModule>,
    labels: Vec<String>,
    image_size: u32,
}

impl TorchClassifier {
    pub fn load(path: &Path, spec: &StageSpec, image_size: u32) -> Result<Self, InferenceError> {
        let device = Device::cuda_if_available();
        let module = CModule::load_on_device(path, device)?;
        Ok(Self {
            module: Mutex::new(module),
            labels: spec.labels.iter().map(|l| l.to_string()).collect(),
            image_size,
        })
    }
}

impl Classifier for TorchClassifier {
    fn classify(&self, image: &[u8]) -> Result<Prediction, InferenceError> {
        let tensor = image_to_tensor(image, self.image_size)?;
        let output = self.module.lock().unwrap().forward_ts(&[tensor])?;
        let output = output.softmax(-1, tch::Kind::Float);
        let output_flat = output.to_kind(tch::Kind::Float).view([-1]);
        let num_elements = output_flat.size()[0] as usize;
        let mut probs = vec![0.0f32; num_elements];
        output_flat.copy_data(&mut probs, num_elements);
        Ok(Prediction::from_probabilities(&self.labels, &probs))
    }
}
