use crate::inference::model::{Classifier, TorchClassifier};
use crate::pipeline::stage::{StageKind, STAGES};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Local checkpoint not found.")]
    CheckpointMissing { expected: PathBuf },
    #[error("Checkpoint failed to load: {0}")]
    LoadFailed(String),
}

/// Read-mostly cache of loaded classifiers, keyed by stage. Each checkpoint
/// is loaded at most once; checkpoints trained after startup are picked up
/// on first use.
pub struct ClassifierRegistry {
    models_dir: PathBuf,
    image_size: u32,
    loaded: RwLock<HashMap<StageKind, Arc<dyn Classifier>>>,
}

impl ClassifierRegistry {
    pub fn new(models_dir: impl Into<PathBuf>, image_size: u32) -> Self {
        Self {
            models_dir: models_dir.into(),
            image_size,
            loaded: RwLock::new(HashMap::new()),
        }
    }

    pub fn checkpoint_path(&self, kind: StageKind) -> PathBuf {
        self.models_dir.join(kind.spec().checkpoint)
    }

    /// Inject a ready classifier, bypassing checkpoint loading.
    pub fn register(&self, kind: StageKind, classifier: Arc<dyn Classifier>) {
        self.loaded.write().unwrap().insert(kind, classifier);
    }

    /// Eagerly load every checkpoint present on disk.
    pub fn preload(&self) {
        for spec in STAGES {
            match self.get_or_load(spec.kind) {
                Ok(_) => {}
                Err(RegistryError::CheckpointMissing { expected }) => {
                    debug!(
                        "No checkpoint for stage {} at {}",
                        spec.name,
                        expected.display()
                    );
                }
                Err(e) => warn!("Stage {} failed to preload: {}", spec.name, e),
            }
        }
        let count = self.loaded.read().unwrap().len();
        info!("Classifier registry ready with {}/{} models", count, STAGES.len());
    }

    pub fn get_or_load(&self, kind: StageKind) -> Result<Arc<dyn Classifier>, RegistryError> {
        if let Some(classifier) = self.loaded.read().unwrap().get(&kind) {
            return Ok(classifier.clone());
        }

        let path = self.checkpoint_path(kind);
        if !path.exists() {
            return Err(RegistryError::CheckpointMissing { expected: path });
        }

        let mut guard = self.loaded.write().unwrap();
        if let Some(classifier) = guard.get(&kind) {
            return Ok(classifier.clone());
        }

        let classifier = TorchClassifier::load(&path, kind.spec(), self.image_size)
            .map_err(|e| RegistryError::LoadFailed(e.to_string()))?;
        let classifier: Arc<dyn Classifier> = Arc::new(classifier);
        guard.insert(kind, classifier.clone());
        info!(
            "Loaded {} checkpoint from {}",
            kind.spec().name,
            path.display()
        );
        Ok(classifier)
    }
}
