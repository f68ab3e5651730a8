use crate::config::PipelineConfig;
use crate::inference::registry::ClassifierRegistry;
use crate::pipeline::analysis::{DamageState, TechnicalAnalysis};
use crate::pipeline::stage::{StageKind, StageResult};
use futures::join;
use log::{debug, info};
use shared::DamageSource;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Conditional assessment pipeline. Never fails toward its caller: every
/// classifier problem is recorded as a `StageResult` variant.
#[derive(Clone)]
pub struct Pipeline {
    registry: Arc<ClassifierRegistry>,
    decision_threshold: f32,
    stage_timeout: Duration,
    request_timeout: Duration,
}

impl Pipeline {
    pub fn new(registry: Arc<ClassifierRegistry>, config: &PipelineConfig) -> Self {
        Self {
            registry,
            decision_threshold: config.decision_threshold,
            stage_timeout: Duration::from_millis(config.stage_timeout_ms),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }

    pub fn decision_threshold(&self) -> f32 {
        self.decision_threshold
    }

    /// Run the conditional pipeline: damage detection always, then either
    /// localization plus type classification (damaged) or cleanliness
    /// (intact). An undetermined damage state skips both branches.
    pub async fn run(&self, image: &[u8]) -> TechnicalAnalysis {
        let image = Arc::new(image.to_vec());
        let deadline = Instant::now() + self.request_timeout;
        let mut analysis = TechnicalAnalysis::new();

        let damage = self.invoke(StageKind::Damage, &image, deadline).await;
        analysis.damage_state = match damage.prediction() {
            Some(prediction) => {
                analysis.damage_source = DamageSource::Local;
                if prediction.is_positive("damaged", self.decision_threshold) {
                    DamageState::Damaged
                } else {
                    DamageState::Intact
                }
            }
            None => DamageState::Unknown,
        };
        analysis.set_slot(StageKind::Damage, damage);

        match analysis.damage_state {
            DamageState::Damaged => {
                let (parts, damage_type) = join!(
                    self.invoke(StageKind::DamageParts, &image, deadline),
                    self.invoke(StageKind::DamageType, &image, deadline)
                );
                analysis.set_slot(StageKind::DamageParts, parts);
                analysis.set_slot(StageKind::DamageType, damage_type);
            }
            DamageState::Intact => {
                let cleanliness = self.invoke(StageKind::Cleanliness, &image, deadline).await;
                analysis.set_slot(StageKind::Cleanliness, cleanliness);
            }
            DamageState::Unknown => {}
        }

        info!(
            "Pipeline run finished: damage state {:?}",
            analysis.damage_state
        );
        analysis
    }

    /// Run exactly one stage. Window and tire classifiers are exposed this
    /// way and never chained into the conditional pipeline.
    pub async fn run_standalone(&self, kind: StageKind, image: &[u8]) -> TechnicalAnalysis {
        let image = Arc::new(image.to_vec());
        let deadline = Instant::now() + self.request_timeout;
        let mut analysis = TechnicalAnalysis::new();
        let result = self.invoke(kind, &image, deadline).await;
        analysis.set_slot(kind, result);
        analysis
    }

    async fn invoke(
        &self,
        kind: StageKind,
        image: &Arc<Vec<u8>>,
        deadline: Instant,
    ) -> StageResult {
        let spec = kind.spec();
        let classifier = match self.registry.get_or_load(kind) {
            Ok(classifier) => classifier,
            Err(e) => {
                debug!("Stage {} unavailable: {}", spec.name, e);
                return StageResult::Unavailable {
                    reason: e.to_string(),
                    expected: self.registry.checkpoint_path(kind).display().to_string(),
                };
            }
        };

        let budget = self
            .stage_timeout
            .min(deadline.saturating_duration_since(Instant::now()));
        if budget.is_zero() {
            return StageResult::Failure {
                reason: "timeout".to_string(),
            };
        }

        let image = image.clone();
        let inference = tokio::task::spawn_blocking(move || classifier.classify(&image));
        match tokio::time::timeout(budget, inference).await {
            Err(_) => {
                debug!("Stage {} timed out after {:?}", spec.name, budget);
                StageResult::Failure {
                    reason: "timeout".to_string(),
                }
            }
            Ok(Err(join_error)) => StageResult::Failure {
                reason: format!("Inference task failed: {}", join_error),
            },
            Ok(Ok(Err(e))) => {
                debug!("Stage {} failed: {}", spec.name, e);
                StageResult::Failure {
                    reason: e.to_string(),
                }
            }
            Ok(Ok(Ok(prediction))) => StageResult::Success(prediction),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::model::{Classifier, InferenceError, Prediction};
    use std::collections::HashMap;

    pub struct FixedClassifier {
        labels: Vec<String>,
        probs: Vec<f32>,
    }

    impl FixedClassifier {
        pub fn new(labels: &[&str], probs: &[f32]) -> Arc<dyn Classifier> {
            Arc::new(Self {
                labels: labels.iter().map(|l| l.to_string()).collect(),
                probs: probs.to_vec(),
            })
        }
    }

    impl Classifier for FixedClassifier {
        fn classify(&self, _image: &[u8]) -> Result<Prediction, InferenceError> {
            Ok(Prediction::from_probabilities(&self.labels, &self.probs))
        }
    }

    struct BrokenClassifier;

    impl Classifier for BrokenClassifier {
        fn classify(&self, image: &[u8]) -> Result<Prediction, InferenceError> {
            image::load_from_memory(image)
                .map_err(InferenceError::from)
                .map(|_| unreachable!("decoding empty bytes must fail"))
        }
    }

    fn pipeline_with(classifiers: HashMap<StageKind, Arc<dyn Classifier>>) -> Pipeline {
        let registry = ClassifierRegistry::new("missing-models", 224);
        for (kind, classifier) in classifiers {
            registry.register(kind, classifier);
        }
        Pipeline::new(Arc::new(registry), &PipelineConfig::default())
    }

    fn damaged_setup() -> HashMap<StageKind, Arc<dyn Classifier>> {
        let mut classifiers: HashMap<StageKind, Arc<dyn Classifier>> = HashMap::new();
        classifiers.insert(
            StageKind::Damage,
            FixedClassifier::new(&["damaged", "intact"], &[0.97, 0.03]),
        );
        classifiers.insert(
            StageKind::DamageParts,
            FixedClassifier::new(&["bumper-dent", "doorouter-dent"], &[0.84, 0.16]),
        );
        classifiers.insert(
            StageKind::DamageType,
            FixedClassifier::new(&["dent", "rust", "scratch"], &[0.8, 0.1, 0.1]),
        );
        classifiers.insert(
            StageKind::Cleanliness,
            FixedClassifier::new(&["clean", "dirty"], &[0.3, 0.7]),
        );
        classifiers
    }

    #[tokio::test]
    async fn damaged_branch_runs_parts_and_type_but_not_cleanliness() {
        let pipeline = pipeline_with(damaged_setup());
        let analysis = pipeline.run(&[1, 2, 3]).await;

        assert_eq!(analysis.damage_state, DamageState::Damaged);
        assert_eq!(analysis.damage_source, DamageSource::Local);
        assert!(matches!(analysis.damage, Some(StageResult::Success(_))));
        assert!(matches!(
            analysis.damage_parts,
            Some(StageResult::Success(_))
        ));
        assert!(matches!(
            analysis.damage_type,
            Some(StageResult::Success(_))
        ));
        assert!(analysis.cleanliness.is_none());
        assert!(analysis.window_damage.is_none());
        assert!(analysis.tire_condition.is_none());
    }

    #[tokio::test]
    async fn intact_branch_runs_cleanliness_only() {
        let mut classifiers = damaged_setup();
        classifiers.insert(
            StageKind::Damage,
            FixedClassifier::new(&["damaged", "intact"], &[0.2, 0.8]),
        );
        let pipeline = pipeline_with(classifiers);
        let analysis = pipeline.run(&[1, 2, 3]).await;

        assert_eq!(analysis.damage_state, DamageState::Intact);
        assert!(matches!(
            analysis.cleanliness,
            Some(StageResult::Success(_))
        ));
        assert!(analysis.damage_parts.is_none());
        assert!(analysis.damage_type.is_none());
    }

    #[tokio::test]
    async fn missing_damage_checkpoint_leaves_state_unknown_and_skips_everything() {
        let pipeline = pipeline_with(HashMap::new());
        let analysis = pipeline.run(&[1, 2, 3]).await;

        assert_eq!(analysis.damage_state, DamageState::Unknown);
        assert_eq!(analysis.damage_source, DamageSource::None);
        match &analysis.damage {
            Some(StageResult::Unavailable { reason, expected }) => {
                assert_eq!(reason, "Local checkpoint not found.");
                assert!(expected.ends_with("damage_binary.pt"));
            }
            other => panic!("unexpected damage slot: {other:?}"),
        }
        assert!(analysis.damage_parts.is_none());
        assert!(analysis.damage_type.is_none());
        assert!(analysis.cleanliness.is_none());
    }

    #[tokio::test]
    async fn failing_damage_classifier_leaves_state_unknown() {
        let mut classifiers: HashMap<StageKind, Arc<dyn Classifier>> = HashMap::new();
        classifiers.insert(StageKind::Damage, Arc::new(BrokenClassifier));
        let pipeline = pipeline_with(classifiers);
        let analysis = pipeline.run(&[]).await;

        assert_eq!(analysis.damage_state, DamageState::Unknown);
        assert!(matches!(analysis.damage, Some(StageResult::Failure { .. })));
        assert!(analysis.damage_parts.is_none());
        assert!(analysis.cleanliness.is_none());
    }

    #[tokio::test]
    async fn intact_with_missing_cleanliness_checkpoint_records_unavailable() {
        let mut classifiers: HashMap<StageKind, Arc<dyn Classifier>> = HashMap::new();
        classifiers.insert(
            StageKind::Damage,
            FixedClassifier::new(&["damaged", "intact"], &[0.1, 0.9]),
        );
        let pipeline = pipeline_with(classifiers);
        let analysis = pipeline.run(&[1]).await;

        assert_eq!(analysis.damage_state, DamageState::Intact);
        assert!(matches!(
            analysis.cleanliness,
            Some(StageResult::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn identical_input_yields_identical_analysis() {
        let pipeline = pipeline_with(damaged_setup());
        let first = pipeline.run(&[9, 9, 9]).await;
        let second = pipeline.run(&[9, 9, 9]).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn standalone_stage_fills_only_its_slot() {
        let mut classifiers: HashMap<StageKind, Arc<dyn Classifier>> = HashMap::new();
        classifiers.insert(
            StageKind::TireCondition,
            FixedClassifier::new(&["flat-tire", "full-tire"], &[0.9, 0.1]),
        );
        let pipeline = pipeline_with(classifiers);
        let analysis = pipeline
            .run_standalone(StageKind::TireCondition, &[1, 2])
            .await;

        assert!(matches!(
            analysis.tire_condition,
            Some(StageResult::Success(_))
        ));
        assert!(analysis.damage.is_none());
        assert_eq!(analysis.damage_state, DamageState::Unknown);
    }

    #[tokio::test]
    async fn borderline_damage_probability_counts_as_intact() {
        // The damaged probability sits just below the decision threshold.
        let mut classifiers = damaged_setup();
        classifiers.insert(
            StageKind::Damage,
            FixedClassifier::new(&["damaged", "intact"], &[0.49, 0.51]),
        );
        let pipeline = pipeline_with(classifiers);
        let analysis = pipeline.run(&[5]).await;
        assert_eq!(analysis.damage_state, DamageState::Intact);
        assert!(analysis.cleanliness.is_some());
    }
}
