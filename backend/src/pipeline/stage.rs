use crate::inference::model::Prediction;
use shared::{StageOutcome, StagePrediction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Damage,
    DamageParts,
    DamageType,
    DamagedWindows,
    UnifiedWindows,
    TireCondition,
    Cleanliness,
}

/// Static description of one stage: its name, checkpoint file, label set
/// in model output order, and the designated positive class for stages
/// that make a binary call.
pub struct StageSpec {
    pub kind: StageKind,
    pub name: &'static str,
    pub checkpoint: &'static str,
    pub labels: &'static [&'static str],
    pub positive_label: Option<&'static str>,
}

pub const STAGES: &[StageSpec] = &[
    StageSpec {
        kind: StageKind::Damage,
        name: "damage",
        checkpoint: "damage_binary.pt",
        labels: &["damaged", "intact"],
        positive_label: Some("damaged"),
    },
    StageSpec {
        kind: StageKind::DamageParts,
        name: "damage_parts",
        checkpoint: "damage_parts.pt",
        labels: &[
            "bumper-dent",
            "bumper-scratch",
            "doorouter-dent",
            "doorouter-scratch",
            "fender-dent",
            "headlight-broken",
            "hood-dent",
            "sidemirror-damage",
            "taillight-broken",
            "windshield-crack",
        ],
        positive_label: None,
    },
    StageSpec {
        kind: StageKind::DamageType,
        name: "damage_type",
        checkpoint: "scratch_dent.pt",
        labels: &["dent", "rust", "scratch"],
        positive_label: None,
    },
    StageSpec {
        kind: StageKind::DamagedWindows,
        name: "damaged_windows",
        checkpoint: "damaged_windows.pt",
        labels: &[
            "damaged-rear-windshield",
            "damaged-side-window",
            "damaged-windshield",
        ],
        positive_label: None,
    },
    StageSpec {
        kind: StageKind::UnifiedWindows,
        name: "unified_windows",
        checkpoint: "unified_windows.pt",
        labels: &["damaged-window", "damaged-windshield", "window", "windshield"],
        positive_label: None,
    },
    StageSpec {
        kind: StageKind::TireCondition,
        name: "tire_classification",
        checkpoint: "tire_classification.pt",
        labels: &["flat-tire", "full-tire"],
        positive_label: Some("flat-tire"),
    },
    StageSpec {
        kind: StageKind::Cleanliness,
        name: "dirty",
        checkpoint: "dirty_binary.pt",
        labels: &["clean", "dirty"],
        positive_label: Some("dirty"),
    },
];

impl StageKind {
    pub fn spec(self) -> &'static StageSpec {
        STAGES
            .iter()
            .find(|spec| spec.kind == self)
            .expect("every stage kind has a spec")
    }
}

/// Outcome of one stage invocation. A failure never escalates past the
/// stage; the orchestrator records it and moves on.
#[derive(Debug, Clone, PartialEq)]
pub enum StageResult {
    Success(Prediction),
    Unavailable { reason: String, expected: String },
    Failure { reason: String },
}

impl StageResult {
    pub fn prediction(&self) -> Option<&Prediction> {
        match self {
            StageResult::Success(prediction) => Some(prediction),
            _ => None,
        }
    }

    pub fn to_wire(&self, spec: &StageSpec, threshold: f32) -> StageOutcome {
        match self {
            StageResult::Success(prediction) => StageOutcome::Success(StagePrediction {
                pred_idx: prediction.predicted_index,
                pred_label: prediction.predicted_label.clone(),
                pred_score: prediction.confidence,
                probs: prediction.class_probabilities.clone(),
                positive: spec
                    .positive_label
                    .map(|label| prediction.is_positive(label, threshold)),
            }),
            StageResult::Unavailable { reason, expected } => StageOutcome::Unavailable {
                error: reason.clone(),
                expected: expected.clone(),
            },
            StageResult::Failure { reason } => StageOutcome::Failure {
                error: reason.clone(),
            },
        }
    }
}
