use crate::pipeline::analysis::{DamageState, TechnicalAnalysis};

const BASE_DAMAGE_PENALTY: i32 = 40;
const RUST_PENALTY: i32 = 15;
const DENT_PENALTY: i32 = 10;
const SCRATCH_PENALTY: i32 = 5;
const CLEANLINESS_WEIGHT: f64 = 20.0;

/// Deterministic condition score in [0, 100], derived solely from the
/// analysis. Recomputed on every request, never cached.
pub fn condition_score(analysis: &TechnicalAnalysis) -> u8 {
    let mut score: i32 = 100;

    match analysis.damage_state {
        DamageState::Damaged => {
            score -= BASE_DAMAGE_PENALTY;
            score -= damage_type_penalty(analysis);
        }
        DamageState::Intact | DamageState::Unknown => {
            score -= cleanliness_penalty(analysis);
        }
    }

    score.clamp(0, 100) as u8
}

fn damage_type_penalty(analysis: &TechnicalAnalysis) -> i32 {
    let Some(prediction) = analysis.damage_type.as_ref().and_then(|r| r.prediction()) else {
        return 0;
    };
    let label = prediction.predicted_label.to_lowercase();
    if label.contains("rust") {
        RUST_PENALTY
    } else if label.contains("dent") {
        DENT_PENALTY
    } else if label.contains("scratch") {
        SCRATCH_PENALTY
    } else {
        0
    }
}

fn cleanliness_penalty(analysis: &TechnicalAnalysis) -> i32 {
    let Some(prediction) = analysis.cleanliness.as_ref().and_then(|r| r.prediction()) else {
        return 0;
    };
    let dirty = prediction.probability_of("dirty").unwrap_or(0.0);
    let clean = prediction.probability_of("clean").unwrap_or(0.0);
    if dirty > clean {
        (CLEANLINESS_WEIGHT * dirty as f64).floor() as i32
    } else {
        0
    }
}
