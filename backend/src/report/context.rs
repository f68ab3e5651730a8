use crate::pipeline::analysis::{DamageState, TechnicalAnalysis};
use std::fmt::Write;

pub fn confidence_tier(confidence: f32) -> &'static str {
    if confidence > 0.95 {
        "CRITICALLY HIGH"
    } else if confidence > 0.8 {
        "HIGH"
    } else if confidence > 0.6 {
        "MODERATE"
    } else {
        "LOW"
    }
}

// Ordered so that the more specific token wins ("doorouter" before "door").
const PART_NAMES: &[(&str, &str)] = &[
    ("doorouter", "Outer door panel"),
    ("door", "Door"),
    ("bumper", "Bumper"),
    ("hood", "Hood"),
    ("trunk", "Trunk"),
    ("fender", "Fender"),
    ("headlight", "Headlight"),
    ("taillight", "Tail light"),
    ("sidemirror", "Side mirror"),
    ("mirror", "Side mirror"),
    ("wheel", "Wheel"),
    ("windshield", "Windshield"),
];

const DAMAGE_KINDS: &[(&str, &str)] = &[
    ("dent", "dent"),
    ("scratch", "scratch"),
    ("rust", "rust"),
    ("crack", "crack"),
    ("broken", "breakage"),
    ("damage", "general damage"),
];

/// Split a localization label like `doorouter-dent` into a readable part
/// name and damage kind.
pub fn parse_part_label(label: &str) -> (&'static str, &'static str) {
    let label = label.to_lowercase();
    let part = PART_NAMES
        .iter()
        .find(|(token, _)| label.contains(token))
        .map(|(_, name)| *name)
        .unwrap_or("Unidentified part");
    let kind = DAMAGE_KINDS
        .iter()
        .find(|(token, _)| label.contains(token))
        .map(|(_, name)| *name)
        .unwrap_or("general damage");
    (part, kind)
}

/// Render the analysis into the text context handed to the narrative
/// service and scanned by the fallback templates.
pub fn build_context(analysis: &TechnicalAnalysis) -> String {
    let mut context = String::new();

    let status = match analysis.damage_state {
        DamageState::Damaged => "DAMAGE DETECTED",
        DamageState::Intact => "VEHICLE INTACT",
        DamageState::Unknown => "UNDETERMINED",
    };
    let _ = writeln!(context, "VEHICLE CONDITION ANALYSIS\n");
    let _ = writeln!(context, "=== OVERALL STATUS ===");
    let _ = writeln!(context, "Damage status: {}", status);
    let _ = writeln!(context, "Analysis source: {}\n", analysis.damage_source);

    if let Some(prediction) = analysis.damage.as_ref().and_then(|r| r.prediction()) {
        let damage_prob = prediction.probability_of("damaged").unwrap_or(0.0);
        let _ = writeln!(context, "=== DAMAGE DETECTION ===");
        let _ = writeln!(context, "Damage confidence: {:.1}%", damage_prob * 100.0);
        let _ = writeln!(context, "Prediction index: {}", prediction.predicted_index);
        let _ = writeln!(
            context,
            "Class probabilities: {:?}\n",
            prediction.class_probabilities
        );
    }

    if let Some(prediction) = analysis.damage_parts.as_ref().and_then(|r| r.prediction()) {
        let (part, kind) = parse_part_label(&prediction.predicted_label);
        let _ = writeln!(context, "=== DAMAGE LOCALIZATION ===");
        let _ = writeln!(context, "Damaged part: {}", part);
        let _ = writeln!(context, "Damage kind: {}", kind);
        let _ = writeln!(context, "Predicted label: {}", prediction.predicted_label);
        let _ = writeln!(context, "Confidence: {:.1}%\n", prediction.confidence * 100.0);
    }

    if let Some(prediction) = analysis.damage_type.as_ref().and_then(|r| r.prediction()) {
        let _ = writeln!(context, "=== DAMAGE TYPE CLASSIFICATION ===");
        let _ = writeln!(context, "Damage type: {}", prediction.predicted_label);
        let _ = writeln!(context, "Confidence: {:.1}%\n", prediction.confidence * 100.0);
    }

    if let Some(prediction) = analysis.cleanliness.as_ref().and_then(|r| r.prediction()) {
        let clean = prediction.probability_of("clean").unwrap_or(0.0);
        let dirty = prediction.probability_of("dirty").unwrap_or(0.0);
        let _ = writeln!(context, "=== CLEANLINESS ===");
        let _ = writeln!(context, "Clean probability: {:.1}%", clean * 100.0);
        let _ = writeln!(context, "Dirty probability: {:.1}%", dirty * 100.0);
        let _ = writeln!(
            context,
            "Status: {}\n",
            if dirty > clean { "DIRTY" } else { "CLEAN" }
        );
    }

    let _ = writeln!(context, "=== MODEL CONFIDENCE INTERPRETATION ===");
    if let Some(prediction) = analysis.damage.as_ref().and_then(|r| r.prediction()) {
        let damage_prob = prediction.probability_of("damaged").unwrap_or(0.0);
        let _ = writeln!(
            context,
            "{} confidence in damage ({:.1}%)",
            confidence_tier(damage_prob),
            damage_prob * 100.0
        );
    }
    if let Some(prediction) = analysis.damage_parts.as_ref().and_then(|r| r.prediction()) {
        let _ = writeln!(
            context,
            "Damage localization: {:.1}% confidence",
            prediction.confidence * 100.0
        );
    }
    if let Some(prediction) = analysis.damage_type.as_ref().and_then(|r| r.prediction()) {
        let _ = writeln!(
            context,
            "Damage type classification: {:.1}% confidence",
            prediction.confidence * 100.0
        );
    }

    context
}
