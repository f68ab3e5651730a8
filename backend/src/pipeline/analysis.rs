use crate::pipeline::stage::{StageKind, StageResult};
use shared::{AnalyzeResponse, DamageSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageState {
    Damaged,
    Intact,
    Unknown,
}

/// Aggregate record of one pipeline run. A `None` slot means the stage was
/// not applicable; `Unavailable`/`Failure` mean it ran but could not be
/// determined. Immutable once the orchestrator hands it out.
#[derive(Debug, Clone, PartialEq)]
pub struct TechnicalAnalysis {
    pub damage_state: DamageState,
    pub damage_source: DamageSource,
    pub damage: Option<StageResult>,
    pub damage_parts: Option<StageResult>,
    pub damage_type: Option<StageResult>,
    pub window_damage: Option<StageResult>,
    pub tire_condition: Option<StageResult>,
    pub cleanliness: Option<StageResult>,
}

impl TechnicalAnalysis {
    pub fn new() -> Self {
        Self {
            damage_state: DamageState::Unknown,
            damage_source: DamageSource::None,
            damage: None,
            damage_parts: None,
            damage_type: None,
            window_damage: None,
            tire_condition: None,
            cleanliness: None,
        }
    }

    pub fn is_damaged(&self) -> Option<bool> {
        match self.damage_state {
            DamageState::Damaged => Some(true),
            DamageState::Intact => Some(false),
            DamageState::Unknown => None,
        }
    }

    pub fn slot(&self, kind: StageKind) -> Option<&StageResult> {
        match kind {
            StageKind::Damage => self.damage.as_ref(),
            StageKind::DamageParts => self.damage_parts.as_ref(),
            StageKind::DamageType => self.damage_type.as_ref(),
            StageKind::DamagedWindows | StageKind::UnifiedWindows => self.window_damage.as_ref(),
            StageKind::TireCondition => self.tire_condition.as_ref(),
            StageKind::Cleanliness => self.cleanliness.as_ref(),
        }
    }

    pub fn set_slot(&mut self, kind: StageKind, result: StageResult) {
        match kind {
            StageKind::Damage => self.damage = Some(result),
            StageKind::DamageParts => self.damage_parts = Some(result),
            StageKind::DamageType => self.damage_type = Some(result),
            StageKind::DamagedWindows | StageKind::UnifiedWindows => {
                self.window_damage = Some(result)
            }
            StageKind::TireCondition => self.tire_condition = Some(result),
            StageKind::Cleanliness => self.cleanliness = Some(result),
        }
    }

    pub fn to_wire(&self, threshold: f32) -> AnalyzeResponse {
        AnalyzeResponse {
            is_damaged: self.is_damaged(),
            damage_source: self.damage_source,
            damage_local: self
                .damage
                .as_ref()
                .map(|r| r.to_wire(StageKind::Damage.spec(), threshold)),
            damage_parts_local: self
                .damage_parts
                .as_ref()
                .map(|r| r.to_wire(StageKind::DamageParts.spec(), threshold)),
            damage_type_local: self
                .damage_type
                .as_ref()
                .map(|r| r.to_wire(StageKind::DamageType.spec(), threshold)),
            dirty: self
                .cleanliness
                .as_ref()
                .map(|r| r.to_wire(StageKind::Cleanliness.spec(), threshold)),
        }
    }
}

impl Default for TechnicalAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::model::Prediction;

    fn success(labels: &[&str], probs: &[f32]) -> StageResult {
        let labels: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        StageResult::Success(Prediction::from_probabilities(&labels, probs))
    }

    #[test]
    fn both_window_stages_share_the_window_slot() {
        let mut analysis = TechnicalAnalysis::new();
        analysis.set_slot(
            StageKind::UnifiedWindows,
            success(&["damaged-window", "window"], &[0.7, 0.3]),
        );
        assert!(analysis.slot(StageKind::DamagedWindows).is_some());
        assert!(analysis.slot(StageKind::UnifiedWindows).is_some());
        assert!(analysis.slot(StageKind::Damage).is_none());
    }

    #[test]
    fn unknown_state_maps_to_null_is_damaged() {
        let analysis = TechnicalAnalysis::new();
        let wire = analysis.to_wire(0.5);
        assert_eq!(wire.is_damaged, None);
        assert_eq!(wire.damage_source, DamageSource::None);
        assert!(wire.damage_local.is_none());
        assert!(wire.dirty.is_none());
    }
}
