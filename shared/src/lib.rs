use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::Display;

/// Wire shape of one classifier invocation. Serialized untagged so that a
/// successful prediction, a missing checkpoint and a runtime failure keep
/// the field layout clients already consume.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum StageOutcome {
    Success(StagePrediction),
    Unavailable { error: String, expected: String },
    Failure { error: String },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StagePrediction {
    pub pred_idx: usize,
    pub pred_label: String,
    pub pred_score: f32,
    pub probs: BTreeMap<String, f32>,
    /// Binary decision for stages with a designated positive class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positive: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DamageSource {
    Local,
    None,
}

/// Response body of `POST /analyze`. Field names are fixed for client
/// compatibility; `is_damaged` is null when the damage stage could not run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AnalyzeResponse {
    pub is_damaged: Option<bool>,
    pub damage_source: DamageSource,
    pub damage_local: Option<StageOutcome>,
    pub damage_parts_local: Option<StageOutcome>,
    pub damage_type_local: Option<StageOutcome>,
    pub dirty: Option<StageOutcome>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Stakeholder {
    Driver,
    Passenger,
    Platform,
}

/// One actionable item for a stakeholder. Parsing is strict: the narrative
/// service must produce exactly these fields or the whole list is rejected.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Recommendation {
    pub action: String,
    pub impact: String,
    pub priority: Priority,
    pub stakeholder: Stakeholder,
    pub timeline: String,
    pub cost_benefit: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StakeholderReports {
    pub driver: String,
    pub passenger: String,
    pub business: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputType {
    Structured,
    Raw,
}

impl Default for OutputType {
    fn default() -> Self {
        OutputType::Structured
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AnalysisMetadata {
    pub analysis_id: String,
    pub analysis_timestamp: String,
    pub model_version: String,
    pub output_type: OutputType,
    pub confidence_threshold: f32,
}

/// Response body of `POST /analyze-comprehensive`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ComprehensiveResponse {
    pub technical_analysis: AnalyzeResponse,
    pub condition_score: u8,
    pub reports: StakeholderReports,
    pub recommendations: Vec<Recommendation>,
    pub metadata: AnalysisMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_response_keeps_wire_field_names() {
        let response = AnalyzeResponse {
            is_damaged: Some(true),
            damage_source: DamageSource::Local,
            damage_local: None,
            damage_parts_local: None,
            damage_type_local: None,
            dirty: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["is_damaged"], serde_json::json!(true));
        assert_eq!(json["damage_source"], serde_json::json!("local"));
        let fields = json.as_object().unwrap();
        assert!(fields.contains_key("damage_local"));
        assert!(fields.contains_key("damage_parts_local"));
        assert!(fields.contains_key("dirty"));
    }

    #[test]
    fn unknown_damage_state_serializes_as_null() {
        let response = AnalyzeResponse {
            is_damaged: None,
            damage_source: DamageSource::None,
            damage_local: None,
            damage_parts_local: None,
            damage_type_local: None,
            dirty: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["is_damaged"], serde_json::Value::Null);
        assert_eq!(json["damage_source"], serde_json::json!("none"));
    }

    #[test]
    fn unavailable_outcome_has_error_and_expected() {
        let outcome = StageOutcome::Unavailable {
            error: "Local checkpoint not found.".into(),
            expected: "models/damage_binary.pt".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json["error"],
            serde_json::json!("Local checkpoint not found.")
        );
        assert_eq!(json["expected"], serde_json::json!("models/damage_binary.pt"));

        let parsed: StageOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, outcome);
    }

    #[test]
    fn recommendation_parse_is_strict() {
        let valid = r#"{
            "action": "Book a full wash",
            "impact": "Higher rating",
            "priority": "high",
            "stakeholder": "driver",
            "timeline": "within 24 hours",
            "cost_benefit": "small cost, quick payoff"
        }"#;
        assert!(serde_json::from_str::<Recommendation>(valid).is_ok());

        let with_unknown_field = valid.replace(
            "\"timeline\"",
            "\"severity\": \"major\",\n            \"timeline\"",
        );
        assert!(serde_json::from_str::<Recommendation>(&with_unknown_field).is_err());

        let bad_priority = valid.replace("\"high\"", "\"urgent\"");
        assert!(serde_json::from_str::<Recommendation>(&bad_priority).is_err());
    }

    #[test]
    fn priority_orders_most_urgent_first() {
        let mut priorities = vec![Priority::Low, Priority::High, Priority::Medium];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::High, Priority::Medium, Priority::Low]
        );
    }
}
