use crate::pipeline::analysis::TechnicalAnalysis;
use crate::report::context::build_context;
use crate::report::fallback;
use crate::report::narrative::{NarrativeApi, NarrativeError};
use log::warn;
use shared::{Recommendation, StakeholderReports};
use std::sync::Arc;

const DRIVER_MAX_TOKENS: u32 = 350;
const PASSENGER_MAX_TOKENS: u32 = 200;
const BUSINESS_MAX_TOKENS: u32 = 400;
const RECOMMENDATION_MAX_TOKENS: u32 = 400;

pub struct ReportBundle {
    pub reports: StakeholderReports,
    pub recommendations: Vec<Recommendation>,
    pub diagnostic: Option<String>,
}

/// Report stage. Delegates narrative text to the external collaborator and
/// degrades to deterministic templates whenever that collaborator is
/// unconfigured, unreachable or returns something unusable.
#[derive(Clone)]
pub struct ReportService {
    narrative: Option<Arc<dyn NarrativeApi>>,
}

impl ReportService {
    pub fn new(narrative: Option<Arc<dyn NarrativeApi>>) -> Self {
        Self { narrative }
    }

    pub async fn generate(&self, analysis: &TechnicalAnalysis, score: u8) -> ReportBundle {
        let context = build_context(analysis);

        let Some(api) = self.narrative.as_deref() else {
            return fallback_bundle(
                analysis,
                &context,
                score,
                Some(NarrativeError::NotConfigured.to_string()),
            );
        };

        match primary(api, &context, score).await {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("Narrative generation failed, using templates: {}", e);
                fallback_bundle(analysis, &context, score, Some(e.to_string()))
            }
        }
    }
}

async fn primary(
    api: &dyn NarrativeApi,
    context: &str,
    score: u8,
) -> Result<ReportBundle, NarrativeError> {
    let driver = api.complete(&driver_prompt(context), DRIVER_MAX_TOKENS, 0.6).await?;
    let passenger = api
        .complete(&passenger_prompt(context), PASSENGER_MAX_TOKENS, 0.3)
        .await?;
    let business = api
        .complete(&business_prompt(context), BUSINESS_MAX_TOKENS, 0.4)
        .await?;

    for report in [&driver, &passenger, &business] {
        if report.trim().is_empty() {
            return Err(NarrativeError::MalformedResponse("empty report text".into()));
        }
    }

    let recommendations = match structured_recommendations(api, context, score).await {
        Ok(recommendations) => recommendations,
        Err(e) => {
            warn!("Recommendation generation failed, using templates: {}", e);
            fallback::recommendations(context, score)
        }
    };

    Ok(ReportBundle {
        reports: StakeholderReports {
            driver,
            passenger,
            business,
        },
        recommendations,
        diagnostic: None,
    })
}

/// The collaborator's output is untrusted text: anything that does not
/// parse as the exact recommendation schema counts as a service failure.
async fn structured_recommendations(
    api: &dyn NarrativeApi,
    context: &str,
    score: u8,
) -> Result<Vec<Recommendation>, NarrativeError> {
    let text = api
        .complete(
            &recommendations_prompt(context, score),
            RECOMMENDATION_MAX_TOKENS,
            0.4,
        )
        .await?;
    let recommendations: Vec<Recommendation> = serde_json::from_str(text.trim())
        .map_err(|e| NarrativeError::MalformedResponse(e.to_string()))?;
    Ok(recommendations
        .into_iter()
        .take(fallback::MAX_RECOMMENDATIONS)
        .collect())
}

fn fallback_bundle(
    analysis: &TechnicalAnalysis,
    context: &str,
    score: u8,
    diagnostic: Option<String>,
) -> ReportBundle {
    ReportBundle {
        reports: fallback::reports(analysis, score),
        recommendations: fallback::recommendations(context, score),
        diagnostic,
    }
}

fn driver_prompt(context: &str) -> String {
    format!(
        "You are a personal earnings consultant for a ride-hailing driver. \
         Use the detailed condition analysis below.\n\n{}\n\n\
         Write a personalized report that covers: the exact diagnosis phrased \
         by confidence tier (critically high, high, moderate or low), the \
         earnings impact of each finding, a concrete repair plan with rough \
         cost and payback period, and advice to document the current state as \
         protection against false claims. Reference the specific parts, damage \
         types and confidence percentages from the analysis. \
         Tone: an experienced mentor. At most 150 words.",
        context
    )
}

fn passenger_prompt(context: &str) -> String {
    format!(
        "You are the safety assistant of a ride-hailing platform. Write a \
         short pre-trip notification for the passenger based on the analysis \
         below.\n\n{}\n\n\
         Include a one-line safety status, one or two sentences on what was \
         checked, and a trust badge line when appropriate (for example \
         \"Verified Clean & Intact\" or \"Minor Issues Disclosed\"). \
         Tone: professional and reassuring. At most 80 words.",
        context
    )
}

fn business_prompt(context: &str) -> String {
    format!(
        "You are the fleet-quality analyst of a ride-hailing platform. Using \
         the exact metrics below, write a strategic report.\n\n{}\n\n\
         Cover: the technical assessment phrased by confidence tier, business \
         metrics such as claims risk and booking impact, an operational \
         recommendation (block, warn with a repair plan, or premium status), \
         and a short ROI note. Tone: strategic analyst. At most 180 words.",
        context
    )
}

fn recommendations_prompt(context: &str, score: u8) -> String {
    format!(
        "The vehicle condition analysis below produced an overall score of \
         {}/100.\n\n{}\n\n\
         Return 3-4 highly specific recommendations as a JSON array, and \
         nothing else. Each element must have exactly these fields: \
         \"action\", \"impact\", \"priority\" (one of \"low\", \"medium\", \
         \"high\"), \"stakeholder\" (one of \"driver\", \"passenger\", \
         \"platform\"), \"timeline\" and \"cost_benefit\".",
        score, context
    )
}
