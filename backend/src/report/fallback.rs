use crate::pipeline::analysis::{DamageState, TechnicalAnalysis};
use shared::{Priority, Recommendation, Stakeholder, StakeholderReports};

pub const MAX_RECOMMENDATIONS: usize = 4;

/// Deterministic stakeholder reports. This is the availability guarantee of
/// the report stage: always non-empty, parameterized only by damage state
/// and score.
pub fn reports(analysis: &TechnicalAnalysis, score: u8) -> StakeholderReports {
    let damaged = analysis.damage_state == DamageState::Damaged;

    let driver = if damaged {
        format!(
            "Damage detected on this vehicle (condition score: {}/100). \
             Repairing the reported issues improves passenger safety and protects \
             your rating; vehicle condition has a direct effect on your earnings.",
            score
        )
    } else {
        format!(
            "Vehicle is in good condition (condition score: {}/100). \
             Keep it clean and well maintained to get the most orders; \
             passengers notice a cared-for car.",
            score
        )
    };

    let passenger = if damaged {
        format!(
            "Vehicle damage was detected during the automated check. \
             Overall condition score: {}/100. The driver has been asked to \
             review the reported issues.",
            score
        )
    } else {
        format!(
            "This vehicle passed its condition check. Score: {}/100. \
             Your trip should be comfortable and safe.",
            score
        )
    };

    let business = if score < 70 {
        format!(
            "Attention required: condition score {}/100. Recommend working \
             with the driver on a repair plan to keep service standards up.",
            score
        )
    } else {
        format!(
            "Service quality on track: condition score {}/100. The vehicle \
             meets platform standards and supports a positive passenger experience.",
            score
        )
    };

    StakeholderReports {
        driver,
        passenger,
        business,
    }
}

/// Template recommendations driven by keyword matches against the context
/// text. Most urgent first, capped at four entries.
pub fn recommendations(context: &str, score: u8) -> Vec<Recommendation> {
    let context = context.to_lowercase();
    let mut recommendations = Vec::new();

    if context.contains("scratch") {
        recommendations.push(Recommendation {
            action: "Polish the body to remove the scratches".into(),
            impact: "Protects against false damage claims and keeps resale value".into(),
            priority: Priority::Medium,
            stakeholder: Stakeholder::Driver,
            timeline: "1-3 days".into(),
            cost_benefit: "Moderate cost, more completed orders".into(),
        });
    }
    if context.contains("dent") {
        recommendations.push(Recommendation {
            action: "Have the dents repaired at a certified body shop".into(),
            impact: "Restores premium status and insurance standing".into(),
            priority: Priority::High,
            stakeholder: Stakeholder::Driver,
            timeline: "as soon as possible".into(),
            cost_benefit: "High return over the following months".into(),
        });
    }
    if context.contains("rust") {
        recommendations.push(Recommendation {
            action: "Treat the rust spots before they spread".into(),
            impact: "Prevents structural deterioration and a falling score".into(),
            priority: Priority::High,
            stakeholder: Stakeholder::Driver,
            timeline: "as soon as possible".into(),
            cost_benefit: "Early treatment is far cheaper than panel replacement".into(),
        });
    }
    if context.contains("status: dirty") {
        recommendations.push(Recommendation {
            action: "Book a full interior and exterior wash".into(),
            impact: "Higher driver rating and noticeably more orders".into(),
            priority: Priority::High,
            stakeholder: Stakeholder::Driver,
            timeline: "within 24 hours".into(),
            cost_benefit: "Small cost, immediate rating payoff".into(),
        });
    }
    if score < 80 {
        recommendations.push(Recommendation {
            action: "Notify the driver through the app with these findings".into(),
            impact: "Proactive fleet quality improvement".into(),
            priority: Priority::Medium,
            stakeholder: Stakeholder::Platform,
            timeline: "immediately".into(),
            cost_benefit: "Lower support and claims load".into(),
        });
    }
    recommendations.push(Recommendation {
        action: "Enroll the vehicle in periodic quality monitoring".into(),
        impact: "Prevents passenger complaints and automates re-checks".into(),
        priority: Priority::Medium,
        stakeholder: Stakeholder::Platform,
        timeline: "ongoing".into(),
        cost_benefit: "Less manual review time".into(),
    });

    recommendations.sort_by_key(|r| r.priority);
    recommendations.truncate(MAX_RECOMMENDATIONS);
    recommendations
}
