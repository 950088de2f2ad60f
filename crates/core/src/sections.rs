use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::SectionName;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedAction {
    pub action_type: String,
    pub label: String,
    pub payload: Value,
}

/// A pre-built response panel shown in the chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionView {
    pub section: SectionName,
    pub title: String,
    pub lines: Vec<String>,
    pub suggested_actions: Vec<SuggestedAction>,
}

impl SectionView {
    pub fn to_text(&self) -> String {
        let mut out = self.title.clone();
        for line in &self.lines {
            out.push_str("\n- ");
            out.push_str(line);
        }
        out
    }
}

pub fn render_section(section: SectionName) -> SectionView {
    let (title, lines, suggested_actions) = match section {
        SectionName::ScenarioA => (
            "Scenario A: shift ME5 load to ME6 during repair",
            vec![
                "Estimated ME5 downtime: 36 hours",
                "ME6 runs at 96% of capacity to cover APAC orders",
                "No customer shipments delayed; tank buffer drops to 2.1 days",
            ],
            vec![
                action(
                    "ask",
                    "How did you estimate the downtime?",
                    json!({ "text": "how did you estimate the downtime?" }),
                ),
                action(
                    "ask",
                    "Compare all scenarios",
                    json!({ "text": "compare all scenarios" }),
                ),
            ],
        ),
        SectionName::ScenarioB => (
            "Scenario B: source from Antwerp plant",
            vec![
                "Antwerp covers 40% of the APAC shortfall",
                "Extra freight cost: EUR 84k, transit +9 days",
                "Keeps Jurong tank buffer above 3 days",
            ],
            vec![action(
                "ask",
                "Show scenario C",
                json!({ "text": "show scenario c" }),
            )],
        ),
        SectionName::ScenarioC => (
            "Scenario C: delay low-priority orders",
            vec![
                "Defers 6 spot orders by 5 days",
                "No extra freight or overtime cost",
                "Customer satisfaction risk flagged for two accounts",
            ],
            Vec::new(),
        ),
        SectionName::Methodology => (
            "How the downtime estimate is calculated",
            vec![
                "Baseline: median repair time of the last 12 comparable ME5 failures",
                "Adjusted for current spare-part availability at Jurong Island",
                "Criticality weighting from the equipment status register",
            ],
            vec![action(
                "ask",
                "Update the estimate",
                json!({ "text": "update the estimate" }),
            )],
        ),
        SectionName::ValidationForm => (
            "Validate or correct the estimate",
            vec![
                "Enter the actual expected downtime in hours",
                "Optionally attach the maintenance ticket reference",
                "The recommendation is recalculated after submission",
            ],
            vec![action(
                "form",
                "Submit correction",
                json!({ "fields": ["downtime_hours", "ticket"] }),
            )],
        ),
        SectionName::EquipmentStatus => (
            "Equipment status",
            vec![
                "ME5 reactor feed pump: FAILED (criticality: high)",
                "ME6 unit: running, 88% utilisation",
                "Cooling tower CT-2: degraded, monitoring",
            ],
            Vec::new(),
        ),
        SectionName::ProductionStatus => (
            "Production status",
            vec![
                "ME5 unit: 812 MT/day of 965 MT/day capacity",
                "ME6 unit: 948 MT/day of 1,080 MT/day capacity",
                "Hourly target: 40.2 MT/hour",
            ],
            Vec::new(),
        ),
        SectionName::TankLevels => (
            "Tank levels",
            vec![
                "Product tank T-101: 68% (3.4 days of cover)",
                "Product tank T-102: 41% (2.0 days of cover)",
                "Raw material stock: within plan",
            ],
            Vec::new(),
        ),
        SectionName::CostAnalysis => (
            "Cost analysis",
            vec![
                "Variable production cost: EUR 1,140/MT",
                "Logistics cost share: 11%",
                "Energy expense up 4% month over month",
            ],
            Vec::new(),
        ),
        SectionName::Explainability => (
            "Why this recommendation",
            vec![
                "Lowest combined cost across the three scenarios",
                "Keeps every committed customer shipment on time",
                "Relies on ME6 headroom confirmed by the last 30 days of OEE",
            ],
            Vec::new(),
        ),
    };

    SectionView {
        section,
        title: title.to_string(),
        lines: lines.into_iter().map(ToString::to_string).collect(),
        suggested_actions,
    }
}

fn action(action_type: &str, label: &str, payload: Value) -> SuggestedAction {
    SuggestedAction {
        action_type: action_type.to_string(),
        label: label.to_string(),
        payload,
    }
}
