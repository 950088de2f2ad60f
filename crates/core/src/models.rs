use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionName {
    ScenarioA,
    ScenarioB,
    ScenarioC,
    Methodology,
    ValidationForm,
    EquipmentStatus,
    ProductionStatus,
    TankLevels,
    CostAnalysis,
    Explainability,
}

impl SectionName {
    pub const ALL: [SectionName; 10] = [
        Self::ScenarioA,
        Self::ScenarioB,
        Self::ScenarioC,
        Self::Methodology,
        Self::ValidationForm,
        Self::EquipmentStatus,
        Self::ProductionStatus,
        Self::TankLevels,
        Self::CostAnalysis,
        Self::Explainability,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "scenario_a" | "scenarioa" => Some(Self::ScenarioA),
            "scenario_b" | "scenariob" => Some(Self::ScenarioB),
            "scenario_c" | "scenarioc" => Some(Self::ScenarioC),
            "methodology" => Some(Self::Methodology),
            "validation_form" | "validation" => Some(Self::ValidationForm),
            "equipment_status" | "equipment" => Some(Self::EquipmentStatus),
            "production_status" | "production" => Some(Self::ProductionStatus),
            "tank_levels" | "tanks" => Some(Self::TankLevels),
            "cost_analysis" | "cost" => Some(Self::CostAnalysis),
            "explainability" => Some(Self::Explainability),
            _ => None,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::ScenarioA => "scenario_a",
            Self::ScenarioB => "scenario_b",
            Self::ScenarioC => "scenario_c",
            Self::Methodology => "methodology",
            Self::ValidationForm => "validation_form",
            Self::EquipmentStatus => "equipment_status",
            Self::ProductionStatus => "production_status",
            Self::TankLevels => "tank_levels",
            Self::CostAnalysis => "cost_analysis",
            Self::Explainability => "explainability",
        }
    }
}

/// Per-conversation state read by the router.
///
/// The router never mutates it. Whoever implements the handler set is
/// expected to mark sections as shown when it renders them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub crisis_triggered: bool,
    #[serde(default)]
    pub shown_sections: BTreeSet<SectionName>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_crisis() -> Self {
        Self {
            crisis_triggered: true,
            shown_sections: BTreeSet::new(),
        }
    }

    pub fn with_shown(mut self, sections: impl IntoIterator<Item = SectionName>) -> Self {
        self.shown_sections.extend(sections);
        self
    }

    pub fn is_shown(&self, section: SectionName) -> bool {
        self.shown_sections.contains(&section)
    }

    /// Returns `true` when the section was not shown before.
    pub fn mark_shown(&mut self, section: SectionName) -> bool {
        self.shown_sections.insert(section)
    }
}

/// One named handler capability, as selected by the router.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum Action {
    ShowScenarioAMethodology,
    ShowValidationForm,
    ShowEquipmentStatus,
    ShowScenarioB,
    ShowScenarioC,
    ShowProductionStatus,
    ShowTankLevels,
    ShowCostAnalysis,
    ShowScenarios,
    ShowExplainability,
    SystemMessage(String),
}

impl Action {
    /// Section rendered by this action, if any.
    pub fn section(&self) -> Option<SectionName> {
        match self {
            Self::ShowScenarioAMethodology => Some(SectionName::Methodology),
            Self::ShowValidationForm => Some(SectionName::ValidationForm),
            Self::ShowEquipmentStatus => Some(SectionName::EquipmentStatus),
            Self::ShowScenarioB => Some(SectionName::ScenarioB),
            Self::ShowScenarioC => Some(SectionName::ScenarioC),
            Self::ShowProductionStatus => Some(SectionName::ProductionStatus),
            Self::ShowTankLevels => Some(SectionName::TankLevels),
            Self::ShowCostAnalysis => Some(SectionName::CostAnalysis),
            Self::ShowScenarios => Some(SectionName::ScenarioA),
            Self::ShowExplainability => Some(SectionName::Explainability),
            Self::SystemMessage(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteCategory {
    Crisis,
    GeneralQuery,
    Scenario,
    Explainability,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteRule {
    CrisisMethodology,
    CrisisValidation,
    CrisisEquipment,
    CrisisScenarioB,
    CrisisScenarioC,
    CrisisCompare,
    ProductionStatus,
    TankLevels,
    CostAnalysis,
    ScenarioFirstShow,
    ScenarioAlreadyShown,
    ScenarioOutsideCrisis,
    Explainability,
    Fallback,
}

impl RouteRule {
    pub fn category(self) -> RouteCategory {
        match self {
            Self::CrisisMethodology
            | Self::CrisisValidation
            | Self::CrisisEquipment
            | Self::CrisisScenarioB
            | Self::CrisisScenarioC
            | Self::CrisisCompare => RouteCategory::Crisis,
            Self::ProductionStatus | Self::TankLevels | Self::CostAnalysis => {
                RouteCategory::GeneralQuery
            }
            Self::ScenarioFirstShow | Self::ScenarioAlreadyShown | Self::ScenarioOutsideCrisis => {
                RouteCategory::Scenario
            }
            Self::Explainability => RouteCategory::Explainability,
            Self::Fallback => RouteCategory::Fallback,
        }
    }
}

/// An action to run once after `delay`, skipped if `unless_shown` has been
/// rendered in the meantime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredAction {
    pub action: Action,
    #[serde(with = "duration_millis")]
    pub delay: Duration,
    pub unless_shown: SectionName,
}

impl DeferredAction {
    /// Evaluated against the live state at fire time, not at schedule time.
    pub fn should_fire(&self, state: &ConversationState) -> bool {
        !state.is_shown(self.unless_shown)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub category: RouteCategory,
    pub rule: RouteRule,
    pub immediate: Option<Action>,
    pub deferred: Option<DeferredAction>,
}

impl RouteDecision {
    pub(crate) fn single(rule: RouteRule, action: Action) -> Self {
        Self {
            category: rule.category(),
            rule,
            immediate: Some(action),
            deferred: None,
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
