use std::time::Duration;

use tracing::debug;

use crate::handlers::{dispatch, ActionHandlers, Scheduler};
use crate::models::{
    Action, ConversationState, DeferredAction, RouteCategory, RouteDecision, RouteRule, SectionName,
};

pub const DEFAULT_COMPARISON_DELAY: Duration = Duration::from_millis(1500);

pub const SCENARIO_A_ALREADY_SHOWN: &str = "I've already shown you Scenario A. Would you like to see other options? Say \"show scenario B\" or \"compare all scenarios\".";

pub const CRISIS_FALLBACK: &str = "I can provide more details about the recommendation. Ask me about: \"How did you estimate the downtime?\", \"Show equipment status\", \"Update the estimate\", or \"Compare with other scenarios\".";

pub const GENERAL_FALLBACK: &str = "I can help you with: production status, tank levels, cost analysis, and optimization scenarios. What would you like to explore?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    pub comparison_delay: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            comparison_delay: DEFAULT_COMPARISON_DELAY,
        }
    }
}

/// A containment rule: every `all_of` needle and at least one `any_of`
/// needle must occur in the lower-cased message.
struct KeywordRule {
    rule: RouteRule,
    all_of: &'static [&'static str],
    any_of: &'static [&'static str],
}

impl KeywordRule {
    fn matches(&self, message: &str) -> bool {
        self.all_of.iter().all(|needle| message.contains(needle))
            && contains_any(message, self.any_of)
    }
}

const CRISIS_RULES: &[KeywordRule] = &[
    KeywordRule {
        rule: RouteRule::CrisisMethodology,
        all_of: &["how"],
        any_of: &["estimate", "calculated", "downtime", "methodology"],
    },
    KeywordRule {
        rule: RouteRule::CrisisValidation,
        all_of: &[],
        any_of: &["update", "revise", "validate", "correction", "actual"],
    },
    KeywordRule {
        rule: RouteRule::CrisisEquipment,
        all_of: &[],
        any_of: &["equipment", "criticality", "status"],
    },
    KeywordRule {
        rule: RouteRule::CrisisScenarioB,
        all_of: &[],
        any_of: &["scenario b", "option b", "second option"],
    },
    KeywordRule {
        rule: RouteRule::CrisisScenarioC,
        all_of: &[],
        any_of: &["scenario c", "option c", "third option", "other option"],
    },
    KeywordRule {
        rule: RouteRule::CrisisCompare,
        all_of: &[],
        any_of: &["compare", "all scenario", "other option"],
    },
];

const GENERAL_RULES: &[KeywordRule] = &[
    KeywordRule {
        rule: RouteRule::ProductionStatus,
        all_of: &[],
        any_of: &["production", "status", "output"],
    },
    KeywordRule {
        rule: RouteRule::TankLevels,
        all_of: &[],
        any_of: &["tank", "inventory", "stock", "level"],
    },
    KeywordRule {
        rule: RouteRule::CostAnalysis,
        all_of: &[],
        any_of: &["cost", "price", "expense"],
    },
];

const SCENARIO_KEYWORDS: &[&str] = &[
    "option",
    "scenario",
    "what should",
    "recommend",
    "show scenario",
    "recommendation",
];

const EXPLAINABILITY_KEYWORDS: &[&str] = &["why", "explain", "reason"];

/// Selects the route for `message` without invoking anything.
///
/// Categories are tried in precedence order (crisis, general data, scenario,
/// explainability) and the first matching rule wins. Anything unmatched,
/// including the empty string, resolves to the fallback.
pub fn route_message(
    message: &str,
    state: &ConversationState,
    config: &RouterConfig,
) -> RouteDecision {
    let lower = message.to_lowercase();

    route_crisis(&lower, state, config)
        .or_else(|| route_general(&lower))
        .or_else(|| route_scenario(&lower, state))
        .or_else(|| route_explainability(&lower))
        .unwrap_or_else(|| fallback(state))
}

/// Routes `message` and invokes the selected handler.
///
/// The comparison rule is the only one with two effects: scenario B runs
/// now (unless already shown) and scenario C is handed to `scheduler`.
pub fn process_message<H, S>(
    message: &str,
    state: &ConversationState,
    handlers: &H,
    scheduler: &S,
    config: &RouterConfig,
) -> RouteDecision
where
    H: ActionHandlers + ?Sized,
    S: Scheduler + ?Sized,
{
    let decision = route_message(message, state, config);
    debug!(category = ?decision.category, rule = ?decision.rule, "message routed");

    if let Some(action) = &decision.immediate {
        dispatch(handlers, action);
    }
    if let Some(deferred) = &decision.deferred {
        scheduler.schedule(deferred.clone());
    }

    decision
}

fn route_crisis(
    message: &str,
    state: &ConversationState,
    config: &RouterConfig,
) -> Option<RouteDecision> {
    if !state.crisis_triggered {
        return None;
    }

    let rule = CRISIS_RULES.iter().find(|rule| rule.matches(message))?.rule;
    let decision = match rule {
        RouteRule::CrisisMethodology => {
            RouteDecision::single(rule, Action::ShowScenarioAMethodology)
        }
        RouteRule::CrisisValidation => RouteDecision::single(rule, Action::ShowValidationForm),
        RouteRule::CrisisEquipment => RouteDecision::single(rule, Action::ShowEquipmentStatus),
        RouteRule::CrisisScenarioB => RouteDecision::single(rule, Action::ShowScenarioB),
        RouteRule::CrisisScenarioC => RouteDecision::single(rule, Action::ShowScenarioC),
        _ => RouteDecision {
            category: RouteCategory::Crisis,
            rule: RouteRule::CrisisCompare,
            immediate: (!state.is_shown(SectionName::ScenarioB)).then_some(Action::ShowScenarioB),
            deferred: Some(DeferredAction {
                action: Action::ShowScenarioC,
                delay: config.comparison_delay,
                unless_shown: SectionName::ScenarioC,
            }),
        },
    };

    Some(decision)
}

fn route_general(message: &str) -> Option<RouteDecision> {
    let rule = GENERAL_RULES.iter().find(|rule| rule.matches(message))?.rule;
    let action = match rule {
        RouteRule::ProductionStatus => Action::ShowProductionStatus,
        RouteRule::TankLevels => Action::ShowTankLevels,
        _ => Action::ShowCostAnalysis,
    };
    Some(RouteDecision::single(rule, action))
}

fn route_scenario(message: &str, state: &ConversationState) -> Option<RouteDecision> {
    let is_scenario_query =
        contains_any(message, SCENARIO_KEYWORDS) || (message == "yes" && state.crisis_triggered);
    if !is_scenario_query {
        return None;
    }

    let decision = match (
        state.crisis_triggered,
        state.is_shown(SectionName::ScenarioA),
    ) {
        (true, false) => RouteDecision::single(RouteRule::ScenarioFirstShow, Action::ShowScenarios),
        (true, true) => RouteDecision::single(
            RouteRule::ScenarioAlreadyShown,
            Action::SystemMessage(SCENARIO_A_ALREADY_SHOWN.to_string()),
        ),
        (false, _) => {
            RouteDecision::single(RouteRule::ScenarioOutsideCrisis, Action::ShowScenarios)
        }
    };

    Some(decision)
}

fn route_explainability(message: &str) -> Option<RouteDecision> {
    contains_any(message, EXPLAINABILITY_KEYWORDS)
        .then(|| RouteDecision::single(RouteRule::Explainability, Action::ShowExplainability))
}

fn fallback(state: &ConversationState) -> RouteDecision {
    RouteDecision::single(
        RouteRule::Fallback,
        Action::SystemMessage(fallback_text(state.crisis_triggered).to_string()),
    )
}

pub fn fallback_text(crisis_triggered: bool) -> &'static str {
    if crisis_triggered {
        CRISIS_FALLBACK
    } else {
        GENERAL_FALLBACK
    }
}

fn contains_any(input: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| input.contains(needle))
}
