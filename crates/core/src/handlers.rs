use crate::models::{Action, DeferredAction};

/// The handler set the router dispatches into. One method per action.
///
/// Implementations own every side effect, including marking sections as
/// shown on the conversation state.
pub trait ActionHandlers {
    fn show_scenario_a_methodology(&self);
    fn show_validation_form(&self);
    fn show_equipment_status(&self);
    fn show_scenario_b(&self);
    fn show_scenario_c(&self);
    fn show_production_status(&self);
    fn show_tank_levels(&self);
    fn show_cost_analysis(&self);
    fn show_scenarios(&self);
    fn show_explainability(&self);
    fn add_system_message(&self, text: &str);
}

/// Fire-once delayed execution. Implementations must call
/// [`DeferredAction::should_fire`] against the state as it is when the delay
/// elapses.
pub trait Scheduler {
    fn schedule(&self, deferred: DeferredAction);
}

pub fn dispatch<H>(handlers: &H, action: &Action)
where
    H: ActionHandlers + ?Sized,
{
    match action {
        Action::ShowScenarioAMethodology => handlers.show_scenario_a_methodology(),
        Action::ShowValidationForm => handlers.show_validation_form(),
        Action::ShowEquipmentStatus => handlers.show_equipment_status(),
        Action::ShowScenarioB => handlers.show_scenario_b(),
        Action::ShowScenarioC => handlers.show_scenario_c(),
        Action::ShowProductionStatus => handlers.show_production_status(),
        Action::ShowTankLevels => handlers.show_tank_levels(),
        Action::ShowCostAnalysis => handlers.show_cost_analysis(),
        Action::ShowScenarios => handlers.show_scenarios(),
        Action::ShowExplainability => handlers.show_explainability(),
        Action::SystemMessage(text) => handlers.add_system_message(text),
    }
}
