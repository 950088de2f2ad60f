use std::sync::Arc;

use chrono::{DateTime, Utc};
use optimizer_core::{
    dispatch, render_section, ActionHandlers, ConversationState, DeferredAction, Scheduler,
    SectionName, SectionView,
};
use optimizer_observability::AppMetrics;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    User,
    System,
    Section,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    pub at: DateTime<Utc>,
    pub kind: EntryKind,
    pub text: String,
    pub section: Option<SectionView>,
}

/// One chat thread: its routing state and what has been said so far.
///
/// Implements the handler set. Every `show_*` call renders the section into
/// the transcript and marks it shown; `show_scenarios` marks scenario A.
#[derive(Debug)]
pub struct Conversation {
    id: String,
    created_at: DateTime<Utc>,
    max_transcript: usize,
    state: Mutex<ConversationState>,
    transcript: Mutex<Transcript>,
}

#[derive(Debug, Default)]
struct Transcript {
    entries: Vec<ChatEntry>,
    pushed: usize,
}

impl Conversation {
    pub fn new(id: String, state: ConversationState, max_transcript: usize) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            max_transcript: max_transcript.max(1),
            state: Mutex::new(state),
            transcript: Mutex::new(Transcript::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> ConversationState {
        self.state.lock().clone()
    }

    /// Returns `true` if crisis mode was off before.
    pub fn trigger_crisis(&self) -> bool {
        let mut state = self.state.lock();
        let changed = !state.crisis_triggered;
        state.crisis_triggered = true;
        changed
    }

    pub fn transcript(&self) -> Vec<ChatEntry> {
        self.transcript.lock().entries.clone()
    }

    /// Number of entries ever appended, including ones trimmed since.
    pub fn mark(&self) -> usize {
        self.transcript.lock().pushed
    }

    /// Entries appended after `mark` that are still retained.
    pub fn entries_since(&self, mark: usize) -> Vec<ChatEntry> {
        let transcript = self.transcript.lock();
        let produced = transcript.pushed.saturating_sub(mark);
        let keep = produced.min(transcript.entries.len());
        transcript.entries[transcript.entries.len() - keep..].to_vec()
    }

    pub(crate) fn push_user(&self, text: &str) {
        self.push(ChatEntry {
            at: Utc::now(),
            kind: EntryKind::User,
            text: text.to_string(),
            section: None,
        });
    }

    /// Checks a deferred action against the state and marks its section
    /// under the same lock, so a concurrent `show_*` cannot slip in between.
    /// Returns whether the action fired.
    pub(crate) fn fire_deferred(&self, deferred: &DeferredAction) -> bool {
        let section = deferred.action.section();
        {
            let mut state = self.state.lock();
            if !deferred.should_fire(&state) {
                return false;
            }
            state.mark_shown(deferred.unless_shown);
            if let Some(section) = section {
                state.mark_shown(section);
            }
        }

        match section {
            Some(section) => self.render(section),
            None => dispatch(self, &deferred.action),
        }
        true
    }

    fn show(&self, section: SectionName) {
        self.state.lock().mark_shown(section);
        self.render(section);
    }

    fn render(&self, section: SectionName) {
        let view = render_section(section);
        debug!(conversation_id = %self.id, section = section.as_code(), "section shown");
        self.push(ChatEntry {
            at: Utc::now(),
            kind: EntryKind::Section,
            text: view.to_text(),
            section: Some(view),
        });
    }

    fn push(&self, entry: ChatEntry) {
        let mut transcript = self.transcript.lock();
        transcript.entries.push(entry);
        transcript.pushed += 1;

        if transcript.entries.len() > self.max_transcript {
            let keep_from = transcript.entries.len() - self.max_transcript;
            transcript.entries.drain(..keep_from);
        }
    }
}

impl ActionHandlers for Conversation {
    fn show_scenario_a_methodology(&self) {
        self.show(SectionName::Methodology);
    }

    fn show_validation_form(&self) {
        self.show(SectionName::ValidationForm);
    }

    fn show_equipment_status(&self) {
        self.show(SectionName::EquipmentStatus);
    }

    fn show_scenario_b(&self) {
        self.show(SectionName::ScenarioB);
    }

    fn show_scenario_c(&self) {
        self.show(SectionName::ScenarioC);
    }

    fn show_production_status(&self) {
        self.show(SectionName::ProductionStatus);
    }

    fn show_tank_levels(&self) {
        self.show(SectionName::TankLevels);
    }

    fn show_cost_analysis(&self) {
        self.show(SectionName::CostAnalysis);
    }

    fn show_scenarios(&self) {
        self.show(SectionName::ScenarioA);
    }

    fn show_explainability(&self) {
        self.show(SectionName::Explainability);
    }

    fn add_system_message(&self, text: &str) {
        self.push(ChatEntry {
            at: Utc::now(),
            kind: EntryKind::System,
            text: text.to_string(),
            section: None,
        });
    }
}

/// Runs deferred actions on the tokio runtime, once, after their delay.
pub(crate) struct DeferredRunner {
    pub(crate) conversation: Arc<Conversation>,
    pub(crate) metrics: Arc<AppMetrics>,
}

impl Scheduler for DeferredRunner {
    fn schedule(&self, deferred: DeferredAction) {
        self.metrics.inc_deferred_scheduled();
        let conversation = Arc::clone(&self.conversation);
        let metrics = Arc::clone(&self.metrics);

        tokio::spawn(async move {
            tokio::time::sleep(deferred.delay).await;

            let fire = conversation.fire_deferred(&deferred);
            if fire {
                metrics.inc_deferred_fired();
            } else {
                metrics.inc_deferred_skipped();
            }

            info!(
                conversation_id = %conversation.id,
                action = ?deferred.action,
                fired = fire,
                "deferred action resolved"
            );
        });
    }
}
