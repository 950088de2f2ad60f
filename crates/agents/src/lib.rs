mod config;
mod conversation;
mod coordination;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use optimizer_core::{process_message, ConversationState, RouteCategory, RouteDecision};
use optimizer_observability::AppMetrics;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

pub use config::ChatConfig;
pub use conversation::{ChatEntry, Conversation, EntryKind};
pub use coordination::{CoordinationEvent, CoordinationHub, CRISIS_EVENT_TYPE};

use conversation::DeferredRunner;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("conversation `{0}` not found")]
    UnknownConversation(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Debug, Clone, Serialize)]
pub struct MessageOutcome {
    pub conversation_id: String,
    pub decision: RouteDecision,
    /// Entries produced synchronously by this message. A deferred action
    /// lands in the transcript later.
    pub entries: Vec<ChatEntry>,
    pub state: ConversationState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSnapshot {
    pub conversation_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub state: ConversationState,
    pub transcript: Vec<ChatEntry>,
}

/// The optimizer chat: owns every open conversation and drives the router
/// for each incoming message.
#[derive(Clone)]
pub struct OptimizerChat {
    conversations: Arc<RwLock<HashMap<String, Arc<Conversation>>>>,
    hub: CoordinationHub,
    config: ChatConfig,
    metrics: Arc<AppMetrics>,
}

impl OptimizerChat {
    pub fn new(config: ChatConfig, metrics: Arc<AppMetrics>) -> Self {
        Self {
            conversations: Arc::new(RwLock::new(HashMap::new())),
            hub: CoordinationHub::new(config.event_cleanup),
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn coordination(&self) -> &CoordinationHub {
        &self.hub
    }

    pub fn open_conversation(&self) -> String {
        self.open_conversation_with(ConversationState::new())
    }

    pub fn open_conversation_with(&self, state: ConversationState) -> String {
        let id = Uuid::new_v4().to_string();
        let conversation = Arc::new(Conversation::new(
            id.clone(),
            state,
            self.config.max_transcript,
        ));
        self.conversations.write().insert(id.clone(), conversation);
        info!(conversation_id = %id, "conversation opened");
        id
    }

    pub fn close_conversation(&self, conversation_id: &str) -> bool {
        self.conversations.write().remove(conversation_id).is_some()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.read().len()
    }

    /// Routes one user message. Must run inside a tokio runtime: the
    /// comparison route spawns its delayed follow-up there.
    #[instrument(skip(self, text))]
    pub async fn send_message(&self, conversation_id: &str, text: &str) -> Result<MessageOutcome> {
        let started = Instant::now();
        self.metrics.inc_message();

        let conversation = self.conversation(conversation_id)?;
        conversation.push_user(text);
        let mark = conversation.mark();

        // Route against a snapshot: handlers lock the live state to mark
        // sections as shown.
        let snapshot = conversation.state();
        let runner = DeferredRunner {
            conversation: Arc::clone(&conversation),
            metrics: Arc::clone(&self.metrics),
        };
        let decision = process_message(
            text,
            &snapshot,
            conversation.as_ref(),
            &runner,
            &self.config.router,
        );

        if decision.category == RouteCategory::Fallback {
            self.metrics.inc_fallback();
        }

        let entries = conversation.entries_since(mark);

        self.metrics.observe_latency(started.elapsed());
        info!(
            conversation_id = %conversation_id,
            category = ?decision.category,
            rule = ?decision.rule,
            deferred = decision.deferred.is_some(),
            crisis = snapshot.crisis_triggered,
            "message routed"
        );

        Ok(MessageOutcome {
            conversation_id: conversation_id.to_string(),
            decision,
            entries,
            state: conversation.state(),
        })
    }

    pub fn trigger_crisis(&self, conversation_id: &str) -> Result<ConversationState> {
        let conversation = self.conversation(conversation_id)?;
        if conversation.trigger_crisis() {
            self.metrics.inc_crisis_triggered();
            info!(conversation_id = %conversation_id, "crisis mode enabled");
        }
        Ok(conversation.state())
    }

    /// Publishes a coordination event; a crisis event switches every open
    /// conversation into crisis mode. Returns the stamped event and how many
    /// conversations changed mode.
    pub fn broadcast_event(&self, event: CoordinationEvent) -> (CoordinationEvent, usize) {
        self.metrics.inc_coordination_event();
        let event = self.hub.broadcast(event);

        let mut switched = 0;
        if event.is_crisis() {
            for conversation in self.conversations.read().values() {
                if conversation.trigger_crisis() {
                    self.metrics.inc_crisis_triggered();
                    switched += 1;
                }
            }
        }

        (event, switched)
    }

    pub fn snapshot(&self, conversation_id: &str) -> Result<ConversationSnapshot> {
        let conversation = self.conversation(conversation_id)?;
        Ok(ConversationSnapshot {
            conversation_id: conversation.id().to_string(),
            created_at: conversation.created_at(),
            state: conversation.state(),
            transcript: conversation.transcript(),
        })
    }

    fn conversation(&self, conversation_id: &str) -> Result<Arc<Conversation>> {
        self.conversations
            .read()
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| ChatError::UnknownConversation(conversation_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use optimizer_core::router::{GENERAL_FALLBACK, SCENARIO_A_ALREADY_SHOWN};
    use optimizer_core::{RouteRule, SectionName};

    use super::*;

    fn chat() -> OptimizerChat {
        OptimizerChat::new(ChatConfig::default(), AppMetrics::shared())
    }

    fn sections(entries: &[ChatEntry]) -> Vec<SectionName> {
        entries
            .iter()
            .filter_map(|entry| entry.section.as_ref().map(|view| view.section))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn compare_shows_b_now_and_c_after_delay() {
        let chat = chat();
        let id = chat.open_conversation_with(ConversationState::in_crisis());

        let outcome = chat.send_message(&id, "compare all scenarios").await.unwrap();
        assert_eq!(outcome.decision.rule, RouteRule::CrisisCompare);
        assert_eq!(sections(&outcome.entries), vec![SectionName::ScenarioB]);
        assert!(!outcome.state.is_shown(SectionName::ScenarioC));

        tokio::time::sleep(Duration::from_millis(1400)).await;
        assert!(!chat.snapshot(&id).unwrap().state.is_shown(SectionName::ScenarioC));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let snapshot = chat.snapshot(&id).unwrap();
        assert!(snapshot.state.is_shown(SectionName::ScenarioC));
        assert_eq!(
            sections(&snapshot.transcript),
            vec![SectionName::ScenarioB, SectionName::ScenarioC]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_c_is_skipped_when_shown_meanwhile() {
        let chat = chat();
        let id = chat.open_conversation_with(ConversationState::in_crisis());

        chat.send_message(&id, "compare").await.unwrap();
        chat.send_message(&id, "show scenario c").await.unwrap();

        tokio::time::sleep(Duration::from_millis(2000)).await;
        let snapshot = chat.snapshot(&id).unwrap();
        assert_eq!(
            sections(&snapshot.transcript),
            vec![SectionName::ScenarioB, SectionName::ScenarioC]
        );
    }

    #[tokio::test]
    async fn scenario_flow_in_crisis() {
        let chat = chat();
        let id = chat.open_conversation();
        chat.trigger_crisis(&id).unwrap();

        let first = chat.send_message(&id, "yes").await.unwrap();
        assert_eq!(sections(&first.entries), vec![SectionName::ScenarioA]);

        let second = chat.send_message(&id, "yes").await.unwrap();
        assert_eq!(second.decision.rule, RouteRule::ScenarioAlreadyShown);
        assert_eq!(second.entries.len(), 1);
        assert_eq!(second.entries[0].text, SCENARIO_A_ALREADY_SHOWN);
    }

    #[tokio::test]
    async fn fallback_outside_crisis() {
        let chat = chat();
        let id = chat.open_conversation();

        let outcome = chat.send_message(&id, "asdfghjkl").await.unwrap();
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].kind, EntryKind::System);
        assert_eq!(outcome.entries[0].text, GENERAL_FALLBACK);
        // user entry + fallback
        assert_eq!(chat.snapshot(&id).unwrap().transcript.len(), 2);
    }

    #[tokio::test]
    async fn crisis_event_switches_open_conversations() {
        let chat = OptimizerChat::new(
            ChatConfig::default().with_event_cleanup(Duration::ZERO),
            AppMetrics::shared(),
        );
        let first = chat.open_conversation();
        let second = chat.open_conversation();
        chat.trigger_crisis(&second).unwrap();

        let (event, switched) =
            chat.broadcast_event(CoordinationEvent::new(CRISIS_EVENT_TYPE, "production"));
        assert!(event.demo_trigger);
        assert_eq!(switched, 1);
        assert!(chat.snapshot(&first).unwrap().state.crisis_triggered);
        assert_eq!(chat.coordination().latest(), Some(event));
    }

    #[tokio::test]
    async fn unknown_conversation_is_an_error() {
        let chat = chat();
        let result = chat.send_message("missing", "hello").await;
        assert!(matches!(result, Err(ChatError::UnknownConversation(id)) if id == "missing"));
        assert!(!chat.close_conversation("missing"));
    }
}
