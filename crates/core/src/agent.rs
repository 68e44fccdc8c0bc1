//! The per-agent behavioral state machine.
//!
//! Each agent is a finite automaton over `{Idle, Thinking, Talking, Error}`
//! driven by dispatch events and timers. State is only ever mutated from
//! the real-time thread, which is what enforces the at-most-one-outstanding
//! -request invariant without a lock: the orchestrator checks `Thinking`
//! before enqueueing, and nobody else can flip the state underneath it.
//!
//! Unlisted (state, event) pairs are no-ops — a stale response event for an
//! agent that already left `Thinking` is ignored, not a panic.

use crate::message::ConversationHistory;
use crate::provider::GenerateOptions;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How long the error message stays on screen before the agent recovers.
pub const ERROR_DISPLAY_SECS: f32 = 2.0;

/// Agent behavioral states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Wandering, ready for a prompt
    Idle,
    /// A request is in flight; no second dispatch allowed
    Thinking,
    /// Displaying the buffered reply
    Talking,
    /// Displaying a failure message
    Error,
}

/// What a tick update did to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTick {
    Unchanged,
    /// A display window elapsed and the agent returned to `Idle`.
    ReturnedToIdle,
    /// The autonomous idle timer elapsed; the rendering collaborator
    /// should refresh the agent's wander target.
    WanderRequested,
}

/// A conversational agent: identity, backend selection, its own bounded
/// history, and its current behavioral state.
pub struct Agent {
    pub id: String,
    pub name: String,
    pub provider_name: String,
    pub model: String,

    /// Generation tuning copied into each request for this agent.
    pub options: GenerateOptions,

    history: ConversationHistory,
    state: AgentState,
    state_timer: f32,

    /// Reply buffered for display while `Talking`.
    reply: Option<String>,

    /// Non-technical failure message displayed while `Error`.
    error_text: Option<String>,

    /// How long the current reply stays on screen.
    talking_secs: f32,

    /// Seconds between wander signals while `Idle`.
    wander_interval: f32,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        provider_name: impl Into<String>,
        model: impl Into<String>,
        history: ConversationHistory,
        options: GenerateOptions,
        wander_interval: f32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            provider_name: provider_name.into(),
            model: model.into(),
            options,
            history,
            state: AgentState::Idle,
            state_timer: 0.0,
            reply: None,
            error_text: None,
            talking_secs: 0.0,
            wander_interval,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// The text to display for the current state: the buffered reply while
    /// `Talking`, the failure message while `Error`, nothing otherwise.
    pub fn display_text(&self) -> Option<&str> {
        match self.state {
            AgentState::Talking => self.reply.as_deref(),
            AgentState::Error => self.error_text.as_deref(),
            AgentState::Idle | AgentState::Thinking => None,
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut ConversationHistory {
        &mut self.history
    }

    /// A request for this agent was enqueued. No-op while already
    /// `Thinking` — the orchestrator must reject the submit instead.
    pub fn begin_thinking(&mut self) {
        if self.state == AgentState::Thinking {
            return;
        }
        self.reply = None;
        self.error_text = None;
        self.set_state(AgentState::Thinking);
    }

    /// A success event for this agent was drained: buffer the reply and
    /// display it for `talking_secs`. No-op unless `Thinking`.
    pub fn finish_success(&mut self, text: impl Into<String>, talking_secs: f32) {
        if self.state != AgentState::Thinking {
            return;
        }
        self.reply = Some(text.into());
        self.talking_secs = talking_secs;
        self.set_state(AgentState::Talking);
    }

    /// A failure event for this agent was drained: record the user-facing
    /// message for the error display window. No-op unless `Thinking`.
    pub fn finish_failure(&mut self, message: impl Into<String>) {
        if self.state != AgentState::Thinking {
            return;
        }
        self.error_text = Some(message.into());
        self.set_state(AgentState::Error);
    }

    /// Advance timers by `dt` seconds of frame time.
    pub fn update(&mut self, dt: f32) -> StateTick {
        self.state_timer += dt;

        match self.state {
            AgentState::Talking if self.state_timer >= self.talking_secs => {
                self.set_state(AgentState::Idle);
                StateTick::ReturnedToIdle
            }
            AgentState::Error if self.state_timer >= ERROR_DISPLAY_SECS => {
                self.set_state(AgentState::Idle);
                StateTick::ReturnedToIdle
            }
            AgentState::Idle if self.state_timer >= self.wander_interval => {
                self.state_timer = 0.0;
                StateTick::WanderRequested
            }
            _ => StateTick::Unchanged,
        }
    }

    /// The state timer resets on every transition; a talking window must
    /// not inherit time spent thinking.
    fn set_state(&mut self, new_state: AgentState) {
        if new_state != self.state {
            debug!(agent = %self.name, from = ?self.state, to = ?new_state, "state transition");
        }
        self.state = new_state;
        self.state_timer = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> Agent {
        Agent::new(
            "agent_001",
            "Pixel",
            "ollama",
            "llama3.2:3b",
            ConversationHistory::new(10),
            GenerateOptions::default(),
            4.0,
        )
    }

    #[test]
    fn starts_idle_with_nothing_to_display() {
        let agent = agent();
        assert_eq!(agent.state(), AgentState::Idle);
        assert!(agent.display_text().is_none());
    }

    #[test]
    fn dispatch_success_display_cycle() {
        let mut agent = agent();
        agent.begin_thinking();
        assert_eq!(agent.state(), AgentState::Thinking);

        agent.finish_success("Why did...chicken cross?", 1.0);
        assert_eq!(agent.state(), AgentState::Talking);
        assert_eq!(agent.display_text(), Some("Why did...chicken cross?"));

        assert_eq!(agent.update(0.5), StateTick::Unchanged);
        assert_eq!(agent.update(0.6), StateTick::ReturnedToIdle);
        assert_eq!(agent.state(), AgentState::Idle);
        assert!(agent.display_text().is_none());
    }

    #[test]
    fn failure_displays_for_fixed_window() {
        let mut agent = agent();
        agent.begin_thinking();
        agent.finish_failure("I can't reach my model right now.");
        assert_eq!(agent.state(), AgentState::Error);
        assert_eq!(
            agent.display_text(),
            Some("I can't reach my model right now.")
        );

        assert_eq!(agent.update(ERROR_DISPLAY_SECS - 0.1), StateTick::Unchanged);
        assert_eq!(agent.update(0.2), StateTick::ReturnedToIdle);
        assert_eq!(agent.state(), AgentState::Idle);
    }

    #[test]
    fn success_event_outside_thinking_is_a_noop() {
        let mut agent = agent();
        agent.finish_success("stale reply", 1.0);
        assert_eq!(agent.state(), AgentState::Idle);
        assert!(agent.display_text().is_none());
    }

    #[test]
    fn failure_event_outside_thinking_is_a_noop() {
        let mut agent = agent();
        agent.begin_thinking();
        agent.finish_success("reply", 5.0);
        agent.finish_failure("stale error");
        assert_eq!(agent.state(), AgentState::Talking);
        assert_eq!(agent.display_text(), Some("reply"));
    }

    #[test]
    fn idle_timer_requests_wander_on_interval() {
        let mut agent = agent();
        assert_eq!(agent.update(3.9), StateTick::Unchanged);
        assert_eq!(agent.update(0.2), StateTick::WanderRequested);
        // Timer resets: the next signal needs another full interval.
        assert_eq!(agent.update(3.9), StateTick::Unchanged);
        assert_eq!(agent.update(0.2), StateTick::WanderRequested);
    }

    #[test]
    fn thinking_has_no_timer_expiry() {
        let mut agent = agent();
        agent.begin_thinking();
        assert_eq!(agent.update(600.0), StateTick::Unchanged);
        assert_eq!(agent.state(), AgentState::Thinking);
    }

    #[test]
    fn transition_resets_the_state_timer() {
        let mut agent = agent();
        agent.update(3.5);
        agent.begin_thinking();
        agent.finish_success("hi", 2.0);
        // Time spent idle and thinking must not count against talking.
        assert_eq!(agent.update(1.9), StateTick::Unchanged);
        assert_eq!(agent.update(0.2), StateTick::ReturnedToIdle);
    }
}
