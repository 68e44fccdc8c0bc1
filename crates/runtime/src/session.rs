//! The session orchestrator: agents, submits, and the per-frame tick.
//!
//! Owned and driven entirely by the real-time thread. Each frame calls
//! [`Session::tick`], which drains worker results, applies them to the
//! owning agents, and advances every agent's timers. All network work
//! happens behind the [`InferenceClient`]; nothing here blocks.

use crate::dispatcher::{InferenceClient, ShutdownError};
use pixelprompt_config::AppConfig;
use pixelprompt_core::agent::{Agent, AgentState, StateTick};
use pixelprompt_core::dispatch::{InferenceRequest, ResponseEvent, ResponseOutcome};
use pixelprompt_core::error::Error;
use pixelprompt_core::message::{ConversationHistory, Message};
use pixelprompt_core::provider::{GenerateOptions, Provider};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Something a collaborator (renderer, logger) may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// An agent changed behavioral state this tick.
    StateChanged {
        agent_id: String,
        state: AgentState,
    },

    /// An idle agent's wander timer elapsed; pick it a new wander target.
    IdleWander { agent_id: String },
}

/// A running conversation session over a set of agents.
pub struct Session {
    agents: Vec<Agent>,
    client: InferenceClient,

    /// Per-character display pacing, in seconds.
    typewriter_delay_secs: f32,

    /// Extra display time after the last character is revealed.
    talking_linger_secs: f32,
}

impl Session {
    /// Build the agents from configuration and start the worker.
    pub fn new(
        config: &AppConfig,
        providers: HashMap<String, Arc<dyn Provider>>,
    ) -> Result<Self, Error> {
        config.validate().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;

        let wander_interval = config.ui.wander_interval_secs;
        let mut agents = Vec::with_capacity(config.agents.len());

        for profile in &config.agents {
            let history = match &profile.system_prompt {
                Some(prompt) => ConversationHistory::with_system(profile.max_history, prompt),
                None => ConversationHistory::new(profile.max_history),
            };

            // Validation guarantees the provider entry exists.
            let timeout_secs = config
                .providers
                .get(&profile.provider)
                .map(|p| p.timeout_secs)
                .unwrap_or_else(|| GenerateOptions::default().timeout_secs);

            let options = GenerateOptions {
                timeout_secs,
                ..GenerateOptions::default()
            };

            info!(
                agent = %profile.id,
                name = %profile.name,
                provider = %profile.provider,
                model = %profile.model,
                "Spawning agent"
            );

            agents.push(Agent::new(
                profile.id.clone(),
                profile.name.clone(),
                profile.provider.clone(),
                profile.model.clone(),
                history,
                options,
                wander_interval,
            ));
        }

        Ok(Self {
            agents,
            client: InferenceClient::start(providers),
            typewriter_delay_secs: config.ui.typewriter_delay_ms as f32 / 1000.0,
            talking_linger_secs: config.ui.talking_linger_secs,
        })
    }

    /// Submit a user message to an agent.
    ///
    /// Returns `Ok(false)` when the agent already has a request in flight;
    /// the caller should surface "busy" rather than queue a second one.
    /// The live history gains the user message only after the request is
    /// safely enqueued, and the request carries a snapshot taken before
    /// that append.
    pub fn submit(&mut self, agent_id: &str, text: impl Into<String>) -> Result<bool, Error> {
        let text = text.into();
        let agent = self
            .agents
            .iter_mut()
            .find(|a| a.id == agent_id)
            .ok_or_else(|| Error::UnknownAgent(agent_id.to_string()))?;

        if agent.state() == AgentState::Thinking {
            debug!(agent = %agent.id, "Rejecting submit while a request is in flight");
            return Ok(false);
        }

        let request = InferenceRequest {
            agent_id: agent.id.clone(),
            provider: agent.provider_name.clone(),
            model: agent.model.clone(),
            message: text.clone(),
            history: agent.history().snapshot(),
            options: agent.options.clone(),
        };

        if !self.client.send(request) {
            return Err(Error::Internal("inference worker is gone".into()));
        }

        agent.history_mut().append(Message::user(text));
        agent.begin_thinking();
        Ok(true)
    }

    /// Advance the session by one frame: drain worker results, then tick
    /// every agent's timers by `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        while let Some(response) = self.client.try_recv() {
            self.apply_response(response, &mut events);
        }

        for agent in &mut self.agents {
            match agent.update(dt) {
                StateTick::ReturnedToIdle => events.push(SessionEvent::StateChanged {
                    agent_id: agent.id.clone(),
                    state: AgentState::Idle,
                }),
                StateTick::WanderRequested => events.push(SessionEvent::IdleWander {
                    agent_id: agent.id.clone(),
                }),
                StateTick::Unchanged => {}
            }
        }

        events
    }

    fn apply_response(&mut self, response: ResponseEvent, events: &mut Vec<SessionEvent>) {
        let typewriter = self.typewriter_delay_secs;
        let linger = self.talking_linger_secs;

        let Some(agent) = self.agents.iter_mut().find(|a| a.id == response.agent_id) else {
            warn!(agent = %response.agent_id, "Dropping result for unknown agent");
            return;
        };

        if agent.state() != AgentState::Thinking {
            debug!(agent = %agent.id, "Dropping stale result");
            return;
        }

        match response.outcome {
            ResponseOutcome::Success { text } => {
                agent.history_mut().append(Message::assistant(text.clone()));
                agent.history_mut().trim();

                let talking_secs = linger + text.chars().count() as f32 * typewriter;
                agent.finish_success(text, talking_secs);

                events.push(SessionEvent::StateChanged {
                    agent_id: agent.id.clone(),
                    state: AgentState::Talking,
                });
            }
            ResponseOutcome::Failure { kind, detail } => {
                warn!(agent = %agent.id, ?kind, detail, "Request failed");
                agent.finish_failure(kind.user_message());

                events.push(SessionEvent::StateChanged {
                    agent_id: agent.id.clone(),
                    state: AgentState::Error,
                });
            }
        }
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn state_of(&self, agent_id: &str) -> Option<AgentState> {
        self.agents
            .iter()
            .find(|a| a.id == agent_id)
            .map(Agent::state)
    }

    /// The text an agent is currently showing, if any.
    pub fn display_text(&self, agent_id: &str) -> Option<&str> {
        self.agents
            .iter()
            .find(|a| a.id == agent_id)
            .and_then(Agent::display_text)
    }

    /// Stop the worker, waiting up to its grace period.
    pub fn shutdown(self) -> Result<(), ShutdownError> {
        self.client.stop()
    }
}
