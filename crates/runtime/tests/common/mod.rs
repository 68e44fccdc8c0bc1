//! Scripted in-process backend for exercising the dispatcher and session
//! without a network.

use async_trait::async_trait;
use pixelprompt_core::error::ProviderError;
use pixelprompt_core::message::Message;
use pixelprompt_core::provider::{FragmentStream, GenerateOptions, Provider};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// What the next `stream` call should do.
#[derive(Debug)]
pub enum Behavior {
    /// Stream the given fragments, then end cleanly.
    Reply(Vec<&'static str>),
    /// End the stream without producing any text.
    Empty,
    /// Never produce anything within any sane test deadline.
    Hang,
    /// Fail before the stream starts.
    FailSetup(ProviderError),
    /// Produce a fragment, then die mid-stream.
    DieMidStream(&'static str),
}

/// Plays back a fixed script, one behavior per `stream` call.
#[derive(Debug)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Behavior>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Behavior>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn stream(
        &self,
        _messages: &[Message],
        _model: &str,
        _options: &GenerateOptions,
    ) -> Result<FragmentStream, ProviderError> {
        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted provider called more times than scripted");

        let (tx, rx) = tokio::sync::mpsc::channel(16);
        match behavior {
            Behavior::Reply(fragments) => {
                for fragment in fragments {
                    tx.send(Ok(fragment.to_string())).await.unwrap();
                }
            }
            Behavior::Empty => {}
            Behavior::Hang => {
                tokio::spawn(async move {
                    // Keep the sender alive so the stream never ends.
                    tokio::time::sleep(Duration::from_secs(600)).await;
                    drop(tx);
                });
            }
            Behavior::FailSetup(err) => return Err(err),
            Behavior::DieMidStream(fragment) => {
                tx.send(Ok(fragment.to_string())).await.unwrap();
                tx.send(Err(ProviderError::Unreachable(
                    "connection reset mid-stream".into(),
                )))
                .await
                .unwrap();
            }
        }

        Ok(rx)
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn list_models(&self) -> Vec<String> {
        vec!["scripted-model".into()]
    }
}
