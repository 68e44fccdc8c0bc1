//! The inference worker thread and its client handle.
//!
//! One dedicated OS thread owns a single-threaded tokio runtime and
//! processes requests sequentially. The real-time side talks to it through
//! two unbounded channels and never blocks: [`InferenceClient::send`]
//! enqueues, [`InferenceClient::try_recv`] drains whatever results have
//! arrived this frame.
//!
//! Fragments are accumulated on the worker; only terminal
//! [`ResponseEvent`]s cross back.

use pixelprompt_core::dispatch::{FailureKind, InferenceRequest, ResponseEvent, ResponseOutcome};
use pixelprompt_core::error::ProviderError;
use pixelprompt_core::message::Message;
use pixelprompt_core::provider::{FragmentStream, Provider};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How long the worker sleeps on an empty queue before rechecking the
/// shutdown flag.
const RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// How long [`InferenceClient::stop`] waits for the worker to exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    /// The worker did not exit within the grace period. Its thread (and
    /// whatever backend call it is wedged on) is abandoned.
    #[error("inference worker did not stop within {0:?}")]
    Timeout(Duration),

    #[error("inference worker panicked")]
    Panicked,
}

/// Handle to the inference worker, held by the real-time thread.
pub struct InferenceClient {
    request_tx: Option<mpsc::UnboundedSender<InferenceRequest>>,
    response_rx: mpsc::UnboundedReceiver<ResponseEvent>,
    shutdown: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl InferenceClient {
    /// Spawn the worker thread over the given provider set.
    pub fn start(providers: HashMap<String, Arc<dyn Provider>>) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_shutdown = Arc::clone(&shutdown);

        let worker = thread::Builder::new()
            .name("inference-worker".into())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("Failed to build inference runtime");
                runtime.block_on(worker_loop(
                    providers,
                    request_rx,
                    response_tx,
                    worker_shutdown,
                ));
                debug!("Inference worker exited");
            })
            .expect("Failed to spawn inference worker");

        info!("Inference worker started");

        Self {
            request_tx: Some(request_tx),
            response_rx,
            shutdown,
            worker: Some(worker),
        }
    }

    /// Enqueue a request. Returns `false` if the worker is gone.
    pub fn send(&self, request: InferenceRequest) -> bool {
        match &self.request_tx {
            Some(tx) => tx.send(request).is_ok(),
            None => false,
        }
    }

    /// Drain one result, if any has arrived. Never blocks.
    pub fn try_recv(&mut self) -> Option<ResponseEvent> {
        self.response_rx.try_recv().ok()
    }

    /// Signal the worker and wait up to the grace period for it to exit.
    ///
    /// On timeout the thread is abandoned rather than joined; a wedged
    /// backend call must not hold up process exit.
    pub fn stop(mut self) -> Result<(), ShutdownError> {
        self.shutdown.store(true, Ordering::Relaxed);
        // Closing the request channel wakes the worker immediately.
        self.request_tx.take();

        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        while !worker.is_finished() {
            if Instant::now() >= deadline {
                warn!("Inference worker did not stop in time; abandoning it");
                return Err(ShutdownError::Timeout(SHUTDOWN_GRACE));
            }
            thread::sleep(Duration::from_millis(10));
        }

        worker.join().map_err(|_| ShutdownError::Panicked)
    }
}

async fn worker_loop(
    providers: HashMap<String, Arc<dyn Provider>>,
    mut request_rx: mpsc::UnboundedReceiver<InferenceRequest>,
    response_tx: mpsc::UnboundedSender<ResponseEvent>,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        match tokio::time::timeout(RECV_TIMEOUT, request_rx.recv()).await {
            Ok(Some(request)) => {
                let event = process_request(&providers, request).await;
                if response_tx.send(event).is_err() {
                    break; // client dropped
                }
            }
            Ok(None) => break, // channel closed: client stopped or dropped
            Err(_) => {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
            }
        }
    }
}

async fn process_request(
    providers: &HashMap<String, Arc<dyn Provider>>,
    request: InferenceRequest,
) -> ResponseEvent {
    debug!(
        agent = %request.agent_id,
        provider = %request.provider,
        model = %request.model,
        "Processing request"
    );

    let outcome = match providers.get(&request.provider) {
        Some(provider) => run_generation(provider.as_ref(), &request).await,
        None => ResponseOutcome::Failure {
            kind: FailureKind::NotFound,
            detail: format!("provider '{}' is not available", request.provider),
        },
    };

    ResponseEvent {
        agent_id: request.agent_id,
        outcome,
    }
}

/// Run one backend call under the per-request completion budget.
///
/// The budget covers connection setup and the entire stream; exceeding it
/// is a classified `Timeout` no matter where the time went.
async fn run_generation(provider: &dyn Provider, request: &InferenceRequest) -> ResponseOutcome {
    let mut messages = request.history.clone();
    messages.push(Message::user(request.message.clone()));

    let budget = Duration::from_secs(request.options.timeout_secs);
    let call = async {
        let mut fragments = provider
            .stream(&messages, &request.model, &request.options)
            .await?;
        accumulate(&mut fragments).await
    };

    match tokio::time::timeout(budget, call).await {
        Ok(Ok(text)) if text.trim().is_empty() => {
            let err = ProviderError::MalformedResponse(format!(
                "{} produced an empty reply",
                provider.name()
            ));
            warn!(error = %err, "Generation failed");
            ResponseOutcome::failure(&err)
        }
        Ok(Ok(text)) => {
            debug!(chars = text.chars().count(), "Generation completed");
            ResponseOutcome::Success { text }
        }
        Ok(Err(err)) => {
            warn!(error = %err, "Generation failed");
            ResponseOutcome::failure(&err)
        }
        Err(_) => {
            let err = ProviderError::Timeout(format!(
                "no completion within {}s",
                request.options.timeout_secs
            ));
            warn!(error = %err, "Generation failed");
            ResponseOutcome::failure(&err)
        }
    }
}

/// Concatenate the full fragment stream into one reply.
async fn accumulate(fragments: &mut FragmentStream) -> Result<String, ProviderError> {
    let mut text = String::new();
    while let Some(fragment) = fragments.recv().await {
        text.push_str(&fragment?);
    }
    Ok(text)
}
