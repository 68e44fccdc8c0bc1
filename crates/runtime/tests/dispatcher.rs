mod common;

use common::{Behavior, ScriptedProvider};
use pixelprompt_core::dispatch::{FailureKind, InferenceRequest, ResponseEvent, ResponseOutcome};
use pixelprompt_core::error::ProviderError;
use pixelprompt_core::provider::{GenerateOptions, Provider};
use pixelprompt_runtime::InferenceClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn client_with(script: Vec<Behavior>) -> InferenceClient {
    let mut providers: HashMap<String, Arc<dyn Provider>> = HashMap::new();
    providers.insert("scripted".into(), Arc::new(ScriptedProvider::new(script)));
    InferenceClient::start(providers)
}

fn request(agent_id: &str, timeout_secs: u64) -> InferenceRequest {
    InferenceRequest {
        agent_id: agent_id.into(),
        provider: "scripted".into(),
        model: "scripted-model".into(),
        message: "Tell me a joke".into(),
        history: Vec::new(),
        options: GenerateOptions {
            timeout_secs,
            ..GenerateOptions::default()
        },
    }
}

/// Poll the client until a result arrives or the deadline passes.
fn wait_for_event(client: &mut InferenceClient) -> ResponseEvent {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if let Some(event) = client.try_recv() {
            return event;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("no response event within 10s");
}

#[test]
fn fragments_accumulate_into_one_reply() {
    let mut client = client_with(vec![Behavior::Reply(vec!["Why did ", "the chicken ", "cross?"])]);
    assert!(client.send(request("agent_001", 30)));

    let event = wait_for_event(&mut client);
    assert_eq!(event.agent_id, "agent_001");
    match event.outcome {
        ResponseOutcome::Success { text } => assert_eq!(text, "Why did the chicken cross?"),
        other => panic!("expected success, got {other:?}"),
    }

    client.stop().unwrap();
}

#[test]
fn requests_are_processed_in_order() {
    let mut client = client_with(vec![
        Behavior::Reply(vec!["first"]),
        Behavior::Reply(vec!["second"]),
    ]);
    assert!(client.send(request("agent_a", 30)));
    assert!(client.send(request("agent_b", 30)));

    let first = wait_for_event(&mut client);
    let second = wait_for_event(&mut client);
    assert_eq!(first.agent_id, "agent_a");
    assert_eq!(second.agent_id, "agent_b");
    match second.outcome {
        ResponseOutcome::Success { text } => assert_eq!(text, "second"),
        other => panic!("expected success, got {other:?}"),
    }

    client.stop().unwrap();
}

#[test]
fn stalled_backend_is_classified_timeout() {
    let mut client = client_with(vec![Behavior::Hang]);
    assert!(client.send(request("agent_001", 1)));

    let event = wait_for_event(&mut client);
    match event.outcome {
        ResponseOutcome::Failure { kind, .. } => assert_eq!(kind, FailureKind::Timeout),
        other => panic!("expected failure, got {other:?}"),
    }

    // The worker remains usable after abandoning the stalled call.
    drop(client.stop());
}

#[test]
fn empty_reply_is_classified_malformed() {
    let mut client = client_with(vec![Behavior::Empty]);
    assert!(client.send(request("agent_001", 30)));

    let event = wait_for_event(&mut client);
    match event.outcome {
        ResponseOutcome::Failure { kind, detail } => {
            assert_eq!(kind, FailureKind::MalformedResponse);
            assert!(detail.contains("empty"));
        }
        other => panic!("expected failure, got {other:?}"),
    }

    client.stop().unwrap();
}

#[test]
fn midstream_loss_is_classified_unreachable() {
    let mut client = client_with(vec![Behavior::DieMidStream("partial ")]);
    assert!(client.send(request("agent_001", 30)));

    let event = wait_for_event(&mut client);
    match event.outcome {
        ResponseOutcome::Failure { kind, .. } => assert_eq!(kind, FailureKind::Unreachable),
        other => panic!("expected failure, got {other:?}"),
    }

    client.stop().unwrap();
}

#[test]
fn setup_failure_keeps_its_classification() {
    let mut client = client_with(vec![Behavior::FailSetup(ProviderError::AuthFailure(
        "key rejected".into(),
    ))]);
    assert!(client.send(request("agent_001", 30)));

    let event = wait_for_event(&mut client);
    match event.outcome {
        ResponseOutcome::Failure { kind, .. } => assert_eq!(kind, FailureKind::AuthFailure),
        other => panic!("expected failure, got {other:?}"),
    }

    client.stop().unwrap();
}

#[test]
fn unavailable_provider_fails_as_not_found() {
    let mut client = InferenceClient::start(HashMap::new());
    let mut req = request("agent_001", 30);
    req.provider = "missing".into();
    assert!(client.send(req));

    let event = wait_for_event(&mut client);
    match event.outcome {
        ResponseOutcome::Failure { kind, detail } => {
            assert_eq!(kind, FailureKind::NotFound);
            assert!(detail.contains("missing"));
        }
        other => panic!("expected failure, got {other:?}"),
    }

    client.stop().unwrap();
}

#[test]
fn stop_on_an_idle_worker_returns_promptly() {
    let client = client_with(vec![]);
    let started = Instant::now();
    client.stop().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
}
