//! `pixelprompt chat` — Headless conversation loop against one agent.
//!
//! Drives the same session the rendering host would, just without the
//! graphics: submit, pump ticks at a frame cadence until the request
//! resolves, print what the agent would display.

use pixelprompt_config::AppConfig;
use pixelprompt_core::agent::AgentState;
use pixelprompt_providers::build_providers;
use pixelprompt_runtime::Session;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

pub async fn run(
    config_path: &Path,
    agent: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_from(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let frame = Duration::from_secs_f32(1.0 / config.window.fps_target as f32);
    let providers = build_providers(&config)?;
    let mut session = Session::new(&config, providers)?;

    let (agent_id, agent_name) = match agent {
        Some(id) => {
            let found = session
                .agents()
                .iter()
                .find(|a| a.id == id)
                .ok_or_else(|| format!("No agent with id '{id}' in the config"))?;
            (found.id.clone(), found.name.clone())
        }
        None => {
            let first = session.agents().first().ok_or("No agents configured")?;
            (first.id.clone(), first.name.clone())
        }
    };

    println!();
    println!("  PixelPrompt — Chat Mode");
    println!();
    println!("  Agent:  {agent_name} ({agent_id})");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let stdin = std::io::stdin();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" {
            break;
        }

        if !session.submit(&agent_id, line)? {
            println!("  [{agent_name} is still thinking]");
            continue;
        }

        // Pump frames until the request resolves.
        while session.state_of(&agent_id) == Some(AgentState::Thinking) {
            session.tick(frame.as_secs_f32());
            std::thread::sleep(frame);
        }

        println!();
        match session.state_of(&agent_id) {
            Some(AgentState::Talking) => {
                let reply = session.display_text(&agent_id).unwrap_or_default().to_string();
                for text_line in reply.lines() {
                    println!("  {agent_name} > {text_line}");
                }
            }
            Some(AgentState::Error) => {
                let message = session.display_text(&agent_id).unwrap_or_default();
                println!("  [{agent_name}] {message}");
            }
            _ => {}
        }
        println!();

        // Fast-forward the display window so the next prompt is immediate.
        session.tick(3600.0);
    }

    println!();
    println!("  Goodbye! 👋");
    if let Err(e) = session.shutdown() {
        eprintln!("  [Warning] {e}");
    }

    Ok(())
}
