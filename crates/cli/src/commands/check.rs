//! `pixelprompt check` — Diagnose configuration and backend health.

use pixelprompt_config::AppConfig;
use pixelprompt_providers::build_providers;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 PixelPrompt Check — System Diagnostics");
    println!("=========================================\n");

    let mut issues = 0;

    // Config
    let config = match AppConfig::load_from(config_path) {
        Ok(config) => {
            if config_path.exists() {
                println!("  ✅ Config file valid: {}", config_path.display());
            } else {
                println!(
                    "  ⚠️  No config file at {} — using defaults",
                    config_path.display()
                );
            }
            config
        }
        Err(e) => {
            println!("  ❌ Config file invalid: {e}");
            return Err("1 issue found".into());
        }
    };

    // Backends
    let providers = match build_providers(&config) {
        Ok(providers) => providers,
        Err(e) => {
            println!("  ❌ Provider setup failed: {e}");
            return Err("1 issue found".into());
        }
    };
    if providers.is_empty() {
        println!("  ❌ No providers available — enable one in the config");
        issues += 1;
    }

    for (key, provider) in &providers {
        if provider.health_check().await {
            let models = provider.list_models().await;
            if models.is_empty() {
                println!("  ⚠️  {} ({key}): reachable, but no models", provider.name());
                issues += 1;
            } else {
                println!(
                    "  ✅ {} ({key}): reachable, {} model(s)",
                    provider.name(),
                    models.len()
                );
            }
        } else {
            println!("  ❌ {} ({key}): not reachable", provider.name());
            issues += 1;
        }
    }

    // Agents
    println!();
    for agent in &config.agents {
        if providers.contains_key(&agent.provider) {
            println!(
                "  ✅ Agent '{}' ({}) → {} / {}",
                agent.name, agent.id, agent.provider, agent.model
            );
        } else {
            println!(
                "  ⚠️  Agent '{}' ({}) → provider '{}' is not available",
                agent.name, agent.id, agent.provider
            );
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
        Ok(())
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
        Err(format!("{issues} issue(s) found").into())
    }
}
