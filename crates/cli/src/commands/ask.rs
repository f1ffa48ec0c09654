//! `forager ask` — Run the agent on a single request.

use std::sync::Arc;

use forager_agent::{Agent, AgentResult, commit_proposals};
use forager_config::AppConfig;
use forager_core::event::{DomainEvent, EventBus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

fn missing_key_help() {
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    OPENROUTER_API_KEY=sk-or-v1-...   (recommended)");
    eprintln!("    OPENAI_API_KEY=sk-...             (for OpenAI direct)");
    eprintln!("    FORAGER_API_KEY=sk-...            (generic)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
}

fn log_event(event: &DomainEvent) {
    match event {
        DomainEvent::ReasoningStep { iteration, proposed, .. } => {
            debug!(iteration, proposed = ?proposed, "reasoning");
        }
        DomainEvent::ToolDispatched { intent, attempt, success, duration_ms, .. } => {
            debug!(%intent, attempt, success, duration_ms, "tool dispatched");
        }
        DomainEvent::SelfCorrection { intent, cause, decision, .. } => {
            debug!(%intent, cause = ?cause, decision = %decision, "self-correction");
        }
        DomainEvent::RunStarted { .. } | DomainEvent::RunFinished { .. } => {}
    }
}

/// Human-readable rendering: the content, then the tool badges.
pub fn render(result: &AgentResult) -> String {
    if result.tools_used.is_empty() {
        return result.content.clone();
    }
    let badges = result
        .tools_used
        .iter()
        .map(|u| format!("[{}]", u.badge))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{}\n\n{badges}", result.content)
}

pub async fn run(
    message: String,
    user: Option<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() && config.default_provider != "ollama" {
        missing_key_help();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = forager_providers::build_from_config(&config)
        .chained(config.agent.wall_clock())
        .ok_or("No completion provider configured")?;
    let registry = forager_tools::registry_from_config(&config);
    let memory = forager_memory::build_from_config(&config);
    let user_id = user.unwrap_or_else(|| config.memory.user_id.clone());

    let events = Arc::new(EventBus::default());
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            log_event(&event);
        }
    });

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let agent = Agent::from_config(&config, provider, registry)
        .with_timeouts(forager_tools::dispatch_timeouts(&config))
        .with_memory(memory.clone())
        .with_event_bus(events);

    if !json {
        eprint!("  Thinking...");
    }
    let result = agent.run(&message, &[], &user_id, &cancel).await;
    if !json {
        eprint!("\r              \r");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", render(&result));
    }

    match commit_proposals(memory.as_ref(), &user_id, result.memory_proposals.clone()).await {
        Ok(ids) if !ids.is_empty() => debug!(count = ids.len(), "Stored new memories"),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Could not store memories"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forager_agent::{RunMetadata, ToolUsage};
    use forager_core::intent::Intent;

    fn result(tools_used: Vec<ToolUsage>) -> AgentResult {
        AgentResult {
            content: "Silver is $31.20 per ounce.".into(),
            tools_used,
            used_fallback: false,
            fallback_reason: None,
            iterations: 2,
            memory_proposals: Vec::new(),
            metadata: RunMetadata {
                run_id: "r".into(),
                mode: "loop".into(),
                transitions: Vec::new(),
                error_causes: Vec::new(),
                escalations: Vec::new(),
                retries: 0,
                elapsed_ms: 5,
            },
        }
    }

    #[test]
    fn render_appends_badges() {
        let usage = ToolUsage::for_intent(Intent::Search).unwrap();
        let text = render(&result(vec![usage]));
        assert!(text.starts_with("Silver is $31.20"));
        assert!(text.ends_with("[agent-web-search]"));
    }

    #[test]
    fn render_without_tools_is_content_only() {
        assert_eq!(render(&result(Vec::new())), "Silver is $31.20 per ounce.");
    }
}
