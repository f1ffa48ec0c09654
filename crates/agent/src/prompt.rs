//! Prompt assembly for the reasoning step.

use forager_core::memory::MemoryEntry;
use forager_core::message::Message;
use forager_core::provider::ToolDefinition;

use crate::state::{ActionProposal, AgentState, HistoryStep};

/// Longest observation summary shown to the model.
pub const OBSERVATION_SUMMARY_CHARS: usize = 1500;

const BASE_INSTRUCTIONS: &str = "You are Forager, an assistant that reasons step by step \
and uses tools when they help. Think about what the user needs, then either call exactly \
one tool or give the final answer. When you answer after using tools, rely on the \
observations and cite the sources you used.";

fn memories_block(memories: &[MemoryEntry]) -> Option<String> {
    if memories.is_empty() {
        return None;
    }
    let mut out = String::from("What you know about the user:");
    for m in memories {
        out.push_str("\n- ");
        out.push_str(&m.content);
    }
    Some(out)
}

fn tools_block(tools: &[ToolDefinition]) -> Option<String> {
    if tools.is_empty() {
        return None;
    }
    let mut out = String::from("Available tools:");
    for t in tools {
        out.push_str(&format!("\n- {}: {} Parameters: {}", t.name, t.description, t.parameters));
    }
    out.push_str(
        "\n\nTo use a tool without native tool calling, reply with only a JSON block:\n\
         {\"tool\": \"<tool name>\", \"parameters\": { ... }}\n\
         To finish, reply with the answer as plain text.",
    );
    Some(out)
}

/// Render trace entries as Thought/Action/Observation lines.
pub fn render_steps(steps: &[HistoryStep]) -> String {
    steps
        .iter()
        .map(|step| match step {
            HistoryStep::Thought { text } => format!("Thought: {text}"),
            HistoryStep::Action { proposal } => format!(
                "Action: {} {} (attempt {})",
                proposal.intent,
                proposal.arguments(),
                proposal.attempt
            ),
            HistoryStep::Observation { observation, .. } => {
                format!("Observation: {}", observation.summarize(OBSERVATION_SUMMARY_CHARS))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_sections(sections: impl IntoIterator<Item = Option<String>>) -> String {
    sections.into_iter().flatten().collect::<Vec<_>>().join("\n\n")
}

/// Messages for one reasoning step.
pub fn reasoning_messages(
    state: &AgentState,
    tools: &[ToolDefinition],
    history_window: usize,
) -> Vec<Message> {
    let recent = state.recent(history_window);
    let trace = (!recent.is_empty())
        .then(|| format!("Steps so far:\n{}", render_steps(recent)));

    let goal = &state.goal;
    let hint = goal.has_tool_intent().then(|| {
        format!(
            "Likely tool: {} with parameters {}",
            goal.matched_intent,
            serde_json::Value::Object(goal.parameters.clone())
        )
    });

    let system = join_sections([
        Some(BASE_INSTRUCTIONS.to_string()),
        memories_block(&state.memories),
        tools_block(tools),
        Some(format!("Goal: {}", goal.primary_objective)),
        hint,
        trace,
    ]);

    vec![Message::system(system), Message::user(state.goal.raw_text.clone())]
}

/// Messages for a tool-less answer, optionally with extra context.
pub fn plain_messages(state: &AgentState, note: Option<&str>) -> Vec<Message> {
    let findings = {
        let observed = state.successful_observations();
        (!observed.is_empty()).then(|| {
            let lines = observed
                .iter()
                .map(|(_, o)| o.summarize(OBSERVATION_SUMMARY_CHARS))
                .collect::<Vec<_>>()
                .join("\n");
            format!("Findings so far:\n{lines}")
        })
    };

    let system = join_sections([
        Some("You are Forager, a helpful assistant. Answer the user directly.".to_string()),
        memories_block(&state.memories),
        findings,
        note.map(str::to_string),
    ]);

    vec![Message::system(system), Message::user(state.goal.raw_text.clone())]
}

/// Messages asking for corrected parameters for one tool.
pub fn repair_messages(
    state: &AgentState,
    proposal: &ActionProposal,
    error: &str,
    tool: Option<&ToolDefinition>,
) -> Vec<Message> {
    let schema = tool
        .map(|t| t.parameters.to_string())
        .unwrap_or_else(|| "{}".to_string());

    let system = format!(
        "The tool `{}` rejected its parameters.\nError: {error}\nParameters sent: {}\n\
         Parameter schema: {schema}\n\
         Reply with only a JSON object holding corrected parameters for the same tool.",
        proposal.intent,
        proposal.arguments(),
    );

    vec![
        Message::system(system),
        Message::user(format!("Goal: {}", state.goal.primary_objective)),
    ]
}
